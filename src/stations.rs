//! Sensor profiles for the stations being quality-controlled.
//!
//! A profile describes one soil-moisture sensor: where it is, how deep it
//! sits and, when known, the saturation point of the soil around it. The
//! pipeline uses profiles to decide which rules apply: the rise rules are
//! meant for near-surface sensors only, and the saturation rule needs a
//! per-station reference value.
//!
//! Profiles are normally listed in the `[[sensors]]` array of the
//! configuration file rather than hardcoded.

use serde::{Deserialize, Serialize};

/// Default depth limit for rules that only make sense near the surface.
pub const NEAR_SURFACE_MAX_DEPTH_M: f64 = 0.10;

// ---------------------------------------------------------------------------
// Sensor metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorProfile {
    /// Station name, e.g. "Zamarron" within the REMEDHUS network.
    pub station: String,
    /// Sensor identifier at the station.
    pub sensor: String,
    /// Upper edge of the measured soil layer, metres below the surface.
    pub depth_from_m: f64,
    /// Lower edge of the measured soil layer, metres below the surface.
    pub depth_to_m: f64,
    /// Volumetric soil-moisture saturation point in percent, if known.
    #[serde(default)]
    pub saturation_point: Option<f64>,
}

impl SensorProfile {
    /// "station/sensor", used as the station tag in log output.
    pub fn tag(&self) -> String {
        format!("{}/{}", self.station, self.sensor)
    }

    /// Whether the whole measured layer lies within `max_depth_m` of the surface.
    pub fn is_near_surface(&self, max_depth_m: f64) -> bool {
        self.depth_to_m <= max_depth_m
    }

    /// Checks that depths are ordered and non-negative and that a
    /// saturation point, if present, is a percentage. Zero is accepted and
    /// means the station has no reference value.
    pub fn validate(&self) -> Result<(), String> {
        if self.depth_from_m < 0.0 || self.depth_to_m < 0.0 {
            return Err(format!("sensor {}: depths must be non-negative", self.tag()));
        }
        if self.depth_from_m > self.depth_to_m {
            return Err(format!(
                "sensor {}: depth_from_m ({}) is below depth_to_m ({})",
                self.tag(),
                self.depth_from_m,
                self.depth_to_m
            ));
        }
        if let Some(sat) = self.saturation_point {
            if !(0.0..=100.0).contains(&sat) {
                return Err(format!(
                    "sensor {}: saturation point {} is outside [0, 100]",
                    self.tag(),
                    sat
                ));
            }
        }
        Ok(())
    }
}

/// Looks up a sensor by station and sensor id. Returns `None` if not found.
pub fn find_profile<'a>(
    profiles: &'a [SensorProfile],
    station: &str,
    sensor: &str,
) -> Option<&'a SensorProfile> {
    profiles
        .iter()
        .find(|p| p.station == station && p.sensor == sensor)
}

/// Returns the sensors that the rise rules apply to.
pub fn near_surface_profiles(profiles: &[SensorProfile], max_depth_m: f64) -> Vec<&SensorProfile> {
    profiles
        .iter()
        .filter(|p| p.is_near_surface(max_depth_m))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
