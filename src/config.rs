//! Configuration loading for the quality-control service.
//!
//! Every rule parameter has a compiled default, so an empty file (or no file
//! at all) reproduces the standard ISMN flagging. A TOML file can override
//! any subset of fields:
//!
//! ```toml
//! [bounds]
//! upper = 55.0
//!
//! [rise]
//! min_precipitation = 0.3
//!
//! [logging]
//! level = "debug"
//!
//! [[sensors]]
//! station = "Zamarron"
//! sensor = "ThetaProbe-ML2X"
//! depth_from_m = 0.0
//! depth_to_m = 0.05
//! saturation_point = 42.7
//! ```
//!
//! `QcConfig::from_env` reads the file named by `SOILQC_CONFIG`, loading a
//! `.env` file first if one exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::logging::{self, LogLevel, Stage};
use crate::stations::{SensorProfile, NEAR_SURFACE_MAX_DEPTH_M};

/// Environment variable holding the path of the configuration file.
pub const CONFIG_ENV_VAR: &str = "SOILQC_CONFIG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Static plausibility bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    /// Soil moisture below this is flagged (percent).
    pub lower: f64,
    /// Soil moisture above this is flagged (percent).
    pub upper: f64,
    /// Station saturation point; the rule is skipped when absent.
    pub saturation_point: Option<f64>,
    /// Temperatures below this are treated as frozen soil/air (°C).
    pub freezing_point: f64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 60.0,
            saturation_point: None,
            freezing_point: 0.0,
        }
    }
}

/// Parameters shared by both rise-without-precipitation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiseConfig {
    /// A precipitation signal at or above this explains a rise (mm).
    pub min_precipitation: f64,
    /// Trailing window for the soil-moisture standard deviation.
    pub std_window: usize,
    /// Valid samples needed in the std window.
    pub std_min_periods: usize,
    /// Lag of the long (daily) rise.
    pub long_lag: usize,
    /// Lag of the short (hourly) rise.
    pub short_lag: usize,
    /// Trailing window for accumulating model precipitation.
    pub model_precipitation_window: usize,
    /// Sensors deeper than this are excluded from the rise rules.
    pub near_surface_max_depth_m: f64,
}

impl Default for RiseConfig {
    fn default() -> Self {
        Self {
            min_precipitation: 0.2,
            std_window: 25,
            std_min_periods: 1,
            long_lag: 24,
            short_lag: 1,
            model_precipitation_window: 24,
            near_surface_max_depth_m: NEAR_SURFACE_MAX_DEPTH_M,
        }
    }
}

/// Parameters of the spike rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    /// Half width of the centered variance window (12 ⇒ 25 samples).
    pub half_window: usize,
    /// Relative hourly change that counts as abrupt (0.15 ⇒ ±15%).
    pub ratio_threshold: f64,
    /// Exclusive lower bound of the second-derivative symmetry ratio.
    pub deriv2_ratio_min: f64,
    /// Exclusive upper bound of the second-derivative symmetry ratio.
    pub deriv2_ratio_max: f64,
    /// Neighbourhood variance-to-mean ratio must stay below this.
    pub variance_ratio_max: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            half_window: 12,
            ratio_threshold: 0.15,
            deriv2_ratio_min: 0.8,
            deriv2_ratio_max: 1.2,
            variance_ratio_max: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    /// Installs the global logger with these settings.
    pub fn init(&self) {
        logging::init_logger(self.level, self.file.as_deref(), self.timestamps);
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QcConfig {
    pub bounds: BoundsConfig,
    pub rise: RiseConfig,
    pub spike: SpikeConfig,
    pub logging: LoggingConfig,
    pub sensors: Vec<SensorProfile>,
}

impl QcConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: QcConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file, logging any failure.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path).inspect_err(|e| {
            logging::error(Stage::Config, None, &e.to_string());
        })?;

        logging::debug(
            Stage::Config,
            None,
            &format!(
                "Loaded {} ({} sensor profiles)",
                path.display(),
                config.sensors.len()
            ),
        );
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: QcConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: Some(path.display().to_string()),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `SOILQC_CONFIG`, or the defaults when the
    /// variable is unset. A `.env` file in the working directory is read
    /// first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => {
                logging::debug(
                    Stage::Config,
                    None,
                    &format!("{} not set, using default rule parameters", CONFIG_ENV_VAR),
                );
                Ok(Self::default())
            }
        }
    }

    /// Rejects parameter combinations the detectors cannot evaluate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.bounds;
        if !(b.upper > b.lower) {
            return Err(ConfigError::Invalid(format!(
                "bounds.upper ({}) must be greater than bounds.lower ({})",
                b.upper, b.lower
            )));
        }

        let r = &self.rise;
        if r.std_window == 0 || r.long_lag == 0 || r.short_lag == 0 || r.model_precipitation_window == 0 {
            return Err(ConfigError::Invalid(
                "rise windows and lags must be at least 1".to_string(),
            ));
        }
        if r.std_min_periods == 0 || r.std_min_periods > r.std_window {
            return Err(ConfigError::Invalid(format!(
                "rise.std_min_periods ({}) must be within 1..={}",
                r.std_min_periods, r.std_window
            )));
        }

        let s = &self.spike;
        if s.half_window == 0 {
            return Err(ConfigError::Invalid("spike.half_window must be at least 1".to_string()));
        }
        if !(s.ratio_threshold > 0.0 && s.ratio_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "spike.ratio_threshold ({}) must be within (0, 1)",
                s.ratio_threshold
            )));
        }
        if !(s.deriv2_ratio_min < s.deriv2_ratio_max) {
            return Err(ConfigError::Invalid(format!(
                "spike.deriv2_ratio_min ({}) must be below deriv2_ratio_max ({})",
                s.deriv2_ratio_min, s.deriv2_ratio_max
            )));
        }

        for sensor in &self.sensors {
            sensor.validate().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io { path: String, message: String },
    /// The file is not valid TOML for `QcConfig`.
    Parse { path: Option<String>, message: String },
    /// The values parse but cannot be used.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "Cannot read config {}: {}", path, message)
            }
            ConfigError::Parse { path: Some(path), message } => {
                write!(f, "Parse error in {}: {}", path, message)
            }
            ConfigError::Parse { path: None, message } => write!(f, "Parse error: {}", message),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
