//! Quality-control flagging for hourly in-situ soil-moisture series.
//!
//! Each observation collects a set of numeric flag codes (`qflag`) from a
//! fixed catalogue of rules:
//!
//! | code | label | rule                                              |
//! |------|-------|---------------------------------------------------|
//! | 1    | C01   | soil moisture below the lower bound               |
//! | 2    | C02   | soil moisture above the upper bound               |
//! | 3    | C03   | soil moisture above the station saturation point  |
//! | 4    | D01   | in-situ soil temperature below freezing           |
//! | 5    | D02   | in-situ air temperature below freezing            |
//! | 6    | D03   | model soil temperature below freezing             |
//! | 7    | D04   | rise without in-situ precipitation                |
//! | 8    | D05   | rise without model precipitation                  |
//! | 9    | D06   | one- or two-hour spike                            |
//!
//! Codes 10–14 are reserved and never emitted.
//!
//! ```no_run
//! use soilqc_service::{flag_series, QcConfig, SoilMoistureSeries};
//! # use chrono::{TimeZone, Utc};
//! # let start = Utc.with_ymd_and_hms(2017, 1, 27, 0, 0, 0).unwrap();
//! let config = QcConfig::from_env()?;
//! config.logging.init();
//! let series = SoilMoistureSeries::hourly(start, vec![Some(20.0); 48]);
//! let flags = flag_series(&series, &config, None);
//! assert_eq!(flags.len(), 48);
//! # Ok::<(), soilqc_service::ConfigError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod flags;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod qflag;
pub mod stations;

pub use config::{ConfigError, QcConfig};
pub use model::{validate_series, Column, Flag, SeriesError, SoilMoistureSeries};
pub use pipeline::{flag_series, flag_series_json};
pub use qflag::{FlaggedObservation, QualityFlags};
pub use stations::SensorProfile;
