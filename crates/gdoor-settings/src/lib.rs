//! GDoor Settings Crate
//!
//! Handles bus configuration files and turns them into a populated router.

pub mod config;
pub mod error;

pub use config::{
    BinarySensorConfig, BusConfig, BusSettings, BusSetup, EventConfig, OutputConfig,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
