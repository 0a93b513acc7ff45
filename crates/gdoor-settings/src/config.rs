//! Bus configuration
//!
//! Describes the listeners and outputs attached to one gdoor bus, loads and
//! saves that description as JSON or TOML, and builds a populated
//! [`BusRouter`] from it.
//!
//! ```toml
//! [bus]
//! idle_timeout_ms = 500
//!
//! [[binary_sensors]]
//! id = "doorbell"
//! busdata = ["0011A2B3C4D5"]
//! auto_reset_ms = 500
//!
//! [[events]]
//! id = "door"
//! event_types = ["opened", "closed", "unlock"]
//! busdata = { opened = ["01020304"], closed = ["01020305"] }
//!
//! [[outputs]]
//! id = "open_door"
//! payload = "0102030A"
//! tx_event_id = "door"
//! tx_event_type = "unlock"
//! ```

use gdoor_core::{
    shared, BinarySensorListener, BusRouter, BusWrite, EventBus, EventBusConfig, EventBusdata,
    EventListener, FramePattern,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, SettingsError, SettingsResult};

/// Bus-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Time without frames before the bus reports idle, in milliseconds
    pub idle_timeout_ms: u64,
    /// Broadcast channel capacity for async subscribers
    pub channel_capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 500,
            channel_capacity: 256,
        }
    }
}

/// Binary sensor definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySensorConfig {
    /// Listener id
    pub id: String,
    /// Frames that assert the sensor
    #[serde(default)]
    pub busdata: Vec<String>,
    /// Return to off this long after the last match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_reset_ms: Option<u64>,
}

/// Event definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Listener id
    pub id: String,
    /// Explicit event type names, including TX-only ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
    /// Event type name to frames
    #[serde(default)]
    pub busdata: EventBusdata,
}

/// Bus write output definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output id
    pub id: String,
    /// Frame to send, as busdata hex
    pub payload: String,
    /// Event listener fired after sending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_event_id: Option<String>,
    /// Event type fired after sending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_event_type: Option<String>,
}

/// A router built from configuration, plus its outputs
#[derive(Debug)]
pub struct BusSetup {
    /// Router with every configured listener registered
    pub router: BusRouter,
    /// Configured outputs, TX links validated against the router
    pub outputs: Vec<BusWrite>,
}

impl BusSetup {
    /// Look up an output by id
    pub fn output(&self, id: &str) -> Option<&BusWrite> {
        self.outputs.iter().find(|o| o.id() == id)
    }
}

/// Complete bus configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus-wide settings
    #[serde(default)]
    pub bus: BusSettings,
    /// Binary sensors
    #[serde(default)]
    pub binary_sensors: Vec<BinarySensorConfig>,
    /// Events
    #[serde(default)]
    pub events: Vec<EventConfig>,
    /// Outputs
    #[serde(default)]
    pub outputs: Vec<OutputConfig>,
}

impl BusConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location: `<config dir>/gdoor/bus.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gdoor")
            .join("bus.toml")
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!(
            "Loaded bus config from {} ({} sensors, {} events, {} outputs)",
            path.display(),
            config.binary_sensors.len(),
            config.events.len(),
            config.outputs.len()
        );
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Validate the structure of the configuration
    ///
    /// Busdata hex and event type consistency are checked when the router is
    /// built, by the listeners themselves.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.bus.idle_timeout_ms == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "bus.idle_timeout_ms".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        let mut ids = HashSet::new();
        let all_ids = self
            .binary_sensors
            .iter()
            .map(|s| &s.id)
            .chain(self.events.iter().map(|e| &e.id))
            .chain(self.outputs.iter().map(|o| &o.id));
        for id in all_ids {
            if id.is_empty() {
                return Err(ConfigError::MissingKey("id".to_string()).into());
            }
            if !ids.insert(id.as_str()) {
                return Err(ConfigError::DuplicateId(id.clone()).into());
            }
        }

        for (i, output) in self.outputs.iter().enumerate() {
            match (&output.tx_event_id, &output.tx_event_type) {
                (Some(_), None) => {
                    return Err(
                        ConfigError::MissingKey(format!("outputs[{}].tx_event_type", i)).into(),
                    )
                }
                (None, Some(_)) => {
                    return Err(
                        ConfigError::MissingKey(format!("outputs[{}].tx_event_id", i)).into(),
                    )
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Event bus settings derived from this configuration
    pub fn event_bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            channel_capacity: self.bus.channel_capacity,
        }
    }

    /// Build a router with a fresh event bus
    pub fn build(&self) -> SettingsResult<BusSetup> {
        let events = Arc::new(EventBus::with_config(self.event_bus_config()));
        self.build_with_events(events)
    }

    /// Build a router publishing to `events`
    ///
    /// Every listener is built and registered in declaration order: binary
    /// sensors first, then events. The first configuration error aborts.
    pub fn build_with_events(&self, events: Arc<EventBus>) -> SettingsResult<BusSetup> {
        self.validate()?;

        let mut router = BusRouter::new(events)
            .with_idle_timeout(Duration::from_millis(self.bus.idle_timeout_ms));

        for sensor in &self.binary_sensors {
            let mut listener = BinarySensorListener::new(sensor.id.as_str());
            if let Some(ms) = sensor.auto_reset_ms {
                listener = listener.with_auto_reset(Duration::from_millis(ms));
            }
            for hex in &sensor.busdata {
                listener.add_frame_pattern(FramePattern::parse(hex)?);
            }
            if sensor.busdata.is_empty() {
                tracing::warn!("Binary sensor '{}' has no busdata and will never trigger", sensor.id);
            }
            router.register_listener(shared(listener))?;
        }

        for event in &self.events {
            let listener = EventListener::new(event.id.as_str(), &event.event_types, &event.busdata)?;
            router.register_listener(shared(listener))?;
        }

        let mut outputs = Vec::with_capacity(self.outputs.len());
        for output in &self.outputs {
            let mut write = BusWrite::new(output.id.as_str(), &output.payload)?;
            if let (Some(id), Some(event_type)) = (&output.tx_event_id, &output.tx_event_type) {
                write = write.with_tx_event(id.as_str(), event_type);
            }
            router.validate_tx_link(&write)?;
            outputs.push(write);
        }

        Ok(BusSetup { router, outputs })
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
