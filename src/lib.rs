//! # GDoor
//!
//! Frame dispatch for the gdoor door-controller bus.
//!
//! ## Architecture
//!
//! The workspace is organized as multiple crates:
//!
//! 1. **gdoor-core** - Frames, patterns, listeners, router, event bus
//! 2. **gdoor-settings** - Bus configuration files (JSON/TOML)
//! 3. **gdoor** - Logging setup and a line console binary
//!
//! ## Data flow
//!
//! A transport decodes a frame and hands it to [`BusRouter::dispatch`]. The
//! router offers it to every registered listener in registration order;
//! matching binary sensors and events emit a [`BusEvent`] onto the
//! [`EventBus`] the router was built with.

pub mod console;

pub use gdoor_core::{
    BinarySensorListener, BusEvent, BusListener, BusRouter, BusStatus, BusTransmitter, BusWrite,
    ConfigurationError, DispatchFault, Error, EventBus, EventBusdata, EventFilter, EventListener,
    Frame, FramePattern, HexLineTransmitter, ListenerId, Result, TxError,
};

pub use gdoor_settings::{BusConfig, BusSetup, SettingsError};

pub use console::{Console, ConsoleCommand};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr, so stdout stays free for event lines
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
