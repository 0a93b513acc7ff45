use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use gdoor::{init_logging, BusConfig, BusEvent, Console, HexLineTransmitter, BUILD_DATE, VERSION};
use tokio::sync::broadcast::{self, error::RecvError};

/// Router poll interval while waiting for console input
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Usage: `gdoor [CONFIG]`
///
/// Loads the bus configuration (default `<config dir>/gdoor/bus.toml`), then
/// reads console lines from stdin. Every emitted event is printed to stdout as
/// one JSON line; transmitted frames go to stderr as hex.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("gdoor {} (built {})", VERSION, BUILD_DATE);

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(BusConfig::default_path);
    let config = BusConfig::load_from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    let setup = config.build().context("building bus")?;
    setup.router.dump_config();

    let printer = tokio::spawn(print_events(setup.router.events().receiver()));

    let mut console = Console::new(setup, HexLineTransmitter::new(std::io::stderr()));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let frames = console.run_with_ticks(stdin, POLL_INTERVAL).await?;
    tracing::info!("Input closed after {} frames", frames);

    // Dropping the router closes the event channel and lets the printer drain
    drop(console);
    printer.await.context("event printer")?;

    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<BusEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event printer fell behind, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &BusEvent) {
    match serde_json::to_string(event) {
        Ok(line) => {
            let mut out = std::io::stdout().lock();
            if let Err(e) = writeln!(out, "{}", line) {
                tracing::warn!("Failed to print event: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to encode event: {}", e),
    }
}
