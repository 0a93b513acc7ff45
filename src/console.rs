//! Line console
//!
//! Development stand-in for the bus transport. Reads one command per line:
//!
//! - `0102030A` dispatches the hex frame to the router
//! - `!open_door` writes the output with that id
//! - `?` logs the bus status
//!
//! Blank lines and lines starting with `#` are ignored. Bad lines are logged
//! and skipped so one typo does not end the session.
//!
//! [`Console::run`] polls the router only after each line, so an auto-reset
//! sensor stays on until the next line arrives. [`Console::run_with_ticks`]
//! also polls on a timer while waiting for input.

use std::io::BufRead;
use std::time::{Duration, Instant};

use gdoor_core::{BusTransmitter, Frame};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;
use gdoor_settings::BusSetup;

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Dispatch a received frame.
    Frame(Frame),
    /// Write an output by id.
    Write(String),
    /// Report bus status.
    Status,
    /// Nothing to do.
    Skip,
}

impl ConsoleCommand {
    /// Parse a console line
    pub fn parse(line: &str) -> gdoor_core::Result<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Self::Skip);
        }
        if line == "?" {
            return Ok(Self::Status);
        }
        if let Some(id) = line.strip_prefix('!') {
            return Ok(Self::Write(id.trim().to_string()));
        }
        Ok(Self::Frame(Frame::from_hex(line)?))
    }
}

/// Drives a configured bus from text lines
pub struct Console<T: BusTransmitter> {
    setup: BusSetup,
    transmitter: T,
    frames: usize,
}

impl<T: BusTransmitter> Console<T> {
    /// Create a console over a built bus setup
    pub fn new(setup: BusSetup, transmitter: T) -> Self {
        Self {
            setup,
            transmitter,
            frames: 0,
        }
    }

    /// The bus setup being driven
    pub fn setup(&self) -> &BusSetup {
        &self.setup
    }

    /// Frames dispatched so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Handle one line, logging anything that goes wrong
    pub fn handle_line(&mut self, line: &str) {
        let command = match ConsoleCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Ignoring line '{}': {}", line.trim(), e);
                return;
            }
        };

        match command {
            ConsoleCommand::Frame(frame) => {
                let summary = self.setup.router.dispatch(&frame);
                self.frames += 1;
                tracing::debug!(
                    "Frame {}: {} emitted, {} faults",
                    frame,
                    summary.emitted,
                    summary.faults
                );
            }
            ConsoleCommand::Write(id) => {
                let Some(output) = self.setup.output(&id) else {
                    tracing::warn!("No output '{}'", id);
                    return;
                };
                if let Err(e) = self.setup.router.write(output, &mut self.transmitter) {
                    tracing::warn!("Write '{}' failed: {}", id, e);
                }
            }
            ConsoleCommand::Status => {
                tracing::info!("Bus status: {}", self.setup.router.bus_status(Instant::now()));
            }
            ConsoleCommand::Skip => {}
        }

        self.setup.router.poll(Instant::now());
    }

    /// Handle every line from a reader until EOF
    pub fn run<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        for line in reader.lines() {
            self.handle_line(&line?);
        }
        Ok(self.frames)
    }

    /// Handle every line from an async reader until EOF, polling the router
    /// every `tick` in between
    pub async fn run_with_ticks<R>(&mut self, reader: R, tick: Duration) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.setup.router.poll(Instant::now());
                }
            }
        }
        Ok(self.frames)
    }

    /// Give back the transmitter
    pub fn into_transmitter(self) -> T {
        self.transmitter
    }
}
