//! Host terminal output.

use std::io::{self, Write};

use crossterm::terminal;
use tracing::warn;

use crate::engine::TerminalSink;

/// Writes engine output straight to stdout.
pub struct StdoutSink {
    out: io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSink for StdoutSink {
    fn print(&mut self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            warn!("Terminal write failed: {}", e);
        }
    }
}

/// Raw mode for the lifetime of the guard.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
