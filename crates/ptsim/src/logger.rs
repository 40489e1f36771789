//! stderr logger for the `log` facade.
//!
//! The library crates only emit through `log`; this is the one sink.

use anyhow::{Result, anyhow};
use log::{LevelFilter, Metadata, Record};

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the logger with the given maximum level.
pub fn init(max_level: LevelFilter) -> Result<()> {
    log::set_logger(&LOGGER).map_err(|_| anyhow!("logger already installed"))?;
    log::set_max_level(max_level);
    Ok(())
}
