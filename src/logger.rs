//! Kernel logger for the host build.
//!
//! Implements `log::Log` on top of stderr. The level comes from the
//! `TINYK_LOG` environment variable and defaults to `info`.

use log::{LevelFilter, Metadata, Record};
use std::str::FromStr;

static LOGGER: HostLogger = HostLogger;

struct HostLogger;

impl log::Log for HostLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "[{:>5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

/// Install the logger. Does nothing if a logger is already set.
pub fn init() {
    let level = std::env::var("TINYK_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Info);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
