//! Stderr backend for the [`log`] facade.
//!
//! Lines are written as `LEVEL target: message`. The level comes from the
//! `-v` count when one is given, otherwise from `$SPLASH_LOG`, otherwise it
//! defaults to warnings.

use std::io::Write as _;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Environment variable holding the default log level.
pub const LOG_ENV: &str = "SPLASH_LOG";

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Nowhere left to report a failing stderr.
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} {}: {}",
            level_name(record.level()),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Fixed-width level name for aligned output.
const fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Maps a `-v` count to a level: none is warnings, then info, debug, trace.
pub const fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Parses a level name such as `debug` or `off`.
pub fn level_from_env(value: Option<&str>) -> Option<LevelFilter> {
    value?.trim().parse().ok()
}

/// Installs the logger. Calling it again only keeps the first level.
pub fn init(verbosity: u8) {
    let level = if verbosity > 0 {
        level_from_verbosity(verbosity)
    } else {
        level_from_env(std::env::var(LOG_ENV).ok().as_deref()).unwrap_or(LevelFilter::Warn)
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
