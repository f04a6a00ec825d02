//! Loader log, written to standard error.

use std::io::Write;

use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

/// Global instance of the loader log.
static LOGGER: StderrLog = StderrLog {};

#[cfg(feature = "verbose")]
const MAX_LEVEL: LevelFilter = LevelFilter::Trace;
#[cfg(not(feature = "verbose"))]
const MAX_LEVEL: LevelFilter = LevelFilter::Info;

pub fn initialize_log() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(MAX_LEVEL))
}

struct StderrLog;

impl log::Log for StderrLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= MAX_LEVEL
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut stderr = std::io::stderr().lock();
        // Nowhere left to report a failed write to.
        let _ = match record.level() {
            Level::Error | Level::Warn | Level::Info => writeln!(stderr, "{}", record.args()),
            Level::Debug | Level::Trace => {
                writeln!(stderr, "[{}] {}", record.target(), record.args())
            }
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
