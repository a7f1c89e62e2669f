use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

/// Lines logged during this run, kept so a failure payload can carry them.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    fn push(&self, record: &Record) {
        self.lines.lock().push(format!(
            "{} {:<5} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            record.level(),
            record.args()
        ));
    }
}

/// env_logger with a copy of every emitted record kept in memory.
struct CaptureLogger {
    inner: env_logger::Logger,
    capture: LogCapture,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.inner.matches(record) {
            self.capture.push(record);
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Default level for a `-v` count.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Install the logger. `RUST_LOG` still wins over `-v`.
pub fn init(verbosity: u8) -> LogCapture {
    let default_level = level_for(verbosity).to_string().to_lowercase();
    let inner = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
        .target(env_logger::Target::Stderr)
        .build();
    let max_level = inner.filter();
    let capture = LogCapture::default();

    let logger = CaptureLogger {
        inner,
        capture: capture.clone(),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
    capture
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(7), LevelFilter::Debug);
    }

    #[test]
    fn capture_records_formatted_lines() {
        let capture = LogCapture::default();
        capture.push(
            &Record::builder()
                .args(format_args!("stopping {}", "ingest"))
                .level(log::Level::Info)
                .build(),
        );
        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("INFO  stopping ingest"));
    }
}
