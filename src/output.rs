//! Terminal-facing sinks for streamed output

use std::io::Write;

use stevedore_core::{LogRecord, StreamKind};
use stevedore_engine::{LogCallback, LogControl, ProgressSink};

/// Progress indicator rendered as a single rewritten stderr line.
#[derive(Debug, Default)]
pub struct TermProgress;

impl ProgressSink for TermProgress {
    fn begin(&mut self) {}

    fn update(&mut self, current: u64, total: u64) {
        let percent = if total > 0 {
            (current as f64 / total as f64 * 100.0) as u64
        } else {
            0
        };
        eprint!("\r  {current}/{total} bytes ({percent}%)");
        let _ = std::io::stderr().flush();
    }

    fn end(&mut self) {
        eprintln!();
    }
}

/// Prints log records to stdout, stderr records to stderr.
#[derive(Debug)]
pub struct PrintCallback {
    show_timestamps: bool,
}

impl PrintCallback {
    pub fn new(show_timestamps: bool) -> Self {
        Self { show_timestamps }
    }

    fn format(&self, record: &LogRecord) -> String {
        if self.show_timestamps {
            format!("{} {}", record.timestamp.to_rfc3339(), record.text)
        } else {
            record.text.clone()
        }
    }
}

impl LogCallback for PrintCallback {
    fn log(&mut self, record: &LogRecord) -> LogControl {
        let line = self.format(record);
        match record.kind {
            StreamKind::Stderr => eprintln!("{line}"),
            _ => println!("{line}"),
        }
        LogControl::Continue
    }

    fn error(&mut self, message: &str) {
        tracing::error!("log stream failed: {message}");
    }
}
