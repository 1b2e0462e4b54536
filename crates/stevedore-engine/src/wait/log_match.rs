//! Log-pattern condition
//!
//! Bridges the background follow-mode log reader into the synchronous
//! poll loop: the regex matcher runs inside the log callback on the
//! reader's task and flips a write-once atomic flag; `check()` only ever
//! reads that flag and never blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::Regex;

use stevedore_core::prelude::*;
use stevedore_core::LogRecord;

use crate::client::{EngineQuery, LogOptions};
use crate::logs::{follow_logs, LogCallback, LogControl, LogHandle};

/// Wait until the container's log output matches a pattern.
///
/// The subscription starts lazily on the first `check()`. A pattern
/// compiled with the inline `(?s)` flag matches across records: all text
/// seen so far is accumulated and re-matched on every new line. Without
/// the flag each record is matched on its own.
pub struct LogPatternCondition {
    engine: Arc<dyn EngineQuery>,
    container_id: String,
    pattern: Regex,
    spans_records: bool,
    matched: Arc<AtomicBool>,
    subscription: Option<LogHandle>,
}

impl std::fmt::Debug for LogPatternCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogPatternCondition")
            .field("container_id", &self.container_id)
            .field("pattern", &self.pattern.as_str())
            .field("spans_records", &self.spans_records)
            .field("matched", &self.matched)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

impl LogPatternCondition {
    pub fn new(engine: Arc<dyn EngineQuery>, container_id: &str, pattern: &str) -> Result<Self> {
        // The (?s) inline flag is how callers opt into patterns spanning
        // multiple records, mirroring its dot-matches-newline meaning.
        let spans_records = pattern.contains("(?s");
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid log wait pattern: {e}")))?;
        Ok(Self {
            engine,
            container_id: container_id.to_string(),
            pattern,
            spans_records,
            matched: Arc::new(AtomicBool::new(false)),
            subscription: None,
        })
    }

    pub fn describe(&self) -> String {
        format!("on log out matching '{}'", self.pattern.as_str())
    }

    pub async fn check(&mut self) -> Result<bool> {
        if self.subscription.is_none() {
            debug!(
                "subscribing to logs of {} for pattern '{}'",
                self.container_id,
                self.pattern.as_str()
            );
            let callback = LogMatchCallback::new(
                self.pattern.clone(),
                self.spans_records,
                Arc::clone(&self.matched),
            );
            self.subscription = Some(follow_logs(
                Arc::clone(&self.engine),
                &self.container_id,
                LogOptions::follow(),
                callback,
            ));
        }
        Ok(self.matched.load(Ordering::Acquire))
    }

    pub async fn cleanup(&mut self) {
        if let Some(subscription) = &self.subscription {
            subscription.finish();
        }
    }
}

/// The callback running on the follow task: matches records against the
/// pattern and requests a stop once satisfied.
struct LogMatchCallback {
    pattern: Regex,
    /// Accumulated text for patterns spanning records; `None` in
    /// single-record mode.
    buffer: Option<String>,
    matched: Arc<AtomicBool>,
}

impl LogMatchCallback {
    fn new(pattern: Regex, spans_records: bool, matched: Arc<AtomicBool>) -> Self {
        Self {
            pattern,
            buffer: spans_records.then(String::new),
            matched,
        }
    }
}

impl LogCallback for LogMatchCallback {
    fn log(&mut self, record: &LogRecord) -> LogControl {
        trace!(
            "trying to match '{}' against '{}'",
            record.text,
            self.pattern.as_str()
        );
        let hit = match &mut self.buffer {
            Some(buffer) => {
                buffer.push_str(&record.text);
                buffer.push('\n');
                self.pattern.is_match(buffer)
            }
            None => self.pattern.is_match(&record.text),
        };
        if hit {
            debug!("found log-wait pattern in log output");
            self.matched.store(true, Ordering::Release);
            LogControl::Stop
        } else {
            LogControl::Continue
        }
    }

    fn error(&mut self, message: &str) {
        warn!("log-wait subscription failed: {message}");
    }
}
