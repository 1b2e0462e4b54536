//! Log stream reading: one-shot fetch and cancellable follow
//!
//! [`fetch_logs`] drives the frame decoder to the end of the stream on the
//! caller's task. [`follow_logs`] runs the same loop on a background task
//! and hands back a [`LogHandle`] whose `finish()` aborts the underlying
//! stream; dropping the response body tears the HTTP request down.

use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use stevedore_core::prelude::*;
use stevedore_core::{parse_timestamp, receipt_time, LogRecord};

use super::callback::{LogCallback, LogControl};
use super::frame::{read_frame, Frame};
use crate::client::{EngineQuery, LogOptions};

// Log lines arrive as "[<timestamp>] <text>" (brackets optional). (?s)
// lets a single record span multiple inner lines.
static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\[?(?P<timestamp>[^\s\]]*)\]?\s+(?P<entry>.*?)\s*$")
        .expect("Invalid log line regex")
});

/// Fetch a container's logs to the end of the stream.
///
/// All failures are reported through `callback.error()`; `open()` and
/// `close()` bracket the whole read regardless of outcome.
pub async fn fetch_logs<C>(
    engine: &dyn EngineQuery,
    container_id: &str,
    options: &LogOptions,
    callback: &mut C,
) where
    C: LogCallback,
{
    callback.open();
    match engine.container_logs(container_id, options).await {
        Ok(mut body) => read_records(&mut body, callback).await,
        Err(e) => callback.error(&format!("cannot open log stream: {e}")),
    }
    callback.close();
}

/// Follow a container's logs on a background task.
///
/// The returned handle aborts the stream via [`LogHandle::finish`]; the
/// callback's `close()` runs on the task before it ends, whatever the
/// reason.
pub fn follow_logs<C>(
    engine: Arc<dyn EngineQuery>,
    container_id: &str,
    options: LogOptions,
    mut callback: C,
) -> LogHandle
where
    C: LogCallback + 'static,
{
    let (finish_tx, finish_rx) = oneshot::channel::<()>();
    let container_id = container_id.to_string();

    let task = tokio::spawn(async move {
        callback.open();
        {
            let read = async {
                match engine.container_logs(&container_id, &options).await {
                    Ok(mut body) => read_records(&mut body, &mut callback).await,
                    Err(e) => callback.error(&format!("cannot open log stream: {e}")),
                }
            };
            tokio::pin!(read);
            tokio::select! {
                _ = &mut read => {}
                _ = finish_rx => {
                    debug!("log follow aborted by finish()");
                }
            }
        }
        callback.close();
    });

    LogHandle {
        finish_tx: Mutex::new(Some(finish_tx)),
        task: Mutex::new(Some(task)),
    }
}

/// Handle to a follow-mode log subscription.
pub struct LogHandle {
    finish_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LogHandle {
    /// Abort the underlying stream.
    ///
    /// Safe to call any number of times, from any thread, including after
    /// the read loop already finished on its own.
    pub fn finish(&self) {
        let sender = self.finish_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(tx) = sender {
            // The task may have completed already; a dead receiver is fine.
            let _ = tx.send(());
        }
    }

    /// Wait for the background task to end. Returns immediately when it
    /// already has, or when `join` was called before.
    pub async fn join(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// The shared frame → record loop.
///
/// Ends cleanly at end-of-stream or on a callback stop request; any
/// protocol error is reported once and ends the read without resync.
async fn read_records<R, C>(reader: &mut R, callback: &mut C)
where
    R: AsyncRead + Unpin,
    C: LogCallback,
{
    loop {
        match read_frame(reader).await {
            Ok(None) => return,
            Ok(Some(frame)) => match assemble_record(&frame) {
                Ok(record) => {
                    if callback.log(&record) == LogControl::Stop {
                        debug!("log callback requested stop");
                        return;
                    }
                }
                Err(e) => {
                    callback.error(&e.to_string());
                    return;
                }
            },
            Err(e) => {
                callback.error(&e.to_string());
                return;
            }
        }
    }
}

/// Split a frame payload into timestamp and text.
fn assemble_record(frame: &Frame) -> Result<LogRecord> {
    let text = std::str::from_utf8(&frame.payload)
        .map_err(|e| Error::protocol(format!("log payload is not valid UTF-8: {e}")))?;

    let captures = LOG_LINE.captures(text).ok_or_else(|| {
        Error::protocol(format!(
            "unexpected log line '{text}' (expected \"<timestamp> <text>\")"
        ))
    })?;

    let token = &captures["timestamp"];
    let timestamp = if token.is_empty() {
        receipt_time()
    } else {
        parse_timestamp(token)
            .ok_or_else(|| Error::protocol(format!("invalid log timestamp '{token}'")))?
    };

    Ok(LogRecord {
        kind: frame.kind,
        timestamp,
        text: captures["entry"].to_string(),
    })
}
