//! Classification of chunked JSON progress objects
//!
//! Build, pull and push responses arrive as a run-on sequence of JSON
//! objects. Each object is classified into exactly one [`ProgressEvent`]
//! variant; an `error` key always wins over everything else.

use serde_json::Value;

/// One classified progress object from a build/pull/push response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Raw build output (`stream` key), trailing newline removed.
    Stream(String),
    /// An informational status line (`status` key), optionally tagged with
    /// a layer id.
    Status { id: Option<String>, text: String },
    /// A progress update with numeric byte counts (`progressDetail` key).
    Progress { current: u64, total: u64 },
    /// An error the engine reported in-band (`error` key, optionally with
    /// an `errorDetail.message`).
    Error {
        message: String,
        detail: Option<String>,
    },
}

impl ProgressEvent {
    /// Classify one decoded object.
    ///
    /// Objects carrying none of the recognized keys degrade to a
    /// [`ProgressEvent::Status`] showing the raw JSON, so nothing the
    /// engine says is silently dropped.
    pub fn classify(json: &Value) -> Self {
        if let Some(message) = json.get("error").and_then(Value::as_str) {
            let detail = json
                .pointer("/errorDetail/message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|d| !d.is_empty() && *d != message.trim())
                .map(String::from);
            return ProgressEvent::Error {
                message: message.trim().to_string(),
                detail,
            };
        }

        if let (Some(current), Some(total)) = (
            json.pointer("/progressDetail/current").and_then(Value::as_u64),
            json.pointer("/progressDetail/total").and_then(Value::as_u64),
        ) {
            return ProgressEvent::Progress { current, total };
        }

        if let Some(stream) = json.get("stream").and_then(Value::as_str) {
            let text = stream.strip_suffix('\n').unwrap_or(stream);
            return ProgressEvent::Stream(text.to_string());
        }

        if let Some(status) = json.get("status").and_then(Value::as_str) {
            let id = json
                .get("id")
                .and_then(Value::as_str)
                .map(String::from);
            return ProgressEvent::Status {
                id,
                text: status.trim().to_string(),
            };
        }

        ProgressEvent::Status {
            id: None,
            text: json.to_string(),
        }
    }

    /// Whether this event drives the progress indicator.
    pub fn is_progress(&self) -> bool {
        matches!(self, ProgressEvent::Progress { .. })
    }
}
