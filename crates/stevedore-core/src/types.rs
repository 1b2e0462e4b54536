//! Domain types for log streams

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Which of the container's standard streams a log frame belongs to.
///
/// The wire encoding is a single byte at the start of each frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Decode the stream-kind byte of a frame header.
    ///
    /// Returns `None` for bytes outside the protocol's 0/1/2 range.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(StreamKind::Stdin),
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdin => "stdin",
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded log line: stream kind, server-side timestamp, and the text
/// with the timestamp prefix already stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub kind: StreamKind,
    pub timestamp: DateTime<FixedOffset>,
    pub text: String,
}
