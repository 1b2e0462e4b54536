//! Error types shared by all Stevedore crates

use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {message}")]
    Http { message: String },

    // ─────────────────────────────────────────────────────────────
    // Wire Protocol Errors
    // ─────────────────────────────────────────────────────────────
    /// A malformed or truncated frame or JSON object. Fatal to the stream
    /// that produced it, never to anything else.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Engine Errors
    // ─────────────────────────────────────────────────────────────
    /// An error the engine reported explicitly inside a response body.
    #[error("Engine error: {message}{}", .detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Engine {
        message: String,
        detail: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: std::path::PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Wait Errors
    // ─────────────────────────────────────────────────────────────
    /// No wait condition matched inside the allowed time budget.
    #[error("No condition matched after {:?}", .elapsed)]
    WaitTimeout { elapsed: Duration },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an [`Error::Engine`] without detail.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
            detail: None,
        }
    }

    /// Create an [`Error::Engine`], dropping a detail that is empty or
    /// merely repeats the message.
    pub fn engine_with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        let message = message.into();
        let detail = detail.into();
        let detail = if detail.is_empty() || detail == message {
            None
        } else {
            Some(detail)
        };
        Self::Engine { message, detail }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn wait_timeout(elapsed: Duration) -> Self {
        Self::WaitTimeout { elapsed }
    }

    /// Check if this error may never be resolved by retrying.
    ///
    /// Wait conditions treat these as a reason to abort the whole poll loop
    /// instead of reporting "not yet".
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::ConfigNotFound { .. } | Error::Engine { .. }
        )
    }

    /// Elapsed duration carried by a [`Error::WaitTimeout`], if any.
    pub fn waited(&self) -> Option<Duration> {
        match self {
            Error::WaitTimeout { elapsed } => Some(*elapsed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::protocol("bad header");
        assert_eq!(err.to_string(), "Protocol error: bad header");

        let err = Error::config("no HEALTHCHECK configured");
        assert!(err.to_string().contains("no HEALTHCHECK configured"));
    }

    #[test]
    fn test_engine_error_with_distinct_detail() {
        let err = Error::engine_with_detail("build failed", "exit status 2");
        assert_eq!(err.to_string(), "Engine error: build failed (exit status 2)");
    }

    #[test]
    fn test_engine_error_suppresses_duplicate_detail() {
        let err = Error::engine_with_detail("build failed", "build failed");
        assert_eq!(err.to_string(), "Engine error: build failed");

        let err = Error::engine_with_detail("build failed", "");
        assert_eq!(err.to_string(), "Engine error: build failed");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::config("bad method").is_fatal());
        assert!(Error::engine("pull failed").is_fatal());
        assert!(!Error::protocol("short read").is_fatal());
        assert!(!Error::wait_timeout(Duration::from_millis(100)).is_fatal());
    }

    #[test]
    fn test_waited_accessor() {
        let err = Error::wait_timeout(Duration::from_millis(1500));
        assert_eq!(err.waited(), Some(Duration::from_millis(1500)));
        assert_eq!(Error::ChannelClosed.waited(), None);
    }
}
