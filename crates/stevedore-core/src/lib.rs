//! # stevedore-core - Core Domain Types
//!
//! Foundation crate for Stevedore. Provides the error taxonomy, log-stream
//! domain types, timestamp parsing, and the progress-event model used when
//! decoding the engine's chunked JSON responses.
//!
//! This crate has **zero internal dependencies** -- it only depends on
//! external crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`StreamKind`] - Which standard stream a log frame belongs to
//! - [`LogRecord`] - One decoded log line with stream kind, timestamp, text
//!
//! ### Progress (`progress`)
//! - [`ProgressEvent`] - Classification of one chunked-JSON progress object
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum covering protocol, engine, config and wait failures
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ### Timestamps (`timestamp`)
//! - [`parse_timestamp()`] - Parse the engine's RFC 3339 log timestamps
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use stevedore_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod progress;
pub mod timestamp;
pub mod types;

/// Prelude for common imports used throughout all Stevedore crates
pub mod prelude {
    pub use super::error::{Error, Result};
    pub use tracing::{debug, error, info, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result};
pub use progress::ProgressEvent;
pub use timestamp::{parse_timestamp, receipt_time};
pub use types::{LogRecord, StreamKind};
