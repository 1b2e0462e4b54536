//! Multiplexed container-log streaming
//!
//! The engine serves container logs as binary frames: an 8-byte header
//! (stream kind + big-endian payload length) followed by one UTF-8 log
//! line, itself prefixed with a bracketed timestamp. This module decodes
//! frames ([`frame`]), assembles them into [`stevedore_core::LogRecord`]s
//! and delivers them through the [`LogCallback`] contract, either to the
//! end of the stream ([`fetch_logs`]) or continuously on a background
//! task with a cancellable handle ([`follow_logs`]).

pub mod callback;
pub mod frame;
pub mod reader;

pub use callback::{CollectingCallback, LogCallback, LogControl};
pub use frame::{read_frame, Frame};
pub use reader::{fetch_logs, follow_logs, LogHandle};
