//! # stevedore-engine - Engine Access and Streaming
//!
//! Talks to the container engine's HTTP API and decodes its two streaming
//! response shapes: the chunked JSON progress stream emitted by build,
//! pull and push, and the multiplexed binary log frames emitted by the
//! logs endpoint. On top of the log stream sits the wait engine, a
//! bounded-time poll loop over pluggable readiness conditions.
//!
//! Depends on [`stevedore_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Engine Access (`client`)
//! - [`EngineClient`] - reqwest-backed client (inspect, logs, pull, build)
//! - [`EngineQuery`] - the query surface wait conditions poll
//! - [`UrlBuilder`] - engine API URL construction
//!
//! ### Chunked JSON Streams (`chunked`)
//! - [`process_json_stream()`] - decode concatenated JSON objects
//! - [`JsonStreamHandler`] - per-object handler with start/stop lifecycle
//! - [`ProgressStreamHandler`] - build and pull/push progress profiles
//!
//! ### Log Streams (`logs`)
//! - [`fetch_logs()`] / [`follow_logs()`] - one-shot and cancellable reads
//! - [`LogCallback`] - the open/log/error/close consumer contract
//! - [`LogHandle`] - idempotent cancellation of a follow subscription
//!
//! ### Waiting (`wait`)
//! - [`wait_for()`] - poll an ordered condition list with one time budget
//! - [`WaitCondition`] - http, tcp, exit-code, health and log predicates
//! - [`WaitConfig`] - declarative wait assembly

pub mod chunked;
pub mod client;
pub mod logs;
pub mod wait;

// Public API re-exports
pub use chunked::{
    process_json_stream, JsonStreamHandler, ProgressSink, ProgressStreamHandler, StreamProfile,
};
pub use client::{
    BodyReader, BuildOptions, ContainerStatus, EngineClient, EngineQuery, LogOptions, UrlBuilder,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use logs::{fetch_logs, follow_logs, LogCallback, LogControl, LogHandle};
pub use wait::{
    describe_all, wait_for, Condition, ExitMatch, HttpWait, TcpWait, WaitCondition, WaitConfig,
};
