//! Decoding of chunked JSON response streams
//!
//! Build, pull and push responses are a run-on sequence of JSON objects
//! with no separators and no array wrapper. [`process_json_stream`] turns
//! that byte stream into one [`JsonStreamHandler::process`] call per
//! object, delivering each object as soon as it is complete instead of
//! waiting for the stream to end.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

use stevedore_core::prelude::*;
use stevedore_core::ProgressEvent;

const READ_CHUNK: usize = 8 * 1024;

/// Handler invoked for every decoded object of a chunked JSON stream.
///
/// `start()` runs once before the first read and `stop()` once after the
/// last, on every exit path -- they bracket the acquisition and release of
/// presentation resources such as a progress indicator.
pub trait JsonStreamHandler {
    fn start(&mut self) {}

    /// Handle one decoded object. An error aborts the read loop; `stop()`
    /// still runs before the error reaches the caller.
    fn process(&mut self, json: Value) -> Result<()>;

    fn stop(&mut self) {}
}

/// Decode a chunked JSON stream, invoking `handler` per object.
///
/// Objects may be separated by arbitrary insignificant whitespace;
/// trailing whitespace at end-of-stream is not an error. A malformed or
/// truncated object aborts the read immediately.
pub async fn process_json_stream<H, R>(handler: &mut H, mut reader: R) -> Result<()>
where
    H: JsonStreamHandler,
    R: AsyncRead + Unpin,
{
    handler.start();
    let result = decode_objects(handler, &mut reader).await;
    handler.stop();
    result
}

async fn decode_objects<H, R>(handler: &mut H, reader: &mut R) -> Result<()>
where
    H: JsonStreamHandler,
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return drain_buffer(handler, &mut buf, true);
        }
        buf.extend_from_slice(&chunk[..n]);
        drain_buffer(handler, &mut buf, false)?;
    }
}

/// Deliver every complete object currently in `buf`, leaving any
/// incomplete tail for the next read. With `at_eof` an incomplete tail is
/// a protocol error instead.
fn drain_buffer<H>(handler: &mut H, buf: &mut Vec<u8>, at_eof: bool) -> Result<()>
where
    H: JsonStreamHandler,
{
    loop {
        let (value, consumed) = {
            let mut objects = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();
            match objects.next() {
                // Nothing but insignificant whitespace left.
                None => (None, buf.len()),
                Some(Ok(value)) => {
                    let consumed = objects.byte_offset();
                    (Some(value), consumed)
                }
                Some(Err(e)) if e.is_eof() && !at_eof => return Ok(()),
                Some(Err(e)) if e.is_eof() => {
                    return Err(Error::protocol(format!(
                        "truncated JSON object at end of stream: {e}"
                    )));
                }
                Some(Err(e)) => {
                    return Err(Error::protocol(format!("malformed JSON object: {e}")));
                }
            }
        };
        buf.drain(..consumed);
        match value {
            Some(value) => handler.process(value)?,
            None => return Ok(()),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Progress indicator plumbing
// ─────────────────────────────────────────────────────────

/// The single-slot progress indicator a decode session drives.
///
/// `begin()` and `end()` always arrive in pairs: the handler activates the
/// indicator on the first progress object and releases it as soon as a
/// non-progress object appears or the stream ends.
pub trait ProgressSink {
    fn begin(&mut self);
    fn update(&mut self, current: u64, total: u64);
    fn end(&mut self);
}

/// Which fields of the stream a handler surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProfile {
    /// Surfaces all `stream`/`status` text.
    Build,
    /// Filters routine status lines (layer-existence checks and friends)
    /// down to download/pull related ones.
    PullPush,
}

static PULL_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("Download|Pulling").expect("Invalid pull status regex"));

/// Stream handler for build/pull/push responses.
///
/// Classifies each object, surfaces informational text, drives the
/// progress indicator and turns in-band `error` objects into a fatal
/// [`Error::Engine`] that stops the decode loop.
pub struct ProgressStreamHandler<S> {
    profile: StreamProfile,
    sink: S,
    active: bool,
}

impl<S: ProgressSink> ProgressStreamHandler<S> {
    pub fn build(sink: S) -> Self {
        Self::new(StreamProfile::Build, sink)
    }

    pub fn pull_push(sink: S) -> Self {
        Self::new(StreamProfile::PullPush, sink)
    }

    pub fn new(profile: StreamProfile, sink: S) -> Self {
        Self {
            profile,
            sink,
            active: false,
        }
    }

    /// Return the indicator to idle, if it was active.
    fn leave_active(&mut self) {
        if self.active {
            self.sink.end();
            self.active = false;
        }
    }

    fn surface(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Stream(text) => {
                info!("{}", text.trim_end());
            }
            ProgressEvent::Status { id, text } => {
                if self.profile == StreamProfile::PullPush && !PULL_STATUS.is_match(text) {
                    debug!("{}", text);
                    return;
                }
                match id {
                    Some(id) => info!("  {id} {text}"),
                    None => info!("  {text}"),
                }
            }
            _ => {}
        }
    }
}

impl<S: ProgressSink> JsonStreamHandler for ProgressStreamHandler<S> {
    fn process(&mut self, json: Value) -> Result<()> {
        match ProgressEvent::classify(&json) {
            ProgressEvent::Error { message, detail } => {
                self.leave_active();
                Err(Error::Engine { message, detail })
            }
            ProgressEvent::Progress { current, total } => {
                if !self.active {
                    self.sink.begin();
                    self.active = true;
                }
                self.sink.update(current, total);
                Ok(())
            }
            event => {
                self.leave_active();
                self.surface(&event);
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        self.leave_active();
    }
}
