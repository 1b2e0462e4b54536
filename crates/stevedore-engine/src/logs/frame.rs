//! Multiplexed log-frame wire format
//!
//! Each frame is an 8-byte header followed by its payload:
//! `[1 byte stream kind][3 reserved bytes][4 bytes big-endian length]`.
//! Stream kind is 0 for stdin, 1 for stdout, 2 for stderr; the length
//! counts the UTF-8 payload bytes that follow immediately.

use tokio::io::{AsyncRead, AsyncReadExt};

use stevedore_core::prelude::*;
use stevedore_core::StreamKind;

pub(crate) const FRAME_HEADER_LEN: usize = 8;

/// One decoded frame. Ephemeral -- produced per read, consumed by the
/// record assembly in `reader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: StreamKind,
    pub payload: Vec<u8>,
}

/// Read the next frame.
///
/// `Ok(None)` is the clean end of the stream: exactly zero bytes were
/// available where a header was expected. A header cut short after 1-7
/// bytes, an undeclared stream kind, or a payload shorter than its
/// declared length are all corrupt-stream errors; the diagnostics carry
/// the raw header bytes in hex. Frames with a zero length are skipped.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let got = fill(reader, &mut header).await?;
        if got == 0 {
            return Ok(None);
        }
        if got < FRAME_HEADER_LEN {
            return Err(Error::protocol(format!(
                "truncated frame header: read {got} of {FRAME_HEADER_LEN} bytes [{}]",
                hex(&header[..got])
            )));
        }

        let Some(kind) = StreamKind::from_byte(header[0]) else {
            return Err(Error::protocol(format!(
                "unknown stream kind {} in frame header [{}]",
                header[0],
                hex(&header)
            )));
        };
        let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        // Empty messages carry no payload; keep reading.
        if length == 0 {
            continue;
        }

        let mut payload = vec![0u8; length];
        let got = fill(reader, &mut payload).await?;
        if got < length {
            return Err(Error::protocol(format!(
                "truncated frame payload: read {got} of {length} bytes [header: {}]",
                hex(&header)
            )));
        }

        return Ok(Some(Frame { kind, payload }));
    }
}

/// Read until `buf` is full or the stream ends, returning the number of
/// bytes actually read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Encode a frame for the wire. Test plumbing for everything downstream
/// of the reader.
#[cfg(any(test, feature = "test-helpers"))]
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.push(match kind {
        StreamKind::Stdin => 0,
        StreamKind::Stdout => 1,
        StreamKind::Stderr => 2,
    });
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_frame_roundtrip() {
        let bytes = encode_frame(StreamKind::Stdout, b"hello");
        let mut input = &bytes[..];

        let frame = read_frame(&mut input).await.unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Stdout);
        assert_eq!(frame.payload, b"hello");

        assert!(read_frame(&mut input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_byte_stream_is_clean_end() {
        let mut input: &[u8] = &[];
        assert!(read_frame(&mut input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_header_is_corrupt() {
        let mut input: &[u8] = &[1, 0, 0];
        let err = read_frame(&mut input).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("truncated frame header"), "{msg}");
        assert!(msg.contains("read 3 of 8"), "{msg}");
        assert!(msg.contains("010000"), "header hex missing: {msg}");
    }

    #[tokio::test]
    async fn test_declared_length_longer_than_stream() {
        let mut bytes = encode_frame(StreamKind::Stderr, b"full payload");
        bytes.truncate(FRAME_HEADER_LEN + 4);
        let mut input = &bytes[..];

        let err = read_frame(&mut input).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("truncated frame payload"), "{msg}");
        assert!(msg.contains("read 4 of 12"), "{msg}");
        assert!(msg.contains("header:"), "{msg}");
    }

    #[tokio::test]
    async fn test_zero_length_frame_skipped() {
        let mut bytes = encode_frame(StreamKind::Stdout, b"");
        bytes.extend_from_slice(&encode_frame(StreamKind::Stderr, b"after"));
        let mut input = &bytes[..];

        let frame = read_frame(&mut input).await.unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Stderr);
        assert_eq!(frame.payload, b"after");
    }

    #[tokio::test]
    async fn test_unknown_stream_kind_is_corrupt() {
        let mut bytes = encode_frame(StreamKind::Stdout, b"x");
        bytes[0] = 7;
        let mut input = &bytes[..];

        let err = read_frame(&mut input).await.unwrap_err();
        assert!(err.to_string().contains("unknown stream kind 7"));
    }

    #[tokio::test]
    async fn test_header_split_across_reads() {
        let bytes = encode_frame(StreamKind::Stdout, b"split");
        let mut reader = tokio_test::io::Builder::new()
            .read(&bytes[..3])
            .read(&bytes[3..10])
            .read(&bytes[10..])
            .build();

        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.payload, b"split");
    }
}
