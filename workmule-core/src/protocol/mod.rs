//! Work request/response frames
//!
//! Defines the records exchanged over the worker's standard streams
//! and the length-delimited codec for them. Each frame is a LEB128
//! varint length prefix followed by a JSON body. The worker reads one
//! request at a time and answers with exactly one response; a clean
//! end of stream at a frame boundary is the host's shutdown signal.

use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on a single frame body. Anything larger is treated as
/// a corrupt stream rather than an allocation request.
const MAX_FRAME_LEN: u64 = 256 * 1024 * 1024;

/// One logical invocation of the wrapped program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Opaque pass-through id echoed in the response; zero when the
    /// host omits it.
    #[serde(default)]
    pub request_id: u64,
}

/// Result of one logical invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkResponse {
    /// Everything the program wrote to either output channel, in
    /// write order.
    pub output: String,
    pub exit_code: i32,
    #[serde(default)]
    pub request_id: u64,
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("i/o error on frame channel")]
    Io(#[from] io::Error),
    #[error("frame channel ended mid-record")]
    Truncated,
    #[error("frame length {0} exceeds limit")]
    Oversized(u64),
    #[error("malformed frame body")]
    Decode(#[from] serde_json::Error),
}

/// Reads the next request. `Ok(None)` is a clean end of stream
/// observed at a frame boundary, i.e. the host is done with us.
pub fn read_request<R: BufRead>(input: &mut R) -> Result<Option<WorkRequest>, FrameError> {
    read_frame(input)
}

/// Encodes one response, writes it length-delimited, and flushes.
pub fn write_response<W: Write>(output: &mut W, response: &WorkResponse) -> Result<(), FrameError> {
    write_frame(output, response)
}

/// Host-side mirror of [`write_response`], for embedders driving a
/// worker subprocess.
pub fn write_request<W: Write>(output: &mut W, request: &WorkRequest) -> Result<(), FrameError> {
    write_frame(output, request)
}

/// Host-side mirror of [`read_request`].
pub fn read_response<R: BufRead>(input: &mut R) -> Result<Option<WorkResponse>, FrameError> {
    read_frame(input)
}

fn read_frame<R: BufRead, T: DeserializeOwned>(input: &mut R) -> Result<Option<T>, FrameError> {
    let Some(len) = read_varint(input)? else {
        return Ok(None);
    };
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversized(len));
    }
    let mut body = vec![0u8; len as usize];
    input.read_exact(&mut body).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => FrameError::Truncated,
        _ => FrameError::Io(err),
    })?;
    Ok(Some(serde_json::from_slice(&body)?))
}

fn write_frame<W: Write, T: Serialize>(output: &mut W, frame: &T) -> Result<(), FrameError> {
    let body = serde_json::to_vec(frame)?;
    write_varint(output, body.len() as u64)?;
    output.write_all(&body)?;
    output.flush()?;
    Ok(())
}

/// LEB128 length prefix. `None` means the stream ended before the
/// first byte; ending between continuation bytes is a truncated frame.
fn read_varint<R: BufRead>(input: &mut R) -> Result<Option<u64>, FrameError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let mut byte = [0u8; 1];
        loop {
            match input.read(&mut byte) {
                Ok(0) if shift == 0 => return Ok(None),
                Ok(0) => return Err(FrameError::Truncated),
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
        if shift >= 64 {
            return Err(FrameError::Oversized(u64::MAX));
        }
    }
}

fn write_varint<W: Write>(output: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            return output.write_all(&[byte]);
        }
        output.write_all(&[byte | 0x80])?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip_varint(value: u64) {
        let mut buf = Vec::new();
        write_varint(&mut buf, value).unwrap();
        let got = read_varint(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(got, Some(value));
    }

    #[test]
    fn varint_roundtrip() {
        for value in [0, 1, 127, 128, 300, 16_384, u64::from(u32::MAX), u64::MAX] {
            roundtrip_varint(value);
        }
    }

    #[test]
    fn request_roundtrip() {
        let request = WorkRequest {
            arguments: vec!["compile".into(), "--out".into(), "a.js".into()],
            request_id: 7,
        };
        let mut buf = Vec::new();
        write_request(&mut buf, &request).unwrap();
        let got = read_request(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(got, Some(request));
    }

    #[test]
    fn empty_stream_is_clean_shutdown() {
        let got = read_request(&mut Cursor::new(Vec::new())).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn stream_ending_mid_body_is_truncated() {
        let request = WorkRequest::default();
        let mut buf = Vec::new();
        write_request(&mut buf, &request).unwrap();
        buf.truncate(buf.len() - 1);
        let err = read_request(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, FrameError::Truncated));
    }

    #[test]
    fn stream_ending_mid_prefix_is_truncated() {
        // continuation bit set, then nothing
        let err = read_request(&mut Cursor::new(vec![0x80])).unwrap_err();
        assert!(matches!(err, FrameError::Truncated));
    }

    #[test]
    fn garbage_body_is_decode_error() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 3).unwrap();
        buf.extend_from_slice(b"{{{");
        let err = read_request(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut buf = Vec::new();
        write_varint(&mut buf, MAX_FRAME_LEN + 1).unwrap();
        let err = read_request(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, FrameError::Oversized(_)));
    }

    #[test]
    fn request_id_defaults_to_zero() {
        let body = br#"{"arguments":["x"]}"#;
        let mut buf = Vec::new();
        write_varint(&mut buf, body.len() as u64).unwrap();
        buf.extend_from_slice(body);
        let got = read_request(&mut Cursor::new(&buf)).unwrap().unwrap();
        assert_eq!(got.request_id, 0);
        assert_eq!(got.arguments, vec!["x".to_string()]);
    }

    #[test]
    fn response_roundtrip_preserves_fields() {
        let response = WorkResponse {
            output: "done".into(),
            exit_code: 1,
            request_id: 42,
        };
        let mut buf = Vec::new();
        write_response(&mut buf, &response).unwrap();
        let got = read_response(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(got, Some(response));
    }
}
