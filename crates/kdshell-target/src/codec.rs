//! `Content-Length` framed JSON.
//!
//! ```text
//! Content-Length: 34\r\n
//! \r\n
//! {"event":"running","running":true}
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TransportError;

const SEPARATOR: &[u8] = b"\r\n\r\n";
/// A header longer than this without a separator is garbage.
const MAX_HEADER_LEN: usize = 1024;
const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Serialize `message` into one wire frame.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, TransportError> {
    let body = serde_json::to_vec(message).map_err(|e| TransportError::Framing(e.to_string()))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Incremental decoder fed with whatever the transport hands out.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet consumed by a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        let Some(sep) = self
            .buf
            .windows(SEPARATOR.len())
            .position(|w| w == SEPARATOR)
        else {
            if self.buf.len() > MAX_HEADER_LEN {
                return Err(TransportError::Framing(
                    "header exceeds 1024 bytes without terminator".into(),
                ));
            }
            return Ok(None);
        };

        let header = std::str::from_utf8(&self.buf[..sep])
            .map_err(|e| TransportError::Framing(format!("header is not UTF-8: {e}")))?;
        let body_len = parse_content_length(header)?;
        if body_len > MAX_BODY_LEN {
            return Err(TransportError::Framing(format!(
                "frame of {body_len} bytes exceeds limit"
            )));
        }

        let body_start = sep + SEPARATOR.len();
        let end = body_start + body_len;
        if self.buf.len() < end {
            return Ok(None);
        }

        let decoded = serde_json::from_slice(&self.buf[body_start..end])
            .map_err(|e| TransportError::Framing(format!("invalid body: {e}")));
        self.buf.drain(..end);
        decoded.map(Some)
    }
}

fn parse_content_length(header: &str) -> Result<usize, TransportError> {
    for line in header.split("\r\n") {
        if let Some(value) = line.trim().strip_prefix("Content-Length:") {
            let value = value.trim();
            return value.parse::<usize>().map_err(|e| {
                TransportError::Framing(format!("invalid Content-Length value '{value}': {e}"))
            });
        }
    }
    Err(TransportError::Framing("missing Content-Length header".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{TargetCommand, TargetEvent};

    #[test]
    fn frame_has_header_and_body() {
        let frame = encode_frame(&TargetCommand::Break).unwrap();
        let text = String::from_utf8(frame).unwrap();
        assert_eq!(text, "Content-Length: 19\r\n\r\n{\"command\":\"break\"}");
    }

    #[test]
    fn decodes_frame_split_across_reads() {
        let frame = encode_frame(&TargetEvent::Output { text: "kdb:> ".into() }).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.push(&frame[..10]);
        assert_eq!(decoder.next_frame::<TargetEvent>().unwrap(), None);
        decoder.push(&frame[10..]);
        assert_eq!(
            decoder.next_frame::<TargetEvent>().unwrap(),
            Some(TargetEvent::Output { text: "kdb:> ".into() })
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decodes_back_to_back_frames_in_order() {
        let mut bytes = encode_frame(&TargetEvent::Running { running: false }).unwrap();
        bytes.extend(
            encode_frame(&TargetEvent::Module {
                base: 0x8000_0000,
                name: "ntoskrnl.exe".into(),
            })
            .unwrap(),
        );
        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        assert!(matches!(
            decoder.next_frame::<TargetEvent>().unwrap(),
            Some(TargetEvent::Running { running: false })
        ));
        assert!(matches!(
            decoder.next_frame::<TargetEvent>().unwrap(),
            Some(TargetEvent::Module { base: 0x8000_0000, .. })
        ));
        assert_eq!(decoder.next_frame::<TargetEvent>().unwrap(), None);
    }

    #[test]
    fn missing_length_is_framing_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"Bad-Header: 42\r\n\r\n{}");
        let err = decoder.next_frame::<TargetEvent>().unwrap_err();
        assert!(err.to_string().contains("missing Content-Length"), "got: {err}");
    }

    #[test]
    fn runaway_header_is_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[b'x'; 2048]);
        assert!(decoder.next_frame::<TargetEvent>().is_err());
    }

    #[test]
    fn bad_body_is_consumed() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"Content-Length: 2\r\n\r\n{]");
        assert!(decoder.next_frame::<TargetEvent>().is_err());
        assert_eq!(decoder.buffered(), 0);
    }
}
