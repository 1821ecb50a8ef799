use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::{Result, RollcallError};

/// Upper bound on a single frame. Longer lines are rejected as malformed.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Serialize a record into one newline-terminated frame.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<String> {
    let mut frame = serde_json::to_string(message)
        .map_err(|e| RollcallError::Internal(format!("encode failed: {}", e)))?;
    frame.push('\n');
    Ok(frame)
}

/// Parse one frame. A trailing delimiter (and `\r`) is tolerated.
pub fn decode_frame<T: DeserializeOwned>(frame: &str) -> Result<T> {
    let payload = frame.trim_end_matches(['\n', '\r']);
    Ok(serde_json::from_str(payload)?)
}

/// Line-delimited JSON codec: decodes `In`, encodes `Out`.
///
/// The coordinator uses `FrameCodec<Event, Response>`, nodes use the mirror
/// image `FrameCodec<Response, Event>`.
pub struct FrameCodec<In, Out> {
    lines: LinesCodec,
    _marker: PhantomData<fn(Out) -> In>,
}

impl<In, Out> FrameCodec<In, Out> {
    pub fn new() -> Self {
        Self::with_max_length(MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            _marker: PhantomData,
        }
    }
}

impl<In, Out> Default for FrameCodec<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

fn lines_error(e: LinesCodecError) -> RollcallError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            RollcallError::MalformedMessage("frame exceeds maximum length".to_string())
        }
        LinesCodecError::Io(e) => RollcallError::Transport(e),
    }
}

impl<In: DeserializeOwned, Out> Decoder for FrameCodec<In, Out> {
    type Item = In;
    type Error = RollcallError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<In>> {
        match self.lines.decode(src).map_err(lines_error)? {
            Some(line) => decode_frame(&line).map(Some),
            None => Ok(None),
        }
    }
}

impl<In, Out: Serialize> Encoder<Out> for FrameCodec<In, Out> {
    type Error = RollcallError;

    fn encode(&mut self, item: Out, dst: &mut BytesMut) -> Result<()> {
        let payload = serde_json::to_string(&item)
            .map_err(|e| RollcallError::Internal(format!("encode failed: {}", e)))?;
        self.lines.encode(payload, dst).map_err(lines_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Action, Event, Response};

    #[test]
    fn encoded_frame_has_single_trailing_newline() {
        let event = Event::new(1, Action::JobResult, "s").with_param("data", "line1\nline2");
        let frame = encode_frame(&event).unwrap();
        assert!(frame.ends_with('\n'));
        assert_eq!(frame.matches('\n').count(), 1);
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode_frame::<Event>("not json\n");
        assert!(matches!(result, Err(RollcallError::MalformedMessage(_))));
    }

    #[test]
    fn codec_waits_for_delimiter() {
        let mut codec = FrameCodec::<Response, Event>::new();
        let frame = encode_frame(&Response::success("checkin successful")).unwrap();
        let (head, tail) = frame.split_at(10);

        let mut buf = BytesMut::from(head);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(tail.as_bytes());
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.response_message, "checkin successful");
    }

    #[test]
    fn codec_rejects_oversized_frame() {
        let mut codec = FrameCodec::<Event, Response>::with_max_length(16);
        let mut buf = BytesMut::from(&b"{\"Id\":1,\"Action\":\"checkin\"}\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(RollcallError::MalformedMessage(_))
        ));
    }

    #[test]
    fn codec_encodes_newline_terminated_json() {
        let mut codec = FrameCodec::<Event, Response>::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Response::failure("checkin failed"), &mut buf)
            .unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));
        let decoded: Response = decode_frame(std::str::from_utf8(&buf).unwrap()).unwrap();
        assert_eq!(decoded.response_code, 1);
    }
}
