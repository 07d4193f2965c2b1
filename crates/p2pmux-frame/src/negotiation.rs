use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{FrameConfig, ZeroLength};
use crate::error::{FrameError, Result};

/// A decoded multistream-select negotiation frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// A protocol name or other payload, verbatim.
    Message(Bytes),
    /// A zero-length frame read under [`ZeroLength::EndOfMessage`].
    EndOfMessage,
}

impl Negotiation {
    /// Payload bytes, or `None` for the end-of-message signal.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Negotiation::Message(payload) => Some(payload.as_ref()),
            Negotiation::EndOfMessage => None,
        }
    }

    /// True if this is a message whose payload equals `literal`.
    pub fn is(&self, literal: &[u8]) -> bool {
        self.payload() == Some(literal)
    }

    /// Printable rendering for logs and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Negotiation::Message(payload) => String::from_utf8_lossy(payload).into_owned(),
            Negotiation::EndOfMessage => "<end-of-message>".to_string(),
        }
    }
}

/// Encode a negotiation frame.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬──────────────────┐
/// │ Length             │ Payload          │
/// │ (1B, or varint)    │ (Length bytes)   │
/// └────────────────────┴──────────────────┘
/// ```
pub fn encode_negotiation(payload: &[u8], config: &FrameConfig, dst: &mut BytesMut) -> Result<()> {
    let prefix = config.length_prefix;
    dst.reserve(prefix.encoded_len(payload.len()) + payload.len());
    prefix.encode(payload.len(), config.max_payload_size, dst)?;
    dst.put_slice(payload);
    Ok(())
}

/// Decode a negotiation frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// A zero length consumes exactly the prefix byte and yields the signal chosen
/// by [`FrameConfig::zero_length`].
pub fn decode_negotiation(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Negotiation>> {
    let Some((len, prefix_len)) = config
        .length_prefix
        .decode(src, config.max_payload_size)?
    else {
        return Ok(None);
    };

    if len == 0 {
        src.advance(prefix_len);
        return Ok(Some(match config.zero_length {
            ZeroLength::EndOfMessage => Negotiation::EndOfMessage,
            ZeroLength::EmptyMessage => Negotiation::Message(Bytes::new()),
        }));
    }

    if src.len() < prefix_len + len {
        return Ok(None);
    }

    src.advance(prefix_len);
    Ok(Some(Negotiation::Message(src.split_to(len).freeze())))
}

/// Decode every negotiation frame nested inside an mplex payload.
///
/// Mplex decoding never peels nested frames on its own; callers that know a
/// payload carries double-length framing make this second, explicit call.
pub fn decode_nested(payload: &[u8], config: &FrameConfig) -> Result<Vec<Negotiation>> {
    let mut buf = BytesMut::from(payload);
    let mut frames = Vec::new();
    while !buf.is_empty() {
        match decode_negotiation(&mut buf, config)? {
            Some(frame) => frames.push(frame),
            None => return Err(FrameError::TruncatedStream),
        }
    }
    Ok(frames)
}
