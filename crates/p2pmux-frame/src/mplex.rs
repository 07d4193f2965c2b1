use bytes::{Buf, BufMut, Bytes, BytesMut};
use unsigned_varint::{decode, encode};

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::length::LengthPrefix;
use crate::negotiation::encode_negotiation;

/// Largest stream id that fits a one-byte header (5 bits).
pub const MAX_SINGLE_BYTE_STREAM_ID: u32 = 31;

const TYPE_BITS: u32 = 3;
const TYPE_MASK: u64 = 0b111;

/// Mplex message type, the low three bits of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    NewStream = 0,
    MessageReceiver = 1,
    MessageInitiator = 2,
    CloseReceiver = 3,
    CloseInitiator = 4,
    ResetReceiver = 5,
    ResetInitiator = 6,
}

impl MessageType {
    pub const ALL: [MessageType; 7] = [
        MessageType::NewStream,
        MessageType::MessageReceiver,
        MessageType::MessageInitiator,
        MessageType::CloseReceiver,
        MessageType::CloseInitiator,
        MessageType::ResetReceiver,
        MessageType::ResetInitiator,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::NewStream => "new-stream",
            MessageType::MessageReceiver => "message-receiver",
            MessageType::MessageInitiator => "message-initiator",
            MessageType::CloseReceiver => "close-receiver",
            MessageType::CloseInitiator => "close-initiator",
            MessageType::ResetReceiver => "reset-receiver",
            MessageType::ResetInitiator => "reset-initiator",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self> {
        MessageType::ALL
            .get(tag as usize)
            .copied()
            .ok_or(FrameError::UnknownMessageType(tag))
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An mplex frame addressed to one logical stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MplexFrame {
    pub stream_id: u32,
    pub message_type: MessageType,
    pub payload: Bytes,
}

impl MplexFrame {
    pub fn new(stream_id: u32, message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_id,
            message_type,
            payload: payload.into(),
        }
    }

    /// Header value `(stream_id << 3) | message_type`.
    pub fn header(&self) -> u64 {
        (u64::from(self.stream_id) << TYPE_BITS) | u64::from(self.message_type.tag())
    }
}

/// Whether an mplex payload is itself wrapped as a negotiation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nesting {
    /// The payload is carried as is.
    #[default]
    Flat,
    /// The payload is a protocol name negotiated one level down: it gets its
    /// own length prefix inside the mplex payload, so two prefixes precede it.
    DoubleLength,
}

/// Largest stream id representable under a length prefix mode.
pub fn max_stream_id(prefix: LengthPrefix) -> u32 {
    match prefix {
        LengthPrefix::SingleByte => MAX_SINGLE_BYTE_STREAM_ID,
        LengthPrefix::Varint => u32::MAX,
    }
}

/// Encode an mplex frame.
///
/// Wire format (single-byte mode; varint mode uses varints for header and lengths):
/// ```text
/// ┌─────────────────┬───────────────────┬──────────┬──────────────┐
/// │ Header (1B)     │ Outer length (1B) │ Length   │ Payload      │
/// │ id<<3 | type    │ DoubleLength only │ (1B)     │ (Length B)   │
/// └─────────────────┴───────────────────┴──────────┴──────────────┘
/// ```
/// Under [`Nesting::DoubleLength`] the outer length covers the nested frame,
/// i.e. `len + 1` in single-byte mode.
pub fn encode_mplex(
    frame: &MplexFrame,
    nesting: Nesting,
    config: &FrameConfig,
    dst: &mut BytesMut,
) -> Result<()> {
    let prefix = config.length_prefix;
    let max_id = max_stream_id(prefix);
    if frame.stream_id > max_id {
        return Err(FrameError::StreamIdOutOfRange {
            id: u64::from(frame.stream_id),
            max: u64::from(max_id),
        });
    }

    let nested;
    let body: &[u8] = match nesting {
        Nesting::Flat => frame.payload.as_ref(),
        Nesting::DoubleLength => {
            let mut inner = BytesMut::new();
            encode_negotiation(frame.payload.as_ref(), config, &mut inner)?;
            nested = inner;
            nested.as_ref()
        }
    };

    let mut head = BytesMut::with_capacity(16);
    match prefix {
        LengthPrefix::SingleByte => head.put_u8(frame.header() as u8),
        LengthPrefix::Varint => {
            let mut buf = encode::u64_buffer();
            head.put_slice(encode::u64(frame.header(), &mut buf));
        }
    }
    prefix.encode(body.len(), config.max_payload_size, &mut head)?;

    dst.reserve(head.len() + body.len());
    dst.put_slice(&head);
    dst.put_slice(body);
    Ok(())
}

/// Decode an mplex frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// Nested negotiation frames are left inside `payload`; see
/// [`crate::decode_nested`].
pub fn decode_mplex(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<MplexFrame>> {
    let prefix = config.length_prefix;

    let (header, header_len) = match prefix {
        LengthPrefix::SingleByte => match src.first() {
            Some(&byte) => (u64::from(byte), 1),
            None => return Ok(None),
        },
        LengthPrefix::Varint => match decode::u64(src) {
            Ok((value, rest)) => (value, src.len() - rest.len()),
            Err(decode::Error::Insufficient) => return Ok(None),
            Err(err) => return Err(FrameError::InvalidLength(err.to_string())),
        },
    };

    let message_type = MessageType::try_from((header & TYPE_MASK) as u8)?;
    let raw_id = header >> TYPE_BITS;
    let stream_id = u32::try_from(raw_id).map_err(|_| FrameError::StreamIdOutOfRange {
        id: raw_id,
        max: u64::from(u32::MAX),
    })?;

    let Some((len, len_prefix)) = prefix.decode(&src[header_len..], config.max_payload_size)?
    else {
        return Ok(None);
    };

    let total = header_len + len_prefix + len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(header_len + len_prefix);
    let payload = src.split_to(len).freeze();

    Ok(Some(MplexFrame {
        stream_id,
        message_type,
        payload,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::{decode_nested, Negotiation};

    #[test]
    fn header_byte_for_stream_3_initiator_is_26() {
        let mut buf = BytesMut::new();
        let frame = MplexFrame::new(3, MessageType::MessageInitiator, "x");
        encode_mplex(&frame, Nesting::Flat, &FrameConfig::default(), &mut buf).unwrap();
        assert_eq!(buf[0], 26);
        assert_eq!(buf.as_ref(), &[26, 1, b'x']);
    }

    #[test]
    fn roundtrip_all_ids_and_types() {
        let cfg = FrameConfig::default();
        for stream_id in 0..=MAX_SINGLE_BYTE_STREAM_ID {
            for message_type in MessageType::ALL {
                let payload = format!("{stream_id}:{message_type}");
                let frame = MplexFrame::new(stream_id, message_type, payload.clone().into_bytes());

                let mut buf = BytesMut::new();
                encode_mplex(&frame, Nesting::Flat, &cfg, &mut buf).unwrap();
                let decoded = decode_mplex(&mut buf, &cfg).unwrap().unwrap();

                assert_eq!(decoded, frame);
                assert!(buf.is_empty());
            }
        }
    }

    #[test]
    fn max_payload_roundtrips_and_255_is_rejected() {
        let cfg = FrameConfig::default();
        let frame = MplexFrame::new(1, MessageType::MessageReceiver, vec![7u8; 254]);
        let mut buf = BytesMut::new();
        encode_mplex(&frame, Nesting::Flat, &cfg, &mut buf).unwrap();
        assert_eq!(decode_mplex(&mut buf, &cfg).unwrap().unwrap(), frame);

        let too_big = MplexFrame::new(1, MessageType::MessageReceiver, vec![7u8; 255]);
        let err = encode_mplex(&too_big, Nesting::Flat, &cfg, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 255, .. }));
    }

    #[test]
    fn double_length_emits_outer_then_inner_length() {
        let payload = b"/ipfs/ping/1.0.0\n";
        let frame = MplexFrame::new(3, MessageType::MessageInitiator, Bytes::from_static(payload));
        let mut buf = BytesMut::new();
        encode_mplex(&frame, Nesting::DoubleLength, &FrameConfig::default(), &mut buf).unwrap();

        assert_eq!(buf[0], 26);
        assert_eq!(buf[1] as usize, payload.len() + 1);
        assert_eq!(buf[2] as usize, payload.len());
        assert_eq!(&buf[3..], payload);
    }

    #[test]
    fn double_length_ceiling_accounts_for_inner_prefix() {
        let cfg = FrameConfig::default();
        let mut buf = BytesMut::new();

        let fits = MplexFrame::new(3, MessageType::MessageInitiator, vec![b'a'; 253]);
        encode_mplex(&fits, Nesting::DoubleLength, &cfg, &mut buf).unwrap();

        let too_big = MplexFrame::new(3, MessageType::MessageInitiator, vec![b'a'; 254]);
        let err = encode_mplex(&too_big, Nesting::DoubleLength, &cfg, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 255, max: 254 }
        ));
    }

    #[test]
    fn decode_leaves_nested_frame_in_payload() {
        let cfg = FrameConfig::default();
        let frame = MplexFrame::new(3, MessageType::MessageInitiator, "/multistream/1.0.0\n");
        let mut buf = BytesMut::new();
        encode_mplex(&frame, Nesting::DoubleLength, &cfg, &mut buf).unwrap();

        let decoded = decode_mplex(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(decoded.payload[0], 19);
        assert_eq!(decoded.payload.len(), 20);

        let nested = decode_nested(&decoded.payload, &cfg).unwrap();
        assert_eq!(
            nested,
            vec![Negotiation::Message(Bytes::from_static(
                b"/multistream/1.0.0\n"
            ))]
        );
    }

    #[test]
    fn single_byte_rejects_wide_stream_id() {
        let frame = MplexFrame::new(32, MessageType::NewStream, "32");
        let mut buf = BytesMut::new();
        let err =
            encode_mplex(&frame, Nesting::Flat, &FrameConfig::default(), &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::StreamIdOutOfRange { id: 32, max: 31 }
        ));
    }

    #[test]
    fn varint_header_carries_wide_stream_id() {
        let cfg = FrameConfig::varint();
        let frame = MplexFrame::new(1000, MessageType::CloseInitiator, "bye");
        let mut buf = BytesMut::new();
        encode_mplex(&frame, Nesting::Flat, &cfg, &mut buf).unwrap();
        assert_eq!(decode_mplex(&mut buf, &cfg).unwrap().unwrap(), frame);
    }

    #[test]
    fn unknown_message_type_rejected() {
        let mut buf = BytesMut::from(&[0b0001_1111u8, 0][..]);
        let err = decode_mplex(&mut buf, &FrameConfig::default()).unwrap_err();
        assert!(matches!(err, FrameError::UnknownMessageType(7)));
    }

    #[test]
    fn incomplete_frames_wait_for_more() {
        let cfg = FrameConfig::default();
        for partial in [&[][..], &[26][..], &[26, 3, b'a'][..]] {
            let mut buf = BytesMut::from(partial);
            assert!(decode_mplex(&mut buf, &cfg).unwrap().is_none());
            assert_eq!(buf.len(), partial.len());
        }
    }

    #[test]
    fn empty_payload_frame() {
        let cfg = FrameConfig::default();
        let mut buf = BytesMut::from(&[3u8 << 3, 0][..]);
        let frame = decode_mplex(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(frame.stream_id, 3);
        assert_eq!(frame.message_type, MessageType::NewStream);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn message_type_tags_are_stable() {
        for (tag, message_type) in MessageType::ALL.iter().enumerate() {
            assert_eq!(message_type.tag() as usize, tag);
            assert_eq!(MessageType::try_from(tag as u8).unwrap(), *message_type);
        }
    }
}
