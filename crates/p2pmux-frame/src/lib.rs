//! Frame codecs for multistream-select negotiation and mplex multiplexing.
//!
//! Two layers share one byte stream:
//! - Negotiation frames: a length prefix followed by a protocol name
//! - Mplex frames: a header `(stream_id << 3) | message_type`, a length
//!   prefix, then the payload
//!
//! The length prefix is its own codec ([`LengthPrefix`]): the single-byte form
//! used for short handshakes, or an unsigned varint.
//!
//! Codec functions are pure transforms over `BytesMut`. [`FrameReader`] and
//! [`FrameWriter`] drive them over any `Read`/`Write` stream with deadlines and
//! cancellation.

pub mod cancel;
pub mod codec;
pub mod error;
pub mod length;
pub mod mplex;
pub mod negotiation;
pub mod reader;
pub mod writer;

pub use cancel::CancelToken;
pub use codec::{FrameConfig, ZeroLength, DEFAULT_MAX_PAYLOAD, DEFAULT_POLL_INTERVAL};
pub use error::{FrameError, Result};
pub use length::{LengthPrefix, SINGLE_BYTE_MAX};
pub use mplex::{
    decode_mplex, encode_mplex, max_stream_id, MessageType, MplexFrame, Nesting,
    MAX_SINGLE_BYTE_STREAM_ID,
};
pub use negotiation::{decode_negotiation, decode_nested, encode_negotiation, Negotiation};
pub use reader::FrameReader;
pub use writer::FrameWriter;
