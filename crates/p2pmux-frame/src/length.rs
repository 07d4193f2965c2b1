//! Length prefix codec.
//!
//! Both framing layers put a length in front of every payload. Short
//! handshakes use one raw byte (0..=254); the general form is an unsigned
//! LEB128 varint. The two agree byte-for-byte below 128.

use bytes::{BufMut, BytesMut};
use unsigned_varint::{decode, encode};

use crate::error::{FrameError, Result};

/// Largest length representable in single-byte mode.
pub const SINGLE_BYTE_MAX: usize = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthPrefix {
    /// One raw byte, 0..=254.
    #[default]
    SingleByte,
    /// Unsigned varint, bounded only by the configured maximum payload.
    Varint,
}

impl LengthPrefix {
    /// Largest length this prefix accepts given a configured maximum.
    pub fn ceiling(self, max_payload: usize) -> usize {
        match self {
            LengthPrefix::SingleByte => SINGLE_BYTE_MAX.min(max_payload),
            LengthPrefix::Varint => max_payload,
        }
    }

    /// Number of bytes the prefix for `value` occupies on the wire.
    pub fn encoded_len(self, value: usize) -> usize {
        match self {
            LengthPrefix::SingleByte => 1,
            LengthPrefix::Varint => {
                let mut buf = encode::usize_buffer();
                encode::usize(value, &mut buf).len()
            }
        }
    }

    /// Append the prefix for `value`.
    pub fn encode(self, value: usize, max_payload: usize, dst: &mut BytesMut) -> Result<()> {
        let max = self.ceiling(max_payload);
        if value > max {
            return Err(FrameError::PayloadTooLarge { size: value, max });
        }
        match self {
            LengthPrefix::SingleByte => dst.put_u8(value as u8),
            LengthPrefix::Varint => {
                let mut buf = encode::usize_buffer();
                dst.put_slice(encode::usize(value, &mut buf));
            }
        }
        Ok(())
    }

    /// Parse a prefix at the start of `src` without consuming it.
    ///
    /// Returns `Ok(None)` if `src` does not hold a complete prefix yet,
    /// otherwise `(value, prefix_len)`.
    pub fn decode(self, src: &[u8], max_payload: usize) -> Result<Option<(usize, usize)>> {
        let (value, consumed) = match self {
            LengthPrefix::SingleByte => match src.first() {
                Some(&byte) => (byte as usize, 1),
                None => return Ok(None),
            },
            LengthPrefix::Varint => match decode::usize(src) {
                Ok((value, rest)) => (value, src.len() - rest.len()),
                Err(decode::Error::Insufficient) => return Ok(None),
                Err(err) => return Err(FrameError::InvalidLength(err.to_string())),
            },
        };

        let max = self.ceiling(max_payload);
        if value > max {
            return Err(FrameError::PayloadTooLarge { size: value, max });
        }
        Ok(Some((value, consumed)))
    }
}
