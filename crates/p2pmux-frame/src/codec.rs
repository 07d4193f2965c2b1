use std::time::Duration;

use crate::length::LengthPrefix;

/// Default maximum payload size in varint mode: 1 MiB, the mplex message cap.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Default wake-up interval for deadline and cancellation checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a negotiation frame with length 0 is surfaced.
///
/// On the wire both cases are the single byte `0x00`; the caller decides which
/// meaning applies to the protocol it is speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroLength {
    /// Length 0 means "no message" ([`crate::Negotiation::EndOfMessage`]).
    #[default]
    EndOfMessage,
    /// Length 0 is a message with an empty payload.
    EmptyMessage,
}

/// Configuration shared by the frame codecs, readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Length prefix encoding for both layers. Default: single byte.
    pub length_prefix: LengthPrefix,
    /// Maximum payload size in bytes. Single-byte mode is additionally capped at 254.
    pub max_payload_size: usize,
    /// Interpretation of zero-length negotiation frames.
    pub zero_length: ZeroLength,
    /// Deadline for each blocking frame read. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
    /// OS-level read timeout used to wake up and check deadlines and cancellation.
    pub poll_interval: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            length_prefix: LengthPrefix::SingleByte,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            zero_length: ZeroLength::EndOfMessage,
            read_timeout: None,
            write_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl FrameConfig {
    /// Varint length prefixes with otherwise default settings.
    pub fn varint() -> Self {
        Self {
            length_prefix: LengthPrefix::Varint,
            ..Self::default()
        }
    }

    /// Largest payload a single length prefix can carry under this config.
    pub fn payload_ceiling(&self) -> usize {
        self.length_prefix.ceiling(self.max_payload_size)
    }
}
