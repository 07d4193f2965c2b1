use std::time::Duration;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the length prefix or the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The stream closed, or yielded fewer bytes than a frame declared.
    #[error("stream truncated (incomplete frame)")]
    TruncatedStream,

    /// The stream id cannot be represented in the mplex header.
    #[error("stream id {id} out of range (max {max})")]
    StreamIdOutOfRange { id: u64, max: u64 },

    /// The low three header bits carry an undefined mplex message type.
    #[error("unknown mplex message type {0}")]
    UnknownMessageType(u8),

    /// A varint length or header is malformed.
    #[error("invalid length prefix: {0}")]
    InvalidLength(String),

    /// A read missed its deadline, or a write stalled past the write timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The read was cancelled through its cancellation token.
    #[error("read cancelled")]
    Cancelled,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
