/// Errors that can occur while driving a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] p2pmux_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] p2pmux_frame::FrameError),

    /// The peer answered the plaintext proposal with `na`.
    #[error("peer requires transport encryption; start it with plaintext enabled (e.g. `ipfs daemon --disable-transport-encryption`)")]
    EncryptionRequired,

    /// The peer negotiated something other than the expected literal.
    #[error("unexpected protocol: expected {expected:?}, got {actual:?}")]
    UnexpectedProtocol { expected: String, actual: String },

    /// An operation was called in the wrong session state.
    #[error("invalid session state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    /// No stream id is left under the allocator's policy.
    #[error("stream ids exhausted (max {max})")]
    StreamIdsExhausted { max: u32 },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
