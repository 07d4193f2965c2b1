use std::time::Duration;

use crate::streams::ReusePolicy;

/// Frames an IPFS daemon sends unprompted once mplex is selected.
pub const BOOTSTRAP_FRAME_COUNT: usize = 6;

/// Stream id the ping stream is opened on.
pub const DEFAULT_FIRST_STREAM_ID: u32 = 3;

/// How peer-initiated mplex traffic is consumed after mplex is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Read exactly this many frames.
    Count(usize),
    /// Read frames until no byte arrives for the given window.
    Quiescence(Duration),
}

impl Default for DrainPolicy {
    fn default() -> Self {
        DrainPolicy::Count(BOOTSTRAP_FRAME_COUNT)
    }
}

/// Session driver configuration.
///
/// Framing settings (length prefix, deadlines) live in the reader's and
/// writer's [`p2pmux_frame::FrameConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Consumption of the peer's bootstrap traffic.
    pub drain: DrainPolicy,
    /// First stream id handed out by the allocator.
    pub first_stream_id: u32,
    /// Whether released stream ids are handed out again.
    pub reuse: ReusePolicy,
    /// Check the peer's echoes and acks against the proposed literals.
    pub validate_echoes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            drain: DrainPolicy::default(),
            first_stream_id: DEFAULT_FIRST_STREAM_ID,
            reuse: ReusePolicy::Never,
            validate_echoes: true,
        }
    }
}
