//! multistream-select + mplex client.
//!
//! p2pmux speaks the two nested wire protocols peer-to-peer nodes use to
//! bootstrap a connection: multistream-select to agree on protocol names, and
//! mplex to carry several logical streams over one TCP connection. It
//! negotiates an unencrypted session with a peer (e.g. an IPFS daemon started
//! with transport encryption disabled), opens a `/ipfs/ping/1.0.0` stream and
//! measures round trips over it.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection to the peer
//! - [`frame`]: negotiation and mplex frame codecs, blocking reader/writer
//! - [`session`]: handshake state machine and ping loop (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use p2pmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use p2pmux_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use p2pmux_session::*;
}
