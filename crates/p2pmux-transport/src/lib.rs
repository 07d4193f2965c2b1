//! Blocking TCP transport for p2pmux.
//!
//! This is the lowest layer of p2pmux: a reliable, ordered, bidirectional
//! byte stream to a fixed peer address. Everything else builds on top of the
//! [`WireStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::WireStream;
pub use tcp::{TcpTransport, DEFAULT_HOST, DEFAULT_PORT};
