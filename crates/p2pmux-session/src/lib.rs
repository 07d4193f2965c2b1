//! Session driver for plaintext multistream-select + mplex peers.
//!
//! Negotiates `/plaintext/1.0.0` and `/mplex/6.7.0` over one transport
//! connection, opens an mplex stream for `/ipfs/ping/1.0.0`, and runs a timed
//! request/response ping loop over it.

pub mod config;
pub mod connector;
pub mod error;
pub mod handshake;
pub mod literals;
pub mod ping;
pub mod streams;
pub mod trace;

pub use config::{DrainPolicy, SessionConfig, BOOTSTRAP_FRAME_COUNT, DEFAULT_FIRST_STREAM_ID};
pub use connector::{connect, connect_and_ping, connect_and_probe, ConnectConfig};
pub use error::{Result, SessionError};
pub use handshake::{HandshakeReport, OpenedStream, Session, SessionState};
pub use ping::{
    ping_payload, PingConfig, PingMeasurement, PingSummary, Verdict, DEFAULT_PAYLOAD_LEN,
    DEFAULT_PING_COUNT,
};
pub use streams::{ReusePolicy, StreamAllocator};
pub use trace::{Direction, TraceEvent, TraceFrame, TraceSink};
