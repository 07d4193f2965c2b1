//! Protocol names exchanged during negotiation, byte-exact.

/// multistream-select header, sent by both sides before any proposal.
pub const MULTISTREAM: &[u8] = b"/multistream/1.0.0\n";

/// Unauthenticated, unencrypted security protocol.
pub const PLAINTEXT: &[u8] = b"/plaintext/1.0.0\n";

/// Rejection of the last proposal.
pub const NOT_AVAILABLE: &[u8] = b"na\n";

/// Stream multiplexer.
pub const MPLEX: &[u8] = b"/mplex/6.7.0\n";

/// Ping protocol selected on the opened stream.
pub const PING: &[u8] = b"/ipfs/ping/1.0.0\n";

/// Render a literal for diagnostics.
pub fn display(literal: &[u8]) -> String {
    String::from_utf8_lossy(literal).into_owned()
}
