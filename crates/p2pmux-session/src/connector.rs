use p2pmux_frame::{CancelToken, FrameConfig, FrameReader, FrameWriter};
use p2pmux_transport::{TcpTransport, WireStream};
use rand::Rng;
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::handshake::{HandshakeReport, Session};
use crate::ping::{PingConfig, PingSummary};
use crate::trace::TraceSink;

/// Everything needed to bring a session up over TCP.
#[derive(Debug, Clone, Default)]
pub struct ConnectConfig {
    pub transport: TcpTransport,
    pub frame: FrameConfig,
    pub session: SessionConfig,
    /// Aborts blocking reads when cancelled. A private token is used if unset.
    pub cancel: Option<CancelToken>,
}

/// Connect and wrap the stream in a session, without negotiating.
pub fn connect(config: &ConnectConfig) -> Result<Session<WireStream, WireStream>> {
    let stream = config.transport.connect()?;
    stream.set_nodelay(true)?;
    let reader_stream = stream.try_clone()?;

    // A token is always installed so the socket polls; quiescence draining
    // relies on reads returning between bytes.
    let cancel = config.cancel.clone().unwrap_or_default();
    let reader = FrameReader::for_wire(reader_stream, config.frame.clone(), Some(cancel))?;
    let writer = FrameWriter::for_wire(stream, config.frame.clone())?;

    Session::new(reader, writer, config.session.clone())
}

/// Connect, negotiate plaintext and mplex, drain, and close.
pub fn connect_and_probe(
    config: &ConnectConfig,
    trace: Option<Box<dyn TraceSink + Send>>,
) -> Result<HandshakeReport> {
    with_session(config, trace, |session| session.probe())
}

/// Connect, open the ping stream, run the ping loop, and close.
pub fn connect_and_ping<G: Rng + ?Sized>(
    config: &ConnectConfig,
    ping: &PingConfig,
    rng: &mut G,
    trace: Option<Box<dyn TraceSink + Send>>,
) -> Result<(HandshakeReport, PingSummary)> {
    with_session(config, trace, |session| {
        let report = session.handshake()?;
        let summary = session.ping(ping, rng)?;
        Ok((report, summary))
    })
}

/// Run `work` on a fresh session and shut the connection down afterwards,
/// whatever `work` returned.
fn with_session<T>(
    config: &ConnectConfig,
    trace: Option<Box<dyn TraceSink + Send>>,
    work: impl FnOnce(&mut Session<WireStream, WireStream>) -> Result<T>,
) -> Result<T> {
    let mut session = connect(config)?;
    session.set_trace(trace);

    let result = work(&mut session);
    match session.close() {
        Ok(()) => {}
        Err(err) if result.is_err() => debug!(error = %err, "close after failure"),
        Err(err) => return Err(err),
    }
    result
}

impl Session<WireStream, WireStream> {
    /// Shut down both directions of the connection.
    pub fn close(self) -> Result<()> {
        debug!(state = %self.state(), "closing session");
        let (reader, writer) = self.into_parts();
        writer.get_ref().shutdown()?;
        drop(reader);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    use bytes::BytesMut;
    use p2pmux_frame::encode_negotiation;

    use super::*;
    use crate::error::SessionError;
    use crate::literals::{MULTISTREAM, NOT_AVAILABLE};

    #[test]
    fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let config = ConnectConfig {
            transport: TcpTransport::new("127.0.0.1", port),
            ..ConnectConfig::default()
        };
        let err = connect_and_probe(&config, None).unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[test]
    fn rejection_closes_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept should succeed");
            let cfg = FrameConfig::default();
            let mut out = BytesMut::new();
            encode_negotiation(MULTISTREAM, &cfg, &mut out).expect("encode intro");
            std::io::Write::write_all(&mut stream, &out).expect("send intro");

            let mut proposal = vec![0u8; 2 + MULTISTREAM.len() + 17];
            stream.read_exact(&mut proposal).expect("read proposal");

            out.clear();
            encode_negotiation(NOT_AVAILABLE, &cfg, &mut out).expect("encode na");
            std::io::Write::write_all(&mut stream, &out).expect("send na");

            let mut rest = Vec::new();
            stream.read_to_end(&mut rest).expect("read until close");
            rest
        });

        let config = ConnectConfig {
            transport: TcpTransport::new("127.0.0.1", port),
            ..ConnectConfig::default()
        };
        let err = connect_and_probe(&config, None).unwrap_err();
        assert!(matches!(err, SessionError::EncryptionRequired));

        let after_refusal = peer.join().expect("peer thread should complete");
        assert!(after_refusal.is_empty());
    }
}
