use std::fmt;
use std::io::{Read, Write};

use bytes::Bytes;
use p2pmux_frame::{
    decode_nested, max_stream_id, FrameReader, FrameWriter, MessageType, MplexFrame, Negotiation,
    Nesting,
};
use tracing::{debug, info, warn};

use crate::config::{DrainPolicy, SessionConfig};
use crate::error::{Result, SessionError};
use crate::literals::{self, MPLEX, MULTISTREAM, NOT_AVAILABLE, PING, PLAINTEXT};
use crate::streams::StreamAllocator;
use crate::trace::{Direction, TraceEvent, TraceFrame, TraceSink};

/// Where a session stands in the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitIntro,
    PlaintextProposed,
    PlaintextActive,
    MplexActive,
    Ready { stream_id: u32 },
    /// The peer refused plaintext. Terminal; no further I/O.
    Rejected,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitIntro => "await-intro",
            SessionState::PlaintextProposed => "plaintext-proposed",
            SessionState::PlaintextActive => "plaintext-active",
            SessionState::MplexActive => "mplex-active",
            SessionState::Ready { .. } => "ready",
            SessionState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Ready { stream_id } => write!(f, "ready (stream {stream_id})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A locally opened mplex stream and the peer's answers while opening it.
#[derive(Debug, Clone)]
pub struct OpenedStream {
    pub stream_id: u32,
    pub protocol: Bytes,
    /// The frame read after `NewStream`.
    pub stream_ack: MplexFrame,
    /// The frame read after proposing the protocol.
    pub protocol_ack: MplexFrame,
    /// Negotiation frames nested in `protocol_ack`, if it parsed as such.
    pub confirmed: Vec<Negotiation>,
}

/// What the peer sent while a session was brought up.
#[derive(Debug, Clone, Default)]
pub struct HandshakeReport {
    /// Protocols the peer acknowledged, in order.
    pub negotiated: Vec<Bytes>,
    /// Peer-initiated mplex frames consumed after mplex was selected.
    pub drained: Vec<MplexFrame>,
    /// The ping stream; `None` for [`Session::probe`].
    pub stream: Option<OpenedStream>,
}

/// A multistream-select + mplex session over one duplex byte stream.
///
/// The reader and writer halves are owned exclusively by the session and used
/// in strict request/response alternation.
pub struct Session<R, W> {
    pub(crate) reader: FrameReader<R>,
    pub(crate) writer: FrameWriter<W>,
    config: SessionConfig,
    streams: StreamAllocator,
    pub(crate) state: SessionState,
    sink: Option<Box<dyn TraceSink + Send>>,
}

impl<R: Read, W: Write> Session<R, W> {
    /// Wrap an established connection's halves.
    ///
    /// Both halves must use the same length prefix mode.
    pub fn new(
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
        config: SessionConfig,
    ) -> Result<Self> {
        let prefix = reader.config().length_prefix;
        if writer.config().length_prefix != prefix {
            return Err(SessionError::Config(
                "reader and writer use different length prefixes".to_string(),
            ));
        }
        if let DrainPolicy::Quiescence(window) = config.drain {
            if window.is_zero() {
                return Err(SessionError::Config(
                    "quiescence window must be non-zero".to_string(),
                ));
            }
        }

        let streams =
            StreamAllocator::new(config.first_stream_id, max_stream_id(prefix), config.reuse)?;
        Ok(Self {
            reader,
            writer,
            config,
            streams,
            state: SessionState::AwaitIntro,
            sink: None,
        })
    }

    /// Report every frame to `sink` in addition to `tracing`.
    pub fn with_trace(mut self, sink: impl TraceSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn set_trace(&mut self, sink: Option<Box<dyn TraceSink + Send>>) {
        self.sink = sink;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The stream opened by [`Session::handshake`], once ready.
    pub fn stream_id(&self) -> Option<u32> {
        match self.state {
            SessionState::Ready { stream_id } => Some(stream_id),
            _ => None,
        }
    }

    /// Negotiate plaintext and mplex, drain the peer's bootstrap traffic, and
    /// open a stream for `/ipfs/ping/1.0.0`.
    pub fn handshake(&mut self) -> Result<HandshakeReport> {
        let mut report = self.probe()?;
        report.stream = Some(self.open_stream(PING)?);
        Ok(report)
    }

    /// Negotiate plaintext and mplex and drain, without opening a stream.
    pub fn probe(&mut self) -> Result<HandshakeReport> {
        self.expect_state(SessionState::AwaitIntro, "await-intro")?;
        let mut report = HandshakeReport::default();

        let intro = self.recv_negotiation()?;
        self.check(&intro, MULTISTREAM, true)?;
        debug!("peer introduced multistream-select");

        self.send_negotiation(MULTISTREAM)?;
        self.send_negotiation(PLAINTEXT)?;
        self.state = SessionState::PlaintextProposed;

        let ack = self.recv_negotiation()?;
        if ack.is(NOT_AVAILABLE) {
            self.state = SessionState::Rejected;
            warn!("peer rejected plaintext");
            return Err(SessionError::EncryptionRequired);
        }
        self.check(&ack, PLAINTEXT, self.config.validate_echoes)?;
        self.state = SessionState::PlaintextActive;
        report.negotiated.push(Bytes::from_static(PLAINTEXT));
        info!("plaintext negotiated");

        self.send_negotiation(MULTISTREAM)?;
        let echo = self.recv_negotiation()?;
        self.check(&echo, MULTISTREAM, self.config.validate_echoes)?;

        self.send_negotiation(MPLEX)?;
        let echo = self.recv_negotiation()?;
        if echo.is(NOT_AVAILABLE) {
            return Err(unexpected(MPLEX, &echo));
        }
        self.check(&echo, MPLEX, self.config.validate_echoes)?;
        self.state = SessionState::MplexActive;
        report.negotiated.push(Bytes::from_static(MPLEX));
        info!("mplex negotiated");

        report.drained = self.drain()?;
        info!(frames = report.drained.len(), "drained peer bootstrap traffic");
        Ok(report)
    }

    /// Open a stream and select `protocol` on it.
    ///
    /// Sends `NewStream`, reads one frame as the ack, proposes the protocol
    /// with double-length framing, and reads one frame as the confirmation.
    pub fn open_stream(&mut self, protocol: &[u8]) -> Result<OpenedStream> {
        if !matches!(
            self.state,
            SessionState::MplexActive | SessionState::Ready { .. }
        ) {
            return Err(self.invalid_state("mplex-active"));
        }

        let stream_id = self.streams.allocate()?;
        self.send_mplex(
            MplexFrame::new(stream_id, MessageType::NewStream, stream_id.to_string()),
            Nesting::Flat,
        )?;
        let stream_ack = self.recv_mplex()?;

        self.send_mplex(
            MplexFrame::new(stream_id, MessageType::MessageInitiator, MULTISTREAM),
            Nesting::DoubleLength,
        )?;
        self.send_mplex(
            MplexFrame::new(
                stream_id,
                MessageType::MessageInitiator,
                Bytes::copy_from_slice(protocol),
            ),
            Nesting::DoubleLength,
        )?;
        let protocol_ack = self.recv_mplex()?;

        let confirmed = match decode_nested(&protocol_ack.payload, self.reader.config()) {
            Ok(frames) => frames,
            Err(err) => {
                debug!(error = %err, "protocol ack is not nested negotiation frames");
                Vec::new()
            }
        };
        if let Some(refusal) = confirmed.iter().find(|frame| frame.is(NOT_AVAILABLE)) {
            self.streams.release(stream_id);
            debug!(stream_id, "released refused stream id");
            return Err(unexpected(protocol, refusal));
        }

        self.state = SessionState::Ready { stream_id };
        let name = literals::display(protocol);
        info!(stream_id, protocol = %name.trim_end(), "stream ready");
        Ok(OpenedStream {
            stream_id,
            protocol: Bytes::copy_from_slice(protocol),
            stream_ack,
            protocol_ack,
            confirmed,
        })
    }

    /// Split the session back into its frame reader and writer.
    pub fn into_parts(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }

    fn drain(&mut self) -> Result<Vec<MplexFrame>> {
        match self.config.drain {
            DrainPolicy::Count(count) => (0..count).map(|_| self.recv_mplex()).collect(),
            DrainPolicy::Quiescence(window) => {
                let mut frames = Vec::new();
                while self.reader.wait_readable(window)? {
                    frames.push(self.recv_mplex()?);
                }
                Ok(frames)
            }
        }
    }

    fn check(&self, got: &Negotiation, expected: &[u8], enforce: bool) -> Result<()> {
        if enforce && !got.is(expected) {
            return Err(unexpected(expected, got));
        }
        Ok(())
    }

    fn expect_state(&self, expected: SessionState, name: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(name))
        }
    }

    pub(crate) fn invalid_state(&self, expected: &'static str) -> SessionError {
        SessionError::InvalidState {
            expected,
            actual: self.state.to_string(),
        }
    }

    pub(crate) fn send_negotiation(&mut self, payload: &[u8]) -> Result<()> {
        self.writer.send_negotiation(payload)?;
        self.emit(Direction::Sent, TraceFrame::negotiation(payload));
        Ok(())
    }

    pub(crate) fn recv_negotiation(&mut self) -> Result<Negotiation> {
        let frame = self.reader.read_negotiation()?;
        let traced = match &frame {
            Negotiation::Message(payload) => TraceFrame::Negotiation(Some(payload.clone())),
            Negotiation::EndOfMessage => TraceFrame::Negotiation(None),
        };
        self.emit(Direction::Received, traced);
        Ok(frame)
    }

    pub(crate) fn send_mplex(&mut self, frame: MplexFrame, nesting: Nesting) -> Result<()> {
        self.writer.write_mplex(&frame, nesting)?;
        self.emit(Direction::Sent, TraceFrame::mplex(&frame));
        Ok(())
    }

    pub(crate) fn recv_mplex(&mut self) -> Result<MplexFrame> {
        let frame = self.reader.read_mplex()?;
        self.emit(Direction::Received, TraceFrame::mplex(&frame));
        Ok(frame)
    }

    fn emit(&mut self, direction: Direction, frame: TraceFrame) {
        let event = TraceEvent { direction, frame };
        debug!(frame = %event, "frame");
        if let Some(sink) = self.sink.as_mut() {
            sink.record(&event);
        }
    }
}

impl<R, W> fmt::Debug for Session<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("trace", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

fn unexpected(expected: &[u8], got: &Negotiation) -> SessionError {
    SessionError::UnexpectedProtocol {
        expected: literals::display(expected),
        actual: got.describe(),
    }
}
