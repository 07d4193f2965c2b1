//! A scripted stand-in for an IPFS daemon running without transport encryption.

#![allow(dead_code)]

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use p2pmux::frame::{
    encode_negotiation, FrameConfig, FrameError, FrameReader, FrameWriter, MessageType,
    MplexFrame, Negotiation, Nesting,
};
use p2pmux::session::literals::{MPLEX, MULTISTREAM, NOT_AVAILABLE, PING, PLAINTEXT};

#[derive(Debug, Clone)]
pub struct PeerBehavior {
    /// Answer the plaintext proposal with `na`.
    pub reject_plaintext: bool,
    /// Answer the ping protocol proposal with `na`.
    pub refuse_ping: bool,
    /// Peer-initiated frames sent right after mplex is selected.
    pub bootstrap_frames: usize,
    /// Echo pings back with their digits reversed.
    pub corrupt_echo: bool,
    /// Send this instead of the multistream intro.
    pub intro: Option<&'static [u8]>,
    pub frame: FrameConfig,
}

impl Default for PeerBehavior {
    fn default() -> Self {
        Self {
            reject_plaintext: false,
            refuse_ping: false,
            bootstrap_frames: 6,
            corrupt_echo: false,
            intro: None,
            frame: FrameConfig::default(),
        }
    }
}

/// What the peer observed from the client.
#[derive(Debug, Default)]
pub struct PeerLog {
    /// Negotiation payloads received, in order.
    pub proposals: Vec<Bytes>,
    /// The client's `NewStream` frame.
    pub new_stream: Option<MplexFrame>,
    /// The client's double-length protocol proposals.
    pub stream_proposals: Vec<MplexFrame>,
    /// Ping payloads received on the opened stream.
    pub pings: Vec<Bytes>,
    /// Raw bytes received after the peer refused plaintext.
    pub after_rejection: Vec<u8>,
}

pub struct FakePeer {
    pub port: u16,
    handle: JoinHandle<PeerLog>,
}

impl FakePeer {
    pub fn spawn(behavior: PeerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("fake peer should bind");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("fake peer should accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .expect("set read timeout");
            serve(stream, &behavior)
        });
        Self { port, handle }
    }

    /// Wait for the client to disconnect and return what was observed.
    pub fn finish(self) -> PeerLog {
        self.handle.join().expect("fake peer thread should complete")
    }
}

fn serve(stream: TcpStream, behavior: &PeerBehavior) -> PeerLog {
    let mut log = PeerLog::default();
    let write_half = stream.try_clone().expect("clone stream");
    let mut reader = FrameReader::with_config(stream, behavior.frame.clone());
    let mut writer = FrameWriter::with_config(write_half, behavior.frame.clone());

    let intro = behavior.intro.unwrap_or(MULTISTREAM);
    writer.send_negotiation(intro).expect("send intro");
    if behavior.intro.is_some() {
        drain_to_eof(reader);
        return log;
    }

    // Header echo and plaintext proposal.
    for _ in 0..2 {
        match reader.read_negotiation() {
            Ok(frame) => log.proposals.push(payload(&frame)),
            Err(_) => return log,
        }
    }

    if behavior.reject_plaintext {
        writer.send_negotiation(NOT_AVAILABLE).expect("send na");
        assert_eq!(reader.buffered(), 0, "client sent bytes before the ack");
        let mut stream = reader.into_inner();
        let _ = stream.read_to_end(&mut log.after_rejection);
        return log;
    }
    writer.send_negotiation(PLAINTEXT).expect("ack plaintext");

    for literal in [MULTISTREAM, MPLEX] {
        let frame = reader.read_negotiation().expect("read proposal");
        log.proposals.push(payload(&frame));
        writer.send_negotiation(literal).expect("echo proposal");
    }

    for i in 0..behavior.bootstrap_frames {
        let id = (i as u32 % 8) * 2;
        let ty = if i % 2 == 0 {
            MessageType::NewStream
        } else {
            MessageType::MessageInitiator
        };
        writer
            .send_mplex(id, ty, format!("bootstrap-{i}").as_bytes(), Nesting::Flat)
            .expect("send bootstrap frame");
    }

    let new_stream = match reader.read_mplex() {
        Ok(frame) => frame,
        Err(_) => return log,
    };
    let stream_id = new_stream.stream_id;
    log.new_stream = Some(new_stream);
    writer
        .send_mplex(stream_id, MessageType::MessageReceiver, b"", Nesting::Flat)
        .expect("ack new stream");

    for _ in 0..2 {
        log.stream_proposals
            .push(reader.read_mplex().expect("read stream proposal"));
    }
    let answer = if behavior.refuse_ping { NOT_AVAILABLE } else { PING };
    let mut nested = BytesMut::new();
    encode_negotiation(MULTISTREAM, &behavior.frame, &mut nested).expect("nest header");
    encode_negotiation(answer, &behavior.frame, &mut nested).expect("nest answer");
    writer
        .send_mplex(stream_id, MessageType::MessageReceiver, &nested, Nesting::Flat)
        .expect("ack protocol");

    loop {
        match reader.read_mplex() {
            Ok(frame) if frame.message_type == MessageType::MessageInitiator => {
                let mut echo = frame.payload.to_vec();
                if behavior.corrupt_echo {
                    echo.reverse();
                }
                log.pings.push(frame.payload);
                writer
                    .send_mplex(frame.stream_id, MessageType::MessageReceiver, &echo, Nesting::Flat)
                    .expect("echo ping");
            }
            Ok(_) => continue,
            Err(FrameError::TruncatedStream) => return log,
            Err(err) => panic!("fake peer read failed: {err}"),
        }
    }
}

fn payload(frame: &Negotiation) -> Bytes {
    Bytes::copy_from_slice(frame.payload().unwrap_or_default())
}

fn drain_to_eof(reader: FrameReader<TcpStream>) {
    let mut stream = reader.into_inner();
    let mut sink = Vec::new();
    let _ = stream.read_to_end(&mut sink);
}
