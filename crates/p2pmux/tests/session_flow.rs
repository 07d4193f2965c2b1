mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use p2pmux::frame::{FrameConfig, MessageType};
use p2pmux::session::literals::{MPLEX, MULTISTREAM, PING, PLAINTEXT};
use p2pmux::session::{
    connect, connect_and_ping, connect_and_probe, ConnectConfig, DrainPolicy, PingConfig,
    SessionConfig, SessionError, SessionState, TraceEvent, Verdict,
};
use p2pmux::transport::TcpTransport;
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{FakePeer, PeerBehavior};

fn config_for(peer: &FakePeer) -> ConnectConfig {
    ConnectConfig {
        transport: TcpTransport::new("127.0.0.1", peer.port),
        frame: FrameConfig {
            read_timeout: Some(Duration::from_secs(5)),
            ..FrameConfig::default()
        },
        ..ConnectConfig::default()
    }
}

#[test]
fn handshake_then_ping_matches() {
    let peer = FakePeer::spawn(PeerBehavior::default());
    let config = config_for(&peer);

    let mut session = connect(&config).expect("connect should succeed");
    let report = session.handshake().expect("handshake should succeed");
    assert_eq!(session.state(), SessionState::Ready { stream_id: 3 });
    assert_eq!(report.drained.len(), 6);

    let payload = bytes::Bytes::from_static(b"1234567890123456789012345678901");
    let measurement = session
        .ping_once(7, payload.clone())
        .expect("ping should succeed");
    assert_eq!(measurement.verdict, Verdict::Match);
    assert_eq!(measurement.sequence, 7);
    assert!(measurement.round_trip_millis >= 0.0);
    assert_eq!(measurement.received.payload, payload);
    session.close().expect("close should succeed");

    let log = peer.finish();
    let proposals: Vec<&[u8]> = log.proposals.iter().map(|p| &p[..]).collect();
    assert_eq!(proposals, vec![MULTISTREAM, PLAINTEXT, MULTISTREAM, MPLEX]);

    let new_stream = log.new_stream.expect("client should open a stream");
    assert_eq!(new_stream.stream_id, 3);
    assert_eq!(new_stream.message_type, MessageType::NewStream);
    assert_eq!(new_stream.payload.as_ref(), b"3");

    assert_eq!(log.stream_proposals.len(), 2);
    let mut nested_ping = vec![PING.len() as u8];
    nested_ping.extend_from_slice(PING);
    assert_eq!(log.stream_proposals[1].payload.as_ref(), nested_ping.as_slice());
    assert_eq!(log.pings, vec![payload]);
}

#[test]
fn plaintext_refusal_sends_nothing_further() {
    let peer = FakePeer::spawn(PeerBehavior {
        reject_plaintext: true,
        ..PeerBehavior::default()
    });
    let config = config_for(&peer);

    let err = connect_and_probe(&config, None).expect_err("peer refuses plaintext");
    assert!(matches!(err, SessionError::EncryptionRequired));

    let log = peer.finish();
    assert!(log.after_rejection.is_empty());
}

#[test]
fn wrong_intro_is_unexpected_protocol() {
    let peer = FakePeer::spawn(PeerBehavior {
        intro: Some(b"/multistream/2.0.0\n"),
        ..PeerBehavior::default()
    });
    let config = config_for(&peer);

    let err = connect_and_probe(&config, None).expect_err("intro is wrong");
    assert!(matches!(err, SessionError::UnexpectedProtocol { .. }));
    peer.finish();
}

#[test]
fn refused_ping_protocol_is_unexpected_protocol() {
    let peer = FakePeer::spawn(PeerBehavior {
        refuse_ping: true,
        ..PeerBehavior::default()
    });
    let config = config_for(&peer);
    let mut rng = StdRng::seed_from_u64(3);

    let err = connect_and_ping(&config, &PingConfig::default(), &mut rng, None)
        .expect_err("peer refuses ping");
    assert!(matches!(err, SessionError::UnexpectedProtocol { .. }));
    assert!(peer.finish().pings.is_empty());
}

#[test]
fn five_pings_average_is_the_mean() {
    let peer = FakePeer::spawn(PeerBehavior::default());
    let config = config_for(&peer);
    let mut rng = StdRng::seed_from_u64(11);

    let (_, summary) = connect_and_ping(&config, &PingConfig::default(), &mut rng, None)
        .expect("ping run should succeed");

    assert_eq!(summary.measurements.len(), 5);
    assert_eq!(summary.mismatches(), 0);
    for measurement in &summary.measurements {
        assert_eq!(measurement.sent.len(), 31);
        assert!(measurement.sent.iter().all(u8::is_ascii_digit));
    }
    let mean = summary
        .measurements
        .iter()
        .map(|m| m.round_trip_millis)
        .sum::<f64>()
        / 5.0;
    assert!((summary.average_millis() - mean).abs() < 1e-9);

    assert_eq!(peer.finish().pings.len(), 5);
}

#[test]
fn corrupted_echo_is_mismatch() {
    let peer = FakePeer::spawn(PeerBehavior {
        corrupt_echo: true,
        ..PeerBehavior::default()
    });
    let config = config_for(&peer);
    let mut rng = StdRng::seed_from_u64(5);

    let ping = PingConfig {
        count: 2,
        ..PingConfig::default()
    };
    let (_, summary) =
        connect_and_ping(&config, &ping, &mut rng, None).expect("mismatch is not fatal");
    assert_eq!(summary.mismatches(), 2);
    assert!(summary
        .measurements
        .iter()
        .all(|m| m.verdict == Verdict::Mismatch));
    peer.finish();
}

#[test]
fn quiescence_drain_reads_whatever_the_peer_sends() {
    let peer = FakePeer::spawn(PeerBehavior {
        bootstrap_frames: 3,
        ..PeerBehavior::default()
    });
    let config = ConnectConfig {
        session: SessionConfig {
            drain: DrainPolicy::Quiescence(Duration::from_millis(300)),
            ..SessionConfig::default()
        },
        ..config_for(&peer)
    };
    let mut rng = StdRng::seed_from_u64(9);

    let ping = PingConfig {
        count: 1,
        ..PingConfig::default()
    };
    let (report, summary) =
        connect_and_ping(&config, &ping, &mut rng, None).expect("ping should succeed");
    assert_eq!(report.drained.len(), 3);
    assert_eq!(summary.mismatches(), 0);
    peer.finish();
}

#[test]
fn varint_mode_end_to_end() {
    let peer = FakePeer::spawn(PeerBehavior {
        frame: FrameConfig::varint(),
        ..PeerBehavior::default()
    });
    let config = ConnectConfig {
        frame: FrameConfig {
            read_timeout: Some(Duration::from_secs(5)),
            ..FrameConfig::varint()
        },
        session: SessionConfig {
            first_stream_id: 40,
            ..SessionConfig::default()
        },
        ..config_for(&peer)
    };
    let mut rng = StdRng::seed_from_u64(13);

    let ping = PingConfig {
        count: 1,
        payload_len: 300,
    };
    let (report, summary) =
        connect_and_ping(&config, &ping, &mut rng, None).expect("varint ping should succeed");
    assert_eq!(report.stream.map(|s| s.stream_id), Some(40));
    assert_eq!(summary.measurements[0].verdict, Verdict::Match);
    peer.finish();
}

#[test]
fn trace_records_every_frame() {
    let peer = FakePeer::spawn(PeerBehavior::default());
    let config = config_for(&peer);
    let mut rng = StdRng::seed_from_u64(1);
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);

    let ping = PingConfig {
        count: 1,
        ..PingConfig::default()
    };
    connect_and_ping(
        &config,
        &ping,
        &mut rng,
        Some(Box::new(move |event: &TraceEvent| {
            sink_lines.lock().unwrap().push(event.to_string())
        })),
    )
    .expect("ping should succeed");
    peer.finish();

    let lines = lines.lock().unwrap();
    // 8 negotiation, 6 drained, 5 stream setup, 2 ping.
    assert_eq!(lines.len(), 21);
    assert_eq!(lines[0], "Rx: /multistream/1.0.0");
    assert_eq!(lines[2], "Tx: /plaintext/1.0.0");
    assert!(lines[19].starts_with("Tx[3,2]: "));
    assert!(lines[20].starts_with("Rx[3,1]: "));
}

#[test]
fn read_deadline_expires_on_silent_peer() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let holder = std::thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        std::thread::sleep(Duration::from_millis(800));
        drop(stream);
    });

    let config = ConnectConfig {
        transport: TcpTransport::new("127.0.0.1", port),
        frame: FrameConfig {
            read_timeout: Some(Duration::from_millis(200)),
            ..FrameConfig::default()
        },
        ..ConnectConfig::default()
    };
    let err = connect_and_probe(&config, None).expect_err("silent peer should time out");
    assert!(matches!(
        err,
        SessionError::Frame(p2pmux::frame::FrameError::Timeout(_))
    ));
    holder.join().expect("holder thread");
}
