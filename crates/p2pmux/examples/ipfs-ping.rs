//! Ping a local IPFS daemon over plaintext + mplex.
//!
//! Start the daemon without transport encryption:
//!   ipfs daemon --disable-transport-encryption
//!
//! Then run:
//!   cargo run --example ipfs-ping -- [host] [port]

use std::time::Duration;

use p2pmux::frame::FrameConfig;
use p2pmux::session::{connect, ConnectConfig, PingConfig, SessionError, TraceEvent};
use p2pmux::transport::{TcpTransport, DEFAULT_HOST, DEFAULT_PORT};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => DEFAULT_PORT,
    };

    let config = ConnectConfig {
        transport: TcpTransport::new(host, port).with_connect_timeout(Duration::from_secs(5)),
        frame: FrameConfig {
            read_timeout: Some(Duration::from_secs(10)),
            ..FrameConfig::default()
        },
        ..ConnectConfig::default()
    };

    let mut session = connect(&config)?.with_trace(|event: &TraceEvent| println!("{event}"));
    match session.handshake() {
        Ok(_) => {}
        Err(SessionError::EncryptionRequired) => {
            eprintln!("the daemon requires encryption; restart it with --disable-transport-encryption");
            session.close()?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    let summary = session.ping(&PingConfig::default(), &mut rand::thread_rng())?;
    for m in &summary.measurements {
        println!(
            "ping {}: {:.3} ms ({})",
            m.sequence,
            m.round_trip_millis,
            m.verdict.as_str()
        );
    }
    println!("average: {:.3} ms", summary.average_millis());

    session.close()?;
    Ok(())
}
