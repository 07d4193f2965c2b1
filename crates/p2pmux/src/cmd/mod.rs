use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use p2pmux_frame::{CancelToken, FrameConfig, LengthPrefix, MessageType};
use p2pmux_session::{ConnectConfig, DrainPolicy, SessionConfig, TraceEvent, TraceSink};
use p2pmux_transport::{TcpTransport, DEFAULT_HOST, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::{self, OutputFormat};

pub mod encode;
pub mod ping;
pub mod probe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Negotiate a session, open a ping stream, and time round trips.
    Ping(PingArgs),
    /// Negotiate plaintext and mplex and report the peer's bootstrap traffic.
    Probe(ProbeArgs),
    /// Print the wire bytes of one frame.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ping(args) => ping::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Connection settings shared by commands that talk to a peer.
#[derive(Args, Debug)]
pub struct PeerArgs {
    /// Peer host name or address.
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,
    /// Peer TCP port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Deadline for each frame read (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    /// Bound for establishing the TCP connection.
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
    /// Number of peer-initiated frames to drain after mplex is selected.
    #[arg(long, conflicts_with = "quiet_window")]
    pub drain: Option<usize>,
    /// Drain until the peer stays silent this long (e.g. 300ms).
    #[arg(long, value_name = "DURATION")]
    pub quiet_window: Option<String>,
    /// Use varint length prefixes and headers instead of single bytes.
    #[arg(long)]
    pub varint: bool,
    /// Do not print the frame trace.
    #[arg(long)]
    pub no_trace: bool,
}

impl PeerArgs {
    pub fn connect_config(&self, cancel: CancelToken) -> CliResult<ConnectConfig> {
        let read_timeout = parse_duration(&self.timeout)?;
        let connect_timeout = parse_duration(&self.connect_timeout)?;

        let drain = match (&self.drain, &self.quiet_window) {
            (_, Some(window)) => DrainPolicy::Quiescence(parse_duration(window)?),
            (Some(count), None) => DrainPolicy::Count(*count),
            (None, None) => DrainPolicy::default(),
        };

        let frame = FrameConfig {
            length_prefix: if self.varint {
                LengthPrefix::Varint
            } else {
                LengthPrefix::SingleByte
            },
            read_timeout: Some(read_timeout),
            write_timeout: Some(read_timeout),
            ..FrameConfig::default()
        };

        Ok(ConnectConfig {
            transport: TcpTransport::new(self.host.clone(), self.port)
                .with_connect_timeout(connect_timeout),
            frame,
            session: SessionConfig {
                drain,
                ..SessionConfig::default()
            },
            cancel: Some(cancel),
        })
    }

    pub fn trace_sink(&self, format: OutputFormat) -> Option<Box<dyn TraceSink + Send>> {
        if self.no_trace {
            return None;
        }
        Some(Box::new(move |event: &TraceEvent| {
            output::print_trace(event, format)
        }))
    }
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub peer: PeerArgs,
    /// Number of pings.
    #[arg(long, default_value_t = p2pmux_session::DEFAULT_PING_COUNT)]
    pub count: usize,
    /// Digits per ping payload.
    #[arg(long, default_value_t = p2pmux_session::DEFAULT_PAYLOAD_LEN)]
    pub payload_len: usize,
    /// Stream id of the ping stream.
    #[arg(long, default_value_t = p2pmux_session::DEFAULT_FIRST_STREAM_ID)]
    pub first_stream: u32,
    /// Seed for reproducible payloads.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub peer: PeerArgs,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Payload text.
    pub payload: String,
    /// Append a newline, as protocol names carry one.
    #[arg(long)]
    pub newline: bool,
    /// Encode an mplex frame on this stream instead of a negotiation frame.
    #[arg(long)]
    pub stream: Option<u32>,
    /// Mplex message type.
    #[arg(long = "type", value_enum, default_value = "message-initiator", requires = "stream")]
    pub message_type: MessageTypeArg,
    /// Wrap the payload in a negotiation frame inside the mplex payload.
    #[arg(long, requires = "stream")]
    pub double_length: bool,
    /// Use varint length prefixes and headers.
    #[arg(long)]
    pub varint: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MessageTypeArg {
    NewStream,
    MessageReceiver,
    MessageInitiator,
    CloseReceiver,
    CloseInitiator,
    ResetReceiver,
    ResetInitiator,
}

impl From<MessageTypeArg> for MessageType {
    fn from(arg: MessageTypeArg) -> Self {
        match arg {
            MessageTypeArg::NewStream => MessageType::NewStream,
            MessageTypeArg::MessageReceiver => MessageType::MessageReceiver,
            MessageTypeArg::MessageInitiator => MessageType::MessageInitiator,
            MessageTypeArg::CloseReceiver => MessageType::CloseReceiver,
            MessageTypeArg::CloseInitiator => MessageType::CloseInitiator,
            MessageTypeArg::ResetReceiver => MessageType::ResetReceiver,
            MessageTypeArg::ResetInitiator => MessageType::ResetInitiator,
        }
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `150ms`, or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Cancel `token` on Ctrl-C so blocked reads return promptly.
pub fn install_ctrlc_handler(token: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || token.cancel())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
