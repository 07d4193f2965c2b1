use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use p2pmux_frame::MplexFrame;
use p2pmux_session::trace::printable;
use p2pmux_session::{
    Direction, HandshakeReport, PingMeasurement, PingSummary, TraceEvent, TraceFrame,
};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    event: &'static str,
    direction: &'static str,
    layer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_type: Option<&'static str>,
    payload_size: usize,
    payload: String,
}

#[derive(Serialize)]
struct PingOutput {
    event: &'static str,
    sequence: usize,
    stream_id: u32,
    round_trip_ms: f64,
    verdict: &'static str,
    sent: String,
    received: String,
}

#[derive(Serialize)]
struct SummaryOutput {
    event: &'static str,
    count: usize,
    average_ms: f64,
    min_ms: Option<f64>,
    max_ms: Option<f64>,
    mismatches: usize,
}

#[derive(Serialize)]
struct DrainedOutput {
    stream_id: u32,
    message_type: &'static str,
    payload_size: usize,
}

#[derive(Serialize)]
struct ProbeOutput {
    event: &'static str,
    negotiated: Vec<String>,
    drained: Vec<DrainedOutput>,
}

#[derive(Serialize)]
struct EncodedOutput {
    event: &'static str,
    length: usize,
    hex: String,
}

/// One line per frame: `Tx: /plaintext/1.0.0`, `Rx[3,1]: 0123...`, or JSON.
pub fn print_trace(event: &TraceEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let (layer, stream_id, message_type) = match &event.frame {
                TraceFrame::Negotiation(_) => ("negotiation", None, None),
                TraceFrame::Mplex {
                    stream_id,
                    message_type,
                    ..
                } => ("mplex", Some(*stream_id), Some(message_type.name())),
            };
            let payload = event.frame.payload();
            print_json(&FrameOutput {
                event: "frame",
                direction: direction_name(event),
                layer,
                stream_id,
                message_type,
                payload_size: payload.len(),
                payload: printable(payload),
            });
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{event}"),
    }
}

pub fn print_ping(measurement: &PingMeasurement, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&PingOutput {
            event: "ping",
            sequence: measurement.sequence,
            stream_id: measurement.stream_id,
            round_trip_ms: round_ms(measurement.round_trip_millis),
            verdict: measurement.verdict.as_str(),
            sent: printable(&measurement.sent),
            received: printable(&measurement.received.payload),
        }),
        OutputFormat::Pretty => println!(
            "ping {}: {:.3} ms ({})",
            measurement.sequence,
            measurement.round_trip_millis,
            measurement.verdict.as_str()
        ),
        // Rows are printed together with the summary.
        OutputFormat::Table => {}
    }
}

pub fn print_ping_summary(summary: &PingSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SummaryOutput {
            event: "summary",
            count: summary.measurements.len(),
            average_ms: round_ms(summary.average_millis()),
            min_ms: summary.min_millis().map(round_ms),
            max_ms: summary.max_millis().map(round_ms),
            mismatches: summary.mismatches(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "STREAM", "RTT (ms)", "VERDICT", "PAYLOAD"]);
            for m in &summary.measurements {
                table.add_row(vec![
                    m.sequence.to_string(),
                    m.stream_id.to_string(),
                    format!("{:.3}", m.round_trip_millis),
                    m.verdict.as_str().to_string(),
                    printable(&m.sent),
                ]);
            }
            println!("{table}");
            println!("average: {:.3} ms", summary.average_millis());
        }
        OutputFormat::Pretty => {
            println!("average: {:.3} ms", summary.average_millis());
            if summary.mismatches() > 0 {
                println!(
                    "mismatches: {} of {}",
                    summary.mismatches(),
                    summary.measurements.len()
                );
            }
        }
    }
}

pub fn print_probe(report: &HandshakeReport, format: OutputFormat) {
    let negotiated: Vec<String> = report
        .negotiated
        .iter()
        .map(|name| printable(name))
        .collect();

    match format {
        OutputFormat::Json => print_json(&ProbeOutput {
            event: "probe",
            negotiated,
            drained: report.drained.iter().map(drained_output).collect(),
        }),
        OutputFormat::Table => {
            println!("negotiated: {}", negotiated.join(", "));
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "TYPE", "SIZE", "PAYLOAD"]);
            for frame in &report.drained {
                table.add_row(vec![
                    frame.stream_id.to_string(),
                    frame.message_type.name().to_string(),
                    frame.payload.len().to_string(),
                    printable(&frame.payload),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("negotiated: {}", negotiated.join(", "));
            println!("drained {} peer frame(s)", report.drained.len());
        }
    }
}

pub fn print_encoded(bytes: &[u8], format: OutputFormat) {
    let hex = hex_string(bytes);
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            event: "encoded",
            length: bytes.len(),
            hex,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("{hex}"),
    }
}

/// Space-separated lowercase hex pairs.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn drained_output(frame: &MplexFrame) -> DrainedOutput {
    DrainedOutput {
        stream_id: frame.stream_id,
        message_type: frame.message_type.name(),
        payload_size: frame.payload.len(),
    }
}

fn direction_name(event: &TraceEvent) -> &'static str {
    match event.direction {
        Direction::Sent => "tx",
        Direction::Received => "rx",
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
