use std::io::{Read, Write};
use std::time::Instant;

use bytes::Bytes;
use p2pmux_frame::{MessageType, MplexFrame, Nesting};
use rand::Rng;
use tracing::{info, warn};

use crate::error::{Result, SessionError};
use crate::handshake::{Session, SessionState};

/// Pings sent per run.
pub const DEFAULT_PING_COUNT: usize = 5;

/// Digits per ping payload.
pub const DEFAULT_PAYLOAD_LEN: usize = 31;

#[derive(Debug, Clone)]
pub struct PingConfig {
    /// Number of request/response exchanges. Must be at least 1.
    pub count: usize,
    /// Length of each random ASCII-digit payload.
    pub payload_len: usize,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_PING_COUNT,
            payload_len: DEFAULT_PAYLOAD_LEN,
        }
    }
}

/// Whether the response carried the payload that was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Match => "match",
            Verdict::Mismatch => "mismatch",
        }
    }
}

/// One timed ping exchange.
#[derive(Debug, Clone)]
pub struct PingMeasurement {
    /// 1-based position in the run.
    pub sequence: usize,
    pub stream_id: u32,
    pub sent: Bytes,
    pub received: MplexFrame,
    pub round_trip_millis: f64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Default)]
pub struct PingSummary {
    pub measurements: Vec<PingMeasurement>,
    total_millis: f64,
}

impl PingSummary {
    fn push(&mut self, measurement: PingMeasurement) {
        self.total_millis += measurement.round_trip_millis;
        self.measurements.push(measurement);
    }

    /// Arithmetic mean of the round trips; 0 when empty.
    pub fn average_millis(&self) -> f64 {
        if self.measurements.is_empty() {
            return 0.0;
        }
        self.total_millis / self.measurements.len() as f64
    }

    pub fn min_millis(&self) -> Option<f64> {
        self.round_trips().reduce(f64::min)
    }

    pub fn max_millis(&self) -> Option<f64> {
        self.round_trips().reduce(f64::max)
    }

    pub fn mismatches(&self) -> usize {
        self.measurements
            .iter()
            .filter(|m| m.verdict == Verdict::Mismatch)
            .count()
    }

    fn round_trips(&self) -> impl Iterator<Item = f64> + '_ {
        self.measurements.iter().map(|m| m.round_trip_millis)
    }
}

/// A random payload of `len` ASCII digits.
pub fn ping_payload<G: Rng + ?Sized>(rng: &mut G, len: usize) -> Bytes {
    (0..len)
        .map(|_| b'0' + rng.gen_range(0..10u8))
        .collect::<Vec<u8>>()
        .into()
}

impl<R: Read, W: Write> Session<R, W> {
    /// Run `config.count` timed exchanges on the ready stream.
    ///
    /// A mismatched response is recorded, not fatal.
    pub fn ping<G: Rng + ?Sized>(
        &mut self,
        config: &PingConfig,
        rng: &mut G,
    ) -> Result<PingSummary> {
        if config.count == 0 {
            return Err(SessionError::Config("ping count must be at least 1".to_string()));
        }
        if config.payload_len == 0 {
            return Err(SessionError::Config(
                "ping payload length must be at least 1".to_string(),
            ));
        }
        let ceiling = self.writer.config().payload_ceiling();
        if config.payload_len > ceiling {
            return Err(SessionError::Config(format!(
                "ping payload length {} exceeds the frame limit {ceiling}",
                config.payload_len
            )));
        }

        let mut summary = PingSummary::default();
        for sequence in 1..=config.count {
            let payload = ping_payload(rng, config.payload_len);
            summary.push(self.ping_once(sequence, payload)?);
        }
        info!(
            count = summary.measurements.len(),
            average_ms = summary.average_millis(),
            "ping finished"
        );
        Ok(summary)
    }

    /// Send one payload on the ready stream and time the response.
    ///
    /// `sequence` is recorded on the measurement as given.
    pub fn ping_once(&mut self, sequence: usize, payload: Bytes) -> Result<PingMeasurement> {
        let SessionState::Ready { stream_id } = self.state else {
            return Err(self.invalid_state("ready"));
        };

        let started = Instant::now();
        self.send_mplex(
            MplexFrame::new(stream_id, MessageType::MessageInitiator, payload.clone()),
            Nesting::Flat,
        )?;
        let received = self.recv_mplex()?;
        let round_trip_millis = started.elapsed().as_secs_f64() * 1000.0;

        let verdict = if received.payload == payload {
            Verdict::Match
        } else {
            Verdict::Mismatch
        };
        match verdict {
            Verdict::Match => info!(stream_id, rtt_ms = round_trip_millis, "ping"),
            Verdict::Mismatch => warn!(
                stream_id,
                rtt_ms = round_trip_millis,
                received_stream = received.stream_id,
                "ping response does not match payload"
            ),
        }

        Ok(PingMeasurement {
            sequence,
            stream_id,
            sent: payload,
            received,
            round_trip_millis,
            verdict,
        })
    }
}
