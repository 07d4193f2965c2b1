//! Observation of every frame a session sends or receives.

use std::fmt;

use bytes::Bytes;
use p2pmux_frame::{MessageType, MplexFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Sent => "Tx",
            Direction::Received => "Rx",
        }
    }
}

/// The logical content of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceFrame {
    /// A negotiation frame. `None` is the end-of-message signal.
    Negotiation(Option<Bytes>),
    /// An mplex frame. For double-length sends the payload is the inner name.
    Mplex {
        stream_id: u32,
        message_type: MessageType,
        payload: Bytes,
    },
}

impl TraceFrame {
    pub(crate) fn negotiation(payload: &[u8]) -> Self {
        TraceFrame::Negotiation(Some(Bytes::copy_from_slice(payload)))
    }

    pub(crate) fn mplex(frame: &MplexFrame) -> Self {
        TraceFrame::Mplex {
            stream_id: frame.stream_id,
            message_type: frame.message_type,
            payload: frame.payload.clone(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            TraceFrame::Negotiation(Some(payload)) => payload,
            TraceFrame::Negotiation(None) => &[],
            TraceFrame::Mplex { payload, .. } => payload,
        }
    }
}

/// One frame crossing the wire, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub direction: Direction,
    pub frame: TraceFrame,
}

impl fmt::Display for TraceEvent {
    /// `Tx: /multistream/1.0.0` or `Rx[3,2]: 0123...`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.direction.label())?;
        if let TraceFrame::Mplex {
            stream_id,
            message_type,
            ..
        } = &self.frame
        {
            write!(f, "[{stream_id},{}]", message_type.tag())?;
        }
        if let TraceFrame::Negotiation(None) = self.frame {
            return f.write_str(": <end-of-message>");
        }
        write!(f, ": {}", printable(self.frame.payload()))
    }
}

/// Render a payload on one line: one trailing newline dropped, other control
/// bytes escaped.
pub fn printable(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let text = text.strip_suffix('\n').unwrap_or(&text);
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_control() {
            out.extend(ch.escape_default());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Receives every [`TraceEvent`] of a session.
pub trait TraceSink {
    fn record(&mut self, event: &TraceEvent);
}

impl<F> TraceSink for F
where
    F: FnMut(&TraceEvent),
{
    fn record(&mut self, event: &TraceEvent) {
        self(event)
    }
}
