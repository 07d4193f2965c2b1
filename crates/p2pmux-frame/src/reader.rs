use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use p2pmux_transport::WireStream;
use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::mplex::{decode_mplex, MplexFrame};
use crate::negotiation::{decode_negotiation, Negotiation};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

#[derive(Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }
}

/// Reads complete negotiation and mplex frames from any `Read` stream.
///
/// Handles partial reads internally: callers always get complete frames, and
/// bytes belonging to the next frame stay buffered.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    cancel: Option<CancelToken>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            cancel: None,
        }
    }

    /// Abort blocking reads when `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Read the next negotiation frame (blocking).
    ///
    /// Returns `Err(FrameError::TruncatedStream)` when EOF is reached before
    /// the frame is complete, including before its length prefix.
    pub fn read_negotiation(&mut self) -> Result<Negotiation> {
        let deadline = self.config.read_timeout.map(Deadline::after);
        loop {
            if let Some(frame) = decode_negotiation(&mut self.buf, &self.config)? {
                return Ok(frame);
            }
            self.fill(deadline)?;
        }
    }

    /// Read the next mplex frame (blocking).
    pub fn read_mplex(&mut self) -> Result<MplexFrame> {
        let deadline = self.config.read_timeout.map(Deadline::after);
        loop {
            if let Some(frame) = decode_mplex(&mut self.buf, &self.config)? {
                return Ok(frame);
            }
            self.fill(deadline)?;
        }
    }

    /// Wait up to `window` for at least one unread byte.
    ///
    /// Returns `Ok(false)` if the stream stayed quiet. Needs either an OS read
    /// timeout on the stream or a non-blocking source to return on time.
    pub fn wait_readable(&mut self, window: Duration) -> Result<bool> {
        if !self.buf.is_empty() {
            return Ok(true);
        }
        match self.fill(Some(Deadline::after(window))) {
            Ok(()) => Ok(true),
            Err(FrameError::Timeout(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn fill(&mut self, deadline: Option<Deadline>) -> Result<()> {
        let interruptible = deadline.is_some() || self.cancel.is_some();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                debug!(buffered = self.buf.len(), "frame read cancelled");
                return Err(FrameError::Cancelled);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline.at {
                    trace!(
                        budget = ?deadline.budget,
                        buffered = self.buf.len(),
                        "frame read deadline passed"
                    );
                    return Err(FrameError::Timeout(deadline.budget));
                }
            }

            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(FrameError::TruncatedStream),
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if interruptible
                        && matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Update the per-read deadline for subsequent reads.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.config.read_timeout = timeout;
    }
}

impl FrameReader<WireStream> {
    /// Create a frame reader for a `WireStream`.
    ///
    /// When a deadline or a cancellation token is in play the socket gets the
    /// poll interval as its OS read timeout, so blocked reads wake up to check
    /// them. Otherwise reads block indefinitely.
    pub fn for_wire(
        inner: WireStream,
        config: FrameConfig,
        cancel: Option<CancelToken>,
    ) -> Result<Self> {
        let os_timeout = if config.read_timeout.is_some() || cancel.is_some() {
            Some(config.poll_interval)
        } else {
            None
        };
        inner
            .set_read_timeout(os_timeout)
            .map_err(transport_to_frame_error)?;

        let reader = Self::with_config(inner, config);
        Ok(match cancel {
            Some(token) => reader.with_cancel(token),
            None => reader,
        })
    }
}

pub(crate) fn transport_to_frame_error(err: p2pmux_transport::TransportError) -> FrameError {
    match err {
        p2pmux_transport::TransportError::Io(io) => FrameError::Io(io),
        p2pmux_transport::TransportError::Resolve { source, .. }
        | p2pmux_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
    }
}
