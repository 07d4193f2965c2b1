use std::io::{ErrorKind, Write};

use bytes::{Bytes, BytesMut};
use p2pmux_transport::WireStream;
use tracing::warn;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::mplex::{encode_mplex, MessageType, MplexFrame, Nesting};
use crate::negotiation::encode_negotiation;
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete negotiation and mplex frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a negotiation frame (blocking).
    pub fn send_negotiation(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_negotiation(payload, &self.config, &mut self.buf)?;
        self.write_buffered()
    }

    /// Encode and send an mplex frame (blocking).
    pub fn write_mplex(&mut self, frame: &MplexFrame, nesting: Nesting) -> Result<()> {
        self.buf.clear();
        encode_mplex(frame, nesting, &self.config, &mut self.buf)?;
        self.write_buffered()
    }

    /// Encode and send a payload on an mplex stream.
    pub fn send_mplex(
        &mut self,
        stream_id: u32,
        message_type: MessageType,
        payload: &[u8],
        nesting: Nesting,
    ) -> Result<()> {
        let frame = MplexFrame::new(stream_id, message_type, Bytes::copy_from_slice(payload));
        self.write_mplex(&frame, nesting)
    }

    /// Write raw, already framed bytes.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.write_error(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.write_error(err)),
            }
        }
    }

    /// A socket send timeout surfaces as `WouldBlock` (or `TimedOut`), so a
    /// stalled peer maps to [`FrameError::Timeout`] when one is configured.
    fn write_error(&self, err: std::io::Error) -> FrameError {
        match (err.kind(), self.config.write_timeout) {
            (ErrorKind::WouldBlock | ErrorKind::TimedOut, Some(timeout)) => {
                warn!(?timeout, "write stalled past the write timeout");
                FrameError::Timeout(timeout)
            }
            _ => FrameError::Io(err),
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<WireStream> {
    /// Create a frame writer for a `WireStream` and apply the write timeout.
    pub fn for_wire(inner: WireStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
