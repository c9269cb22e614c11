//! Readiness multiplexing over the capture process's channels.

use std::io::Write;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::CaptureError;
use crate::atrace::ExitFuture;
use crate::config::MIN_READ_BUFFER_SIZE;

/// Default bytes requested per read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Something the controller has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Bytes read from the primary channel, in order.
    Primary(Vec<u8>),
    /// The process exited and both channels are drained. Repeated on every
    /// call once reached.
    Exited(i32),
}

/// Waits on the primary channel, the diagnostic channel and process exit.
///
/// Diagnostic bytes are relayed to `relay` as soon as they are read and
/// never surface as events. Once the exit signal fires, whatever is left in
/// the pipes is still read to EOF before `Exited` is reported, so the tail
/// of the payload is not lost.
pub struct ChannelMultiplexer<P, D, E> {
    primary: P,
    diagnostic: D,
    exit: ExitFuture,
    relay: E,
    primary_buf: Vec<u8>,
    diagnostic_buf: Vec<u8>,
    primary_open: bool,
    diagnostic_open: bool,
    exit_code: Option<i32>,
}

impl<P, D, E> ChannelMultiplexer<P, D, E>
where
    P: AsyncRead + Unpin,
    D: AsyncRead + Unpin,
    E: Write,
{
    /// Create a multiplexer with the default read size.
    #[must_use]
    pub fn new(primary: P, diagnostic: D, exit: ExitFuture, relay: E) -> Self {
        Self {
            primary,
            diagnostic,
            exit,
            relay,
            primary_buf: vec![0; DEFAULT_READ_BUFFER_SIZE],
            diagnostic_buf: vec![0; DEFAULT_READ_BUFFER_SIZE],
            primary_open: true,
            diagnostic_open: true,
            exit_code: None,
        }
    }

    /// Set the read size, never below one kilobyte.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        let size = size.max(MIN_READ_BUFFER_SIZE);
        self.primary_buf = vec![0; size];
        self.diagnostic_buf = vec![0; size];
        self
    }

    /// Wait for the next event.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::ChannelRead` if a channel read fails,
    /// `CaptureError::Terminal` if relaying diagnostics fails, and
    /// `CaptureError::Wait` if waiting for the process fails.
    pub async fn next_event(&mut self) -> Result<ChannelEvent, CaptureError> {
        loop {
            if let Some(code) = self.exit_code {
                if !self.primary_open && !self.diagnostic_open {
                    return Ok(ChannelEvent::Exited(code));
                }
            }

            tokio::select! {
                read = self.primary.read(&mut self.primary_buf), if self.primary_open => {
                    let n = read.map_err(|source| CaptureError::ChannelRead {
                        channel: "stdout",
                        source,
                    })?;
                    if n == 0 {
                        tracing::debug!("Primary channel closed");
                        self.primary_open = false;
                    } else {
                        return Ok(ChannelEvent::Primary(self.primary_buf[..n].to_vec()));
                    }
                }
                read = self.diagnostic.read(&mut self.diagnostic_buf), if self.diagnostic_open => {
                    let n = read.map_err(|source| CaptureError::ChannelRead {
                        channel: "stderr",
                        source,
                    })?;
                    if n == 0 {
                        tracing::debug!("Diagnostic channel closed");
                        self.diagnostic_open = false;
                    } else {
                        self.relay
                            .write_all(&self.diagnostic_buf[..n])
                            .and_then(|()| self.relay.flush())
                            .map_err(CaptureError::Terminal)?;
                    }
                }
                status = &mut self.exit, if self.exit_code.is_none() => {
                    let code = status.map_err(CaptureError::Wait)?;
                    tracing::debug!(code, "Capture process exited");
                    self.exit_code = Some(code);
                }
            }
        }
    }

    /// Give back the relay writer.
    pub fn into_relay(self) -> E {
        self.relay
    }
}
