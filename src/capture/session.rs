//! Capture session state machine.
//!
//! Drives one capture from spawn to the final report: relays status lines,
//! opens the document when the marker appears, streams payload through the
//! decompressor into the document, and decides success or failure when the
//! process exits.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;

use super::{
    CaptureError, ChannelEvent, ChannelMultiplexer, CrlfTranslator, Decompressor,
    DocumentEmitter, MarkerScanner,
};
use crate::assets::Assets;
use crate::config::CaptureConfig;

/// Printed when the payload starts.
const DOWNLOADING: &[u8] = b"downloading trace...";

/// Current state of a capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Init,
    AwaitingMarker,
    Capturing,
    Finished,
    Failed,
}

impl CaptureState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Bookkeeping for one capture.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    state: CaptureState,
    exit_code: Option<i32>,
}

impl CaptureSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Move to `new_state`. Terminal states are never left.
    pub fn transition(&mut self, new_state: CaptureState) {
        if self.state.is_terminal() {
            tracing::debug!(state = ?self.state, ignored = ?new_state, "Session already ended");
            return;
        }
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    fn record_exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

/// A successful capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// The well-formed document.
    pub output: PathBuf,
    /// Decompressed trace bytes written into it.
    pub payload_bytes: u64,
}

/// Pipeline stages that exist only once the marker has been seen.
struct ActiveCapture {
    crlf: Option<CrlfTranslator>,
    decompressor: Decompressor,
    emitter: DocumentEmitter<BufWriter<File>>,
}

/// Orchestrates scanner, decompressor and document for one capture.
pub struct SessionController<S> {
    output: PathBuf,
    assets: Assets,
    translate_crlf: bool,
    scanner: MarkerScanner,
    active: Option<ActiveCapture>,
    document_opened: bool,
    failure: Option<CaptureError>,
    session: CaptureSession,
    status: S,
}

impl<S: Write> SessionController<S> {
    /// Create a controller writing the document to `output` and status
    /// text to `status`.
    #[must_use]
    pub fn new(config: &CaptureConfig, output: PathBuf, assets: Assets, status: S) -> Self {
        Self {
            output,
            assets,
            translate_crlf: config.translate_crlf,
            scanner: MarkerScanner::new(config.marker.as_bytes()),
            active: None,
            document_opened: false,
            failure: None,
            session: CaptureSession::new(),
            status,
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.session.state()
    }

    /// Exit code of the capture process, once it has exited.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.session.exit_code()
    }

    /// The document left on disk without its suffix, if the session failed
    /// after opening it.
    #[must_use]
    pub fn partial_output(&self) -> Option<&Path> {
        (self.document_opened && self.state() != CaptureState::Finished)
            .then_some(self.output.as_path())
    }

    /// Run the capture until the process exits.
    ///
    /// # Errors
    ///
    /// Returns the `CaptureError` that ended the session. A partial
    /// document written before the failure is left on disk.
    pub async fn run<P, D, E>(
        &mut self,
        mux: &mut ChannelMultiplexer<P, D, E>,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        P: AsyncRead + Unpin,
        D: AsyncRead + Unpin,
        E: Write,
    {
        self.session.transition(CaptureState::AwaitingMarker);

        let result = self.drive(mux).await;
        if result.is_err() {
            self.session.transition(CaptureState::Failed);
        }
        tracing::debug!(
            state = ?self.state(),
            exit_code = ?self.exit_code(),
            "Capture session ended"
        );
        result
    }

    async fn drive<P, D, E>(
        &mut self,
        mux: &mut ChannelMultiplexer<P, D, E>,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        P: AsyncRead + Unpin,
        D: AsyncRead + Unpin,
        E: Write,
    {
        loop {
            match mux.next_event().await? {
                ChannelEvent::Primary(bytes) => self.on_primary(&bytes)?,
                ChannelEvent::Exited(code) => return self.on_exit(code),
            }
        }
    }

    fn on_primary(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        let scan = self.scanner.feed(bytes);

        for line in &scan.status_lines {
            self.status.write_all(line).map_err(CaptureError::Terminal)?;
        }
        if scan.marker_found {
            self.begin_capture()?;
        }
        self.status.flush().map_err(CaptureError::Terminal)?;

        if !scan.payload.is_empty() {
            self.ingest(&scan.payload)?;
        }
        Ok(())
    }

    /// Open the document and write its prefix.
    fn begin_capture(&mut self) -> Result<(), CaptureError> {
        self.status
            .write_all(DOWNLOADING)
            .map_err(CaptureError::Terminal)?;

        let file = File::create(&self.output).map_err(|e| self.output_error(e))?;
        self.document_opened = true;
        let emitter =
            DocumentEmitter::new(BufWriter::new(file), &self.assets).map_err(|e| self.output_error(e))?;
        tracing::info!(output = %self.output.display(), "Trace payload started");

        self.active = Some(ActiveCapture {
            crlf: self.translate_crlf.then(CrlfTranslator::new),
            decompressor: Decompressor::new(),
            emitter,
        });
        self.session.transition(CaptureState::Capturing);
        Ok(())
    }

    /// Push payload through translation, decompression and escaping.
    ///
    /// A malformed payload fails the session but not the read loop, so the
    /// process can still run to completion.
    fn ingest(&mut self, payload: &[u8]) -> Result<(), CaptureError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        let translated;
        let payload = match active.crlf.as_mut() {
            Some(crlf) => {
                translated = crlf.translate(payload);
                translated.as_slice()
            }
            None => payload,
        };

        match active.decompressor.feed(payload) {
            Ok(bytes) => active
                .emitter
                .append_payload(&bytes)
                .map_err(|e| self.output_error(e)),
            Err(e) => {
                tracing::warn!(error = %e, "Trace payload is malformed");
                self.active = None;
                self.failure = Some(e.into());
                self.session.transition(CaptureState::Failed);
                Ok(())
            }
        }
    }

    fn on_exit(&mut self, code: i32) -> Result<CaptureOutcome, CaptureError> {
        self.session.record_exit(code);

        if !self.scanner.marker_seen() {
            self.show_pending()?;
        }

        if code != 0 {
            self.session.transition(CaptureState::Failed);
            return Err(CaptureError::NonZeroExit { code });
        }
        if let Some(err) = self.failure.take() {
            return Err(err);
        }

        match self.active.take() {
            Some(active) => self.complete(active),
            None => {
                self.session.transition(CaptureState::Failed);
                Err(CaptureError::NoMarkerSeen)
            }
        }
    }

    /// Flush the decompressor and close the document.
    fn complete(&mut self, active: ActiveCapture) -> Result<CaptureOutcome, CaptureError> {
        let ActiveCapture {
            crlf,
            mut decompressor,
            mut emitter,
        } = active;

        let mut tail = match crlf {
            Some(crlf) => decompressor.feed(&crlf.finish())?,
            None => Vec::new(),
        };
        tail.extend(decompressor.finish()?);

        emitter
            .append_payload(&tail)
            .map_err(|e| self.output_error(e))?;
        let payload_bytes = emitter.payload_bytes();
        emitter.write_suffix().map_err(|e| self.output_error(e))?;

        self.session.transition(CaptureState::Finished);
        tracing::info!(
            output = %self.output.display(),
            payload_bytes,
            "Trace written"
        );
        Ok(CaptureOutcome {
            output: self.output.clone(),
            payload_bytes,
        })
    }

    /// Display a status fragment that never got its line terminator.
    fn show_pending(&mut self) -> Result<(), CaptureError> {
        let pending = self.scanner.take_pending();
        if pending.is_empty() {
            return Ok(());
        }
        self.status
            .write_all(&pending)
            .and_then(|()| self.status.write_all(b"\n"))
            .and_then(|()| self.status.flush())
            .map_err(CaptureError::Terminal)
    }

    fn output_error(&self, source: std::io::Error) -> CaptureError {
        CaptureError::Output {
            path: self.output.clone(),
            source,
        }
    }
}
