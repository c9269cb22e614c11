//! Streaming capture pipeline.
//!
//! Reads the capture process's output, finds the payload marker, inflates
//! the payload as it arrives and writes it into an HTML document.

mod decompress;
mod document;
mod error;
mod multiplex;
mod scanner;
mod session;

use std::io::Write;
use std::path::{Path, PathBuf};

pub use decompress::*;
pub use document::*;
pub use error::*;
pub use multiplex::*;
pub use scanner::*;
pub use session::*;

use crate::assets::{resolve_assets, AssetMode, Assets};
use crate::atrace::{AtraceOptions, CaptureProcess};
use crate::config::{CaptureConfig, TracecapConfig};

/// Resolve assets, spawn `adb shell atrace` and capture into `output`.
///
/// Status text goes to stdout and the process's stderr is relayed to
/// stderr.
///
/// # Errors
///
/// Returns a `CaptureFailure` carrying the error that ended the capture.
pub async fn run_capture(
    config: &TracecapConfig,
    options: &AtraceOptions,
    output: PathBuf,
    mode: AssetMode,
) -> Result<CaptureOutcome, CaptureFailure> {
    let assets = resolve_assets(&config.assets, mode).map_err(CaptureError::from)?;
    let process = CaptureProcess::spawn(&config.adb, options).map_err(CaptureError::from)?;
    capture_process(
        process,
        &config.capture,
        output,
        assets,
        std::io::stdout(),
        std::io::stderr(),
    )
    .await
}

/// Capture from an already spawned process.
///
/// # Errors
///
/// Returns a `CaptureFailure` carrying the error that ended the capture and
/// the partial document, if one was opened.
pub async fn capture_process<S, E>(
    process: CaptureProcess,
    config: &CaptureConfig,
    output: PathBuf,
    assets: Assets,
    status: S,
    relay: E,
) -> Result<CaptureOutcome, CaptureFailure>
where
    S: Write,
    E: Write,
{
    if let Some(pid) = process.id() {
        tracing::debug!(pid, "Capture process running");
    }
    let channels = process.into_channels().map_err(CaptureError::from)?;
    let mut mux = ChannelMultiplexer::new(channels.stdout, channels.stderr, channels.exit, relay)
        .with_buffer_size(config.effective_read_buffer_size());
    let mut controller = SessionController::new(config, output, assets, status);
    let result = controller.run(&mut mux).await;
    result.map_err(|error| CaptureFailure {
        error,
        partial_output: controller.partial_output().map(Path::to_path_buf),
    })
}
