//! Capture error types.

use std::path::PathBuf;

use crate::assets::AssetError;
use crate::atrace::SpawnError;

/// Errors that end a capture session.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// The capture process could not be started.
    #[error("Failed to start capture: {0}")]
    Spawn(#[from] SpawnError),

    /// Viewer assets could not be resolved.
    #[error(transparent)]
    Assets(#[from] AssetError),

    /// Reading one of the process channels failed.
    #[error("Failed to read from capture process {channel}: {source}")]
    ChannelRead {
        channel: &'static str,
        source: std::io::Error,
    },

    /// Waiting for the capture process failed.
    #[error("Failed to wait for capture process: {0}")]
    Wait(std::io::Error),

    /// The payload is not a valid compressed stream.
    #[error("Malformed trace payload: {0}")]
    Decompression(#[from] flate2::DecompressError),

    /// The process exited without printing the marker line.
    #[error("No trace captured: an error occurred while capturing the trace, output file was not written")]
    NoMarkerSeen,

    /// The process reported failure.
    #[error("Capture process returned error code {code}")]
    NonZeroExit { code: i32 },

    /// Writing status or relayed diagnostics to the terminal failed.
    #[error("Failed to write to terminal: {0}")]
    Terminal(std::io::Error),

    /// Writing the document failed.
    #[error("Failed to write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A failed capture and the partial document it left on disk, if any.
#[derive(thiserror::Error, Debug)]
#[error("{error}")]
pub struct CaptureFailure {
    #[source]
    pub error: CaptureError,
    pub partial_output: Option<PathBuf>,
}

impl From<CaptureError> for CaptureFailure {
    fn from(error: CaptureError) -> Self {
        Self {
            error,
            partial_output: None,
        }
    }
}
