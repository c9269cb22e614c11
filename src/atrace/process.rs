//! Capture process spawning.
//!
//! Spawns `adb shell atrace` (or any other program producing the same
//! stream) with both output channels piped, and hands the channels plus an
//! exit future to the capture pipeline.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use super::AtraceOptions;

/// Future resolving to the capture process's exit code.
pub type ExitFuture = Pin<Box<dyn Future<Output = io::Result<i32>> + Send>>;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("{0} not found")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied running {0}")]
    PermissionDenied(String),
    /// A pipe was not set up on the spawned child.
    #[error("Process {0} not available")]
    MissingPipe(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(binary: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(binary.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(binary.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// The readable side of a running capture process.
pub struct ProcessChannels {
    /// Primary channel: status lines, marker, compressed payload.
    pub stdout: ChildStdout,
    /// Diagnostic channel, relayed verbatim.
    pub stderr: ChildStderr,
    /// Resolves when the process exits.
    pub exit: ExitFuture,
}

impl std::fmt::Debug for ProcessChannels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessChannels")
            .field("stdout", &self.stdout)
            .field("stderr", &self.stderr)
            .finish_non_exhaustive()
    }
}

/// A running capture process.
#[derive(Debug)]
pub struct CaptureProcess {
    child: Child,
}

impl CaptureProcess {
    /// Spawn `adb shell atrace` with the given options.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(adb: &str, options: &AtraceOptions) -> Result<Self, SpawnError> {
        Self::spawn_with_binary(adb, &options.build_args())
    }

    /// Spawn an arbitrary binary with piped output (for testing or for
    /// capture programs other than adb).
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn_with_binary(binary: &str, args: &[String]) -> Result<Self, SpawnError> {
        tracing::info!(binary, args = ?args, "Spawning capture process");

        let child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SpawnError::from_io(binary, e))?;

        Ok(Self { child })
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Split the process into its output channels and an exit future.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError::MissingPipe` if stdout or stderr was already taken.
    pub fn into_channels(mut self) -> Result<ProcessChannels, SpawnError> {
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = self
            .child
            .stderr
            .take()
            .ok_or(SpawnError::MissingPipe("stderr"))?;

        let mut child = self.child;
        let exit: ExitFuture = Box::pin(async move { child.wait().await.map(exit_code) });

        Ok(ProcessChannels {
            stdout,
            stderr,
            exit,
        })
    }
}

/// Reduce an exit status to a single integer.
///
/// A process killed by a signal reports `128 + signal`, the shell convention.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}
