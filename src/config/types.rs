//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Smallest read size the multiplexer accepts.
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracecapConfig {
    /// Program used to reach the device.
    pub adb: String,
    /// Default output document.
    pub output: PathBuf,
    pub capture: CaptureConfig,
    pub assets: AssetConfig,
}

impl Default for TracecapConfig {
    fn default() -> Self {
        Self {
            adb: "adb".to_string(),
            output: PathBuf::from("trace.html"),
            capture: CaptureConfig::default(),
            assets: AssetConfig::default(),
        }
    }
}

/// Settings for the capture pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Line announcing the start of the compressed payload.
    pub marker: String,
    /// Bytes requested per read from each channel.
    pub read_buffer_size: usize,
    /// Undo PTY `\r\n` translation inside the payload.
    pub translate_crlf: bool,
}

impl CaptureConfig {
    /// Read size with the lower bound applied.
    #[must_use]
    pub fn effective_read_buffer_size(&self) -> usize {
        self.read_buffer_size.max(MIN_READ_BUFFER_SIZE)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            marker: "TRACE:".to_string(),
            read_buffer_size: 4096,
            translate_crlf: false,
        }
    }
}

/// Where the viewer's CSS and JavaScript come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Asset directory. Defaults to the directory of the executable.
    pub dir: Option<PathBuf>,
    /// Source stylesheets referenced with `--link-assets`.
    pub css_in_files: Vec<String>,
    /// Source scripts referenced with `--link-assets`.
    pub js_in_files: Vec<String>,
    /// Compiled stylesheet embedded by default.
    pub css_out_file: String,
    /// Compiled script embedded by default.
    pub js_out_file: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            dir: None,
            css_in_files: vec!["style.css".to_string()],
            js_in_files: vec!["script.js".to_string()],
            css_out_file: "style.css".to_string(),
            js_out_file: "script.js".to_string(),
        }
    }
}
