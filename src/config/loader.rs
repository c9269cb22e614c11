//! Configuration file loader.

use std::path::{Path, PathBuf};

use super::TracecapConfig;

/// Where the configuration comes from.
///
/// An explicit `--config` path must exist. The default candidates are
/// tried in order and skipped when absent.
#[derive(Debug)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Look in `./.tracecap.toml`, then `<config dir>/tracecap/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let candidates = std::iter::once(PathBuf::from(".tracecap.toml"))
            .chain(dirs::config_dir().map(|dir| dir.join("tracecap").join("config.toml")))
            .collect();
        Self {
            explicit: None,
            candidates,
        }
    }

    /// Read exactly `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            explicit: Some(path),
            candidates: Vec::new(),
        }
    }

    /// Files that are tried when no explicit path was given.
    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Load the configuration, falling back to defaults when no candidate
    /// file exists.
    ///
    /// # Errors
    ///
    /// Returns `ReadError` if an explicit path cannot be read and
    /// `ParseError` if the chosen file is not valid TOML.
    pub fn load(&self) -> Result<TracecapConfig, ConfigError> {
        let found = self.candidates.iter().find(|p| p.is_file());
        let path: &Path = match (self.explicit.as_ref(), found) {
            (Some(path), _) | (None, Some(path)) => path,
            (None, None) => {
                tracing::debug!("No config file found, using defaults");
                return Ok(TracecapConfig::default());
            }
        };

        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
