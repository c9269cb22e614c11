//! Presentation assets for the trace viewer.
//!
//! The generated document either embeds the compiled CSS and JavaScript
//! or links to the source files next to the executable.

use std::path::{Path, PathBuf};

use crate::config::AssetConfig;

/// How assets end up in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssetMode {
    /// Inline the compiled files.
    #[default]
    Embed,
    /// Reference the source files by path.
    Link,
}

/// Rendered asset tags, ready to drop into the document head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assets {
    pub css: String,
    pub js: String,
}

/// Errors that can occur while resolving assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to read asset {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot locate the asset directory: {0}")]
    NoAssetDir(std::io::Error),
}

/// Resolve the assets for `mode` using the configured file lists.
///
/// # Errors
///
/// Returns `AssetError` if an embedded file cannot be read or the asset
/// directory cannot be determined.
pub fn resolve_assets(config: &AssetConfig, mode: AssetMode) -> Result<Assets, AssetError> {
    let dir = asset_dir(config)?;
    tracing::debug!(dir = %dir.display(), mode = ?mode, "Resolving assets");

    match mode {
        AssetMode::Embed => {
            let css = read_asset(&dir.join(&config.css_out_file))?;
            let js = read_asset(&dir.join(&config.js_out_file))?;
            Ok(Assets {
                css: format!(r#"<style type="text/css">{css}</style>"#),
                js: format!(r#"<script language="javascript">{js}</script>"#),
            })
        }
        AssetMode::Link => {
            let css = config
                .css_in_files
                .iter()
                .map(|f| format!(r#"<link rel="stylesheet" href="{}"></link>"#, dir.join(f).display()))
                .collect::<Vec<_>>()
                .join("\n");
            let js = config
                .js_in_files
                .iter()
                .map(|f| {
                    format!(
                        r#"<script language="javascript" src="{}"></script>"#,
                        dir.join(f).display()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Assets { css, js })
        }
    }
}

/// The configured asset directory, or the directory holding the executable.
fn asset_dir(config: &AssetConfig) -> Result<PathBuf, AssetError> {
    if let Some(dir) = &config.dir {
        return Ok(dir.clone());
    }
    let exe = std::env::current_exe().map_err(AssetError::NoAssetDir)?;
    Ok(exe
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf))
}

fn read_asset(path: &Path) -> Result<String, AssetError> {
    std::fs::read_to_string(path).map_err(|e| AssetError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })
}
