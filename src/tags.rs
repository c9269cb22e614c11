//! Persistent trace tag configuration on the device.
//!
//! Userland trace points are gated by a bitmask in a system property.
//! Setting it is a separate mode that does not capture anything.

use std::process::Stdio;

use tokio::process::Command;

/// Property holding the enabled tag mask.
pub const TAGS_PROPERTY: &str = "debug.atrace.tags.enableflags";

/// Known trace tags and their bits.
pub const TRACE_TAGS: &[(&str, u32)] = &[
    ("gfx", 1 << 1),
    ("input", 1 << 2),
    ("view", 1 << 3),
    ("webview", 1 << 4),
    ("wm", 1 << 5),
    ("am", 1 << 6),
    ("sync", 1 << 7),
    ("audio", 1 << 8),
    ("video", 1 << 9),
    ("camera", 1 << 10),
];

/// Error type for tag operations.
#[derive(thiserror::Error, Debug)]
pub enum TagError {
    #[error("unrecognized tag: {tag}\nknown tags are: {}", known_tags())]
    Unknown { tag: String },
    #[error("unable to set tags: {0}")]
    Command(String),
}

/// Comma separated list of the known tag names.
#[must_use]
pub fn known_tags() -> String {
    TRACE_TAGS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A parsed set of tags with its bitmask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    names: Vec<String>,
    flags: u32,
}

impl TagSet {
    /// Parse a comma separated tag list such as `gfx,view,am`.
    ///
    /// # Errors
    ///
    /// Returns `TagError::Unknown` for the first tag that is not known.
    pub fn parse(list: &str) -> Result<Self, TagError> {
        let mut names = Vec::new();
        let mut flags = 0;
        for tag in list.split(',') {
            let bit = TRACE_TAGS
                .iter()
                .find(|(name, _)| *name == tag)
                .map(|(_, bit)| *bit)
                .ok_or_else(|| TagError::Unknown {
                    tag: tag.to_string(),
                })?;
            flags |= bit;
            names.push(tag.to_string());
        }
        Ok(Self { names, flags })
    }

    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Arguments for `adb` that store this mask on the device.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        vec![
            "shell".to_string(),
            "setprop".to_string(),
            TAGS_PROPERTY.to_string(),
            format!("{:#x}", self.flags),
        ]
    }

    /// Run `adb shell setprop` with this mask.
    ///
    /// # Errors
    ///
    /// Returns `TagError::Command` if adb cannot be run or exits non-zero.
    pub async fn apply(&self, adb: &str) -> Result<(), TagError> {
        let args = self.build_args();
        tracing::info!(adb, args = ?args, "Setting trace tags");

        let status = Command::new(adb)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| TagError::Command(format!("{adb}: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(TagError::Command(format!("{adb} exited with {status}")))
        }
    }
}
