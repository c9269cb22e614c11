//! HTML document output.
//!
//! The decompressed trace is embedded as a JavaScript string literal that
//! spans many source lines. Each payload line becomes `text\n\` so the
//! viewer sees the original newlines while the literal stays valid.

use std::io::{self, Write};

use crate::assets::Assets;

const DOCUMENT_HEAD: &str = r#"<!DOCTYPE HTML>
<html>
<head i18n-values="dir:textdirection;">
<title>Android System Trace</title>
"#;

const DOCUMENT_BODY: &str = r#"
<style>
  .view {
    overflow: hidden;
    position: absolute;
    top: 0;
    bottom: 0;
    left: 0;
    right: 0;
  }
</style>
</head>
<body>
  <div class="view">
  </div>
  <script>
  var linuxPerfData = "\
"#;

const DOCUMENT_SUFFIX: &str = r#"           dummy-0000  [000] 0.0: 0: trace_event_clock_sync: parent_ts=0.0\n";
  </script>
</body>
</html>
"#;

/// Escape decompressed trace text for the string literal.
///
/// Carriage returns are dropped and every `\n` becomes backslash, `n`,
/// backslash, newline.
#[must_use]
pub fn escape_payload(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 16);
    for &b in bytes {
        match b {
            b'\r' => {}
            b'\n' => out.extend_from_slice(b"\\n\\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Writer for one trace document.
///
/// Creating the emitter writes the prefix, so it can never be written
/// twice or after payload. `write_suffix` consumes the emitter.
#[derive(Debug)]
pub struct DocumentEmitter<W: Write> {
    writer: W,
    payload_bytes: u64,
}

impl<W: Write> DocumentEmitter<W> {
    /// Write the document prefix with the given assets and return the
    /// emitter ready for payload.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the prefix fails.
    pub fn new(mut writer: W, assets: &Assets) -> io::Result<Self> {
        writer.write_all(DOCUMENT_HEAD.as_bytes())?;
        writer.write_all(assets.css.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.write_all(assets.js.as_bytes())?;
        writer.write_all(DOCUMENT_BODY.as_bytes())?;
        writer.flush()?;
        Ok(Self {
            writer,
            payload_bytes: 0,
        })
    }

    /// Decompressed payload bytes appended so far.
    #[must_use]
    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    /// Escape and append decompressed payload, then flush so the partial
    /// document is on disk even if the capture fails later.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn append_payload(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.writer.write_all(&escape_payload(bytes))?;
        self.writer.flush()?;
        self.payload_bytes += bytes.len() as u64;
        Ok(())
    }

    /// Close the string literal and the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn write_suffix(mut self) -> io::Result<W> {
        self.writer.write_all(DOCUMENT_SUFFIX.as_bytes())?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}
