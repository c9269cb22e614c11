//! Marker detection on the primary channel.
//!
//! Everything the capture process prints before the marker line is status
//! text for the user. Everything after it is compressed payload. Reads can
//! split anywhere, including inside the marker itself, so the scanner keeps
//! the unterminated tail of each read and rescans it with the next one.

/// One item produced by [`scan_lines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanItem<'a> {
    /// A complete line that is not the marker, terminator included.
    StatusLine(&'a [u8]),
    /// The marker line. `payload` is every byte that followed it.
    MarkerFound { payload: &'a [u8] },
    /// Trailing bytes with no line terminator yet.
    IncompleteTail(&'a [u8]),
}

/// Split `buf` into status lines, stopping at the first line whose body is
/// exactly `marker`.
///
/// A line ends at `\n`; a `\r` right before it is part of the terminator.
/// The marker only matches a whole line, never a substring of one.
#[must_use]
pub fn scan_lines<'a>(buf: &'a [u8], marker: &[u8]) -> Vec<ScanItem<'a>> {
    let mut items = Vec::new();
    let mut rest = buf;

    while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
        let (line, tail) = rest.split_at(pos + 1);
        rest = tail;
        if line_body(line) == marker {
            items.push(ScanItem::MarkerFound { payload: rest });
            return items;
        }
        items.push(ScanItem::StatusLine(line));
    }

    if !rest.is_empty() {
        items.push(ScanItem::IncompleteTail(rest));
    }
    items
}

/// Strip the `\n` or `\r\n` terminator from a complete line.
fn line_body(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Result of feeding one read into the scanner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    /// Complete status lines, each terminated by a single `\n`.
    pub status_lines: Vec<Vec<u8>>,
    /// Whether the marker was recognized during this read.
    pub marker_found: bool,
    /// Payload bytes, in arrival order.
    pub payload: Vec<u8>,
}

/// Stateful scanner owning the pending fragment between reads.
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    marker: Vec<u8>,
    pending: Vec<u8>,
    marker_seen: bool,
}

impl MarkerScanner {
    /// Create a scanner looking for `marker` as a whole line.
    #[must_use]
    pub fn new(marker: impl Into<Vec<u8>>) -> Self {
        Self {
            marker: marker.into(),
            pending: Vec::new(),
            marker_seen: false,
        }
    }

    /// Whether the marker line has been seen.
    #[must_use]
    pub fn marker_seen(&self) -> bool {
        self.marker_seen
    }

    /// The fragment carried into the next read.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Process one read from the primary channel.
    pub fn feed(&mut self, chunk: &[u8]) -> ScanOutput {
        if self.marker_seen {
            return ScanOutput {
                payload: chunk.to_vec(),
                ..ScanOutput::default()
            };
        }

        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);

        let mut output = ScanOutput::default();
        for item in scan_lines(&buf, &self.marker) {
            match item {
                ScanItem::StatusLine(line) => {
                    let mut normalized = line_body(line).to_vec();
                    normalized.push(b'\n');
                    output.status_lines.push(normalized);
                }
                ScanItem::MarkerFound { payload } => {
                    tracing::debug!(payload_bytes = payload.len(), "Marker line recognized");
                    self.marker_seen = true;
                    output.marker_found = true;
                    output.payload = payload.to_vec();
                }
                ScanItem::IncompleteTail(tail) => {
                    self.pending = tail.to_vec();
                }
            }
        }

        output
    }

    /// Take the pending fragment, e.g. to display it when the process exits
    /// without ever printing the marker.
    pub fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }
}

/// Undoes the `\n` to `\r\n` translation a PTY applies to the payload.
///
/// A trailing `\r` is held back until the next chunk shows whether it
/// starts a `\r\n` pair.
#[derive(Debug, Default, Clone)]
pub struct CrlfTranslator {
    held_cr: bool,
}

impl CrlfTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one chunk.
    pub fn translate(&mut self, chunk: &[u8]) -> Vec<u8> {
        if chunk.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(chunk.len() + 1);
        let mut bytes = chunk.iter().copied().peekable();

        if std::mem::take(&mut self.held_cr) && bytes.peek() != Some(&b'\n') {
            out.push(b'\r');
        }

        while let Some(b) = bytes.next() {
            if b != b'\r' {
                out.push(b);
                continue;
            }
            match bytes.peek() {
                Some(b'\n') => {}
                Some(_) => out.push(b'\r'),
                None => self.held_cr = true,
            }
        }

        out
    }

    /// Release a `\r` still held at end-of-stream.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        if self.held_cr {
            vec![b'\r']
        } else {
            Vec::new()
        }
    }
}
