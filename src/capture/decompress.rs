//! Incremental zlib decompression of the trace payload.

use flate2::{Decompress, DecompressError, FlushDecompress, Status};

/// Size of the scratch buffer each inflate step writes into.
const OUTPUT_CHUNK: usize = 32 * 1024;

/// Streaming inflater fed with payload bytes as they arrive.
///
/// The inflate state is created on the first non-empty chunk. `finish`
/// consumes the decompressor, so it runs at most once.
#[derive(Debug, Default)]
pub struct Decompressor {
    inner: Option<Decompress>,
    stream_ended: bool,
    ignored: u64,
}

impl Decompressor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total decompressed bytes produced so far.
    #[must_use]
    pub fn total_out(&self) -> u64 {
        self.inner.as_ref().map_or(0, Decompress::total_out)
    }

    /// Bytes received after the end of the compressed stream and dropped.
    #[must_use]
    pub fn ignored_bytes(&self) -> u64 {
        self.ignored
    }

    /// Feed the next payload chunk and return the bytes it made available.
    ///
    /// # Errors
    ///
    /// Returns `DecompressError` if the payload is not a valid zlib stream.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<u8>, DecompressError> {
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        if self.stream_ended {
            self.ignore(chunk.len());
            return Ok(Vec::new());
        }

        let inner = self.inner.get_or_insert_with(|| Decompress::new(true));
        let mut out = Vec::new();
        let (ended, consumed) = inflate(inner, chunk, FlushDecompress::None, &mut out)?;
        self.stream_ended = ended;
        if ended && consumed < chunk.len() {
            self.ignore(chunk.len() - consumed);
        }
        tracing::trace!(
            compressed = chunk.len(),
            decompressed = out.len(),
            "Inflated payload chunk"
        );
        Ok(out)
    }

    /// Flush whatever the end of the compressed stream reveals.
    ///
    /// # Errors
    ///
    /// Returns `DecompressError` if the remaining state is malformed.
    pub fn finish(self) -> Result<Vec<u8>, DecompressError> {
        let mut out = Vec::new();
        let Some(mut inner) = self.inner else {
            return Ok(out);
        };

        if !self.stream_ended {
            let (ended, _) = inflate(&mut inner, &[], FlushDecompress::Finish, &mut out)?;
            if !ended {
                tracing::warn!(
                    total_in = inner.total_in(),
                    "Payload ended before the end of the compressed stream"
                );
            }
        }

        tracing::debug!(
            total_in = inner.total_in(),
            total_out = inner.total_out(),
            "Decompression finished"
        );
        Ok(out)
    }

    fn ignore(&mut self, bytes: usize) {
        tracing::warn!(bytes, "Ignoring data after end of compressed stream");
        self.ignored += bytes as u64;
    }
}

/// Run `input` through `inner` until it is consumed and no more output is
/// pending. Returns whether the end of the zlib stream was reached and how
/// much of `input` was consumed.
fn inflate(
    inner: &mut Decompress,
    input: &[u8],
    flush: FlushDecompress,
    out: &mut Vec<u8>,
) -> Result<(bool, usize), DecompressError> {
    let mut buf = vec![0u8; OUTPUT_CHUNK];
    let mut consumed = 0;

    loop {
        let before_in = inner.total_in();
        let before_out = inner.total_out();
        let status = inner.decompress(&input[consumed..], &mut buf, flush)?;
        let read = delta(inner.total_in(), before_in);
        let written = delta(inner.total_out(), before_out);

        consumed += read;
        out.extend_from_slice(&buf[..written]);

        match status {
            Status::StreamEnd => return Ok((true, consumed)),
            Status::BufError => return Ok((false, consumed)),
            Status::Ok => {}
        }
        if read == 0 && written == 0 {
            return Ok((false, consumed));
        }
        if consumed == input.len() && written < buf.len() {
            return Ok((false, consumed));
        }
    }
}

fn delta(after: u64, before: u64) -> usize {
    usize::try_from(after - before).unwrap_or(usize::MAX)
}
