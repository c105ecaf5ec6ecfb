use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::io::Read;

/// Default size of one decompressed chunk pulled from the source stream.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Reassembles complete text lines from a byte stream read in fixed-size
/// chunks, without materializing the stream.
///
/// A chunk boundary can fall inside a line or inside a multi-byte UTF-8
/// sequence. Everything after the last newline of the data seen so far is
/// carried over as raw bytes and spliced onto the next chunk, so partial
/// lines and split characters are never decoded early. End of stream is
/// detected by a zero-byte read, never by a short chunk: a stream whose
/// length is an exact multiple of the chunk size keeps its trailing data.
///
/// Yields the same line sequence as decoding the whole stream at once and
/// calling `str::lines()` on it.
pub struct ChunkDecoder<R: Read> {
    source: R,
    buf: Vec<u8>,
    carry: Vec<u8>,
    pending: VecDeque<String>,
    exhausted: bool,
    strict: bool,
    invalid_sequences: u64,
}

impl<R: Read> ChunkDecoder<R> {
    pub fn new(source: R) -> Self {
        Self::with_chunk_size(source, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            buf: vec![0u8; chunk_size.max(1)],
            carry: Vec::new(),
            pending: VecDeque::new(),
            exhausted: false,
            strict: false,
            invalid_sequences: 0,
        }
    }

    /// In strict mode an undecodable byte sequence aborts instead of being
    /// skipped and counted.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Number of undecodable byte runs skipped so far (best-effort mode).
    pub fn invalid_sequences(&self) -> u64 {
        self.invalid_sequences
    }

    /// Read one chunk, splice it onto the carry-over, and extract every
    /// complete line. On stream exhaustion the remaining carry-over is
    /// flushed as a final line even without a trailing newline.
    fn refill(&mut self) -> Result<()> {
        let mut filled = 0;
        while filled < self.buf.len() {
            let n = self.source.read(&mut self.buf[filled..])?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }

        if filled > 0 {
            self.carry.extend_from_slice(&self.buf[..filled]);
            if let Some(cut) = self.carry.iter().rposition(|&b| b == b'\n') {
                let region: Vec<u8> = self.carry.drain(..=cut).collect();
                self.push_lines(&region)?;
            }
        }

        if self.exhausted && !self.carry.is_empty() {
            let tail = std::mem::take(&mut self.carry);
            self.push_lines(&tail)?;
        }

        Ok(())
    }

    fn push_lines(&mut self, bytes: &[u8]) -> Result<()> {
        let text = self.decode_text(bytes)?;
        for line in text.lines() {
            self.pending.push_back(line.to_string());
        }
        Ok(())
    }

    /// Decode a byte region that is known to be complete: it either ends at
    /// a newline or is the flushed end of the stream, so any non-UTF-8 run
    /// in it is genuinely undecodable rather than split by a chunk boundary.
    fn decode_text(&mut self, bytes: &[u8]) -> Result<String> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(err) if self.strict => Err(anyhow!(
                "invalid UTF-8 sequence after {} valid bytes",
                err.valid_up_to()
            )),
            Err(_) => {
                let mut out = String::with_capacity(bytes.len());
                for chunk in bytes.utf8_chunks() {
                    out.push_str(chunk.valid());
                    if !chunk.invalid().is_empty() {
                        self.invalid_sequences += 1;
                    }
                }
                Ok(out)
            }
        }
    }
}

impl<R: Read> Iterator for ChunkDecoder<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(Ok(line));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.refill() {
                self.exhausted = true;
                self.carry.clear();
                return Some(Err(e));
            }
        }
    }
}
