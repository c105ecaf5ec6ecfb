use anyhow::{anyhow, Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Chain, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::progress::Progress;

/// File reader that adds every byte it hands out to the shared progress
/// counters. Wraps the compressed file, so progress tracks compressed
/// input against the known total of all input file sizes.
pub struct CountingReader {
    inner: File,
    progress: Arc<Progress>,
}

impl CountingReader {
    fn new(inner: File, progress: Arc<Progress>) -> Self {
        Self { inner, progress }
    }
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.add_bytes(n as u64);
        Ok(n)
    }
}

type ChainReader = Chain<Cursor<Vec<u8>>, CountingReader>;
type GzipReader = MultiGzDecoder<ChainReader>;
type ZstdReader = zstd::Decoder<'static, BufReader<ChainReader>>;

/// Streaming archive reader with compression auto-detection.
/// Detects gzip (1F 8B 08) and zstd (28 B5 2F FD) by magic bytes; anything
/// else is passed through as plain NDJSON.
pub enum ArchiveReader {
    Gzip(GzipReader),
    Zstd(ZstdReader),
    Plain(ChainReader),
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveReader::Gzip(_) => write!(f, "ArchiveReader::Gzip"),
            ArchiveReader::Zstd(_) => write!(f, "ArchiveReader::Zstd"),
            ArchiveReader::Plain(_) => write!(f, "ArchiveReader::Plain"),
        }
    }
}

impl Read for ArchiveReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ArchiveReader::Gzip(reader) => reader.read(buf),
            ArchiveReader::Zstd(reader) => reader.read(buf),
            ArchiveReader::Plain(reader) => reader.read(buf),
        }
    }
}

impl ArchiveReader {
    /// Open an archive with magic-byte compression detection. Bytes read
    /// from the file, including the sniffed header, count toward progress.
    pub fn open<P: AsRef<Path>>(path: P, progress: Arc<Progress>) -> Result<Self> {
        let path_ref = path.as_ref();

        if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
            if extension.eq_ignore_ascii_case("zip") {
                return Err(anyhow!(
                    "ZIP archives are not supported for streaming; only gzip, zstd, \
                     and plain NDJSON are. Extract it first: unzip {}",
                    path_ref.display()
                ));
            }
        }

        let file = File::open(path_ref)
            .with_context(|| format!("cannot open archive {}", path_ref.display()))?;
        let mut counting = CountingReader::new(file, progress);

        let mut head = [0u8; 4];
        let n = read_head(&mut counting, &mut head)
            .with_context(|| format!("cannot read archive header {}", path_ref.display()))?;

        // Put the sniffed bytes back in front using a cursor chain
        let prefix = Cursor::new(head[..n].to_vec());
        let chained = prefix.chain(counting);

        let is_gzip = n >= 3 && head[0] == 0x1F && head[1] == 0x8B && head[2] == 0x08;
        let is_zstd =
            n >= 4 && head[0] == 0x28 && head[1] == 0xB5 && head[2] == 0x2F && head[3] == 0xFD;

        if is_gzip {
            Ok(ArchiveReader::Gzip(MultiGzDecoder::new(chained)))
        } else if is_zstd {
            let mut decoder = zstd::Decoder::new(chained)
                .with_context(|| format!("cannot init zstd decoder for {}", path_ref.display()))?;
            // Large public dumps are encoded with a long-distance window.
            decoder
                .window_log_max(31)
                .with_context(|| format!("cannot widen zstd window for {}", path_ref.display()))?;
            Ok(ArchiveReader::Zstd(decoder))
        } else {
            Ok(ArchiveReader::Plain(chained))
        }
    }
}

/// Read up to 4 header bytes, tolerating short reads near the start.
fn read_head<R: Read>(reader: &mut R, head: &mut [u8; 4]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Combined on-disk size of the input files, for progress percentages.
/// Fails early if any input is missing.
pub fn total_input_bytes(paths: &[PathBuf]) -> Result<u64> {
    let mut total = 0u64;
    for path in paths {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("cannot stat input file {}", path.display()))?;
        total += meta.len();
    }
    Ok(total)
}
