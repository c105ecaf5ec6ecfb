use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::platform::CancelToken;
use crate::progress::Progress;
use crate::record::Record;
use crate::worker::DRAIN_POLL_INTERVAL;

/// Compression level for zstd destinations, matching the archives this
/// tool typically re-emits.
const ZSTD_WRITE_LEVEL: i32 = 3;

/// Where transformed records end up. Implementations own their file
/// handles; the sink thread is the only writer.
pub trait RecordSink: Send {
    fn write(&mut self, record: &Record) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    /// Finish every destination. Writing after close is an error.
    fn close(&mut self) -> Result<()>;
    /// Lines written so far, counting each fan-out copy separately.
    fn records_written(&self) -> u64;
}

/// Output writer with compression chosen by destination extension.
enum DestWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<File>>),
}

impl DestWriter {
    /// Flush and write the trailing compression frame. Consumes the
    /// writer so a finished destination cannot be written again.
    fn finish(self) -> std::io::Result<()> {
        match self {
            DestWriter::Plain(mut writer) => writer.flush(),
            DestWriter::Gzip(encoder) => encoder.finish()?.flush(),
            DestWriter::Zstd(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for DestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            DestWriter::Plain(writer) => writer.write(buf),
            DestWriter::Gzip(writer) => writer.write(buf),
            DestWriter::Zstd(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            DestWriter::Plain(writer) => writer.flush(),
            DestWriter::Gzip(writer) => writer.flush(),
            DestWriter::Zstd(writer) => writer.flush(),
        }
    }
}

/// Open a destination file, creating parent directories as needed.
/// `.gz` and `.zst` extensions select the compression; appending to a
/// compressed destination starts a new member frame, which the matching
/// multi-member decoders read back as one stream.
fn open_destination(path: &Path, append: bool) -> Result<DestWriter> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create directory {}", parent.display()))?;
        }
    }

    let file = if append {
        OpenOptions::new().create(true).append(true).open(path)
    } else {
        File::create(path)
    }
    .with_context(|| format!("cannot open output file {}", path.display()))?;
    let buffered = BufWriter::new(file);

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("gz") => Ok(DestWriter::Gzip(GzEncoder::new(
            buffered,
            Compression::default(),
        ))),
        Some("zst") => {
            let encoder = zstd::stream::write::Encoder::new(buffered, ZSTD_WRITE_LEVEL)
                .with_context(|| format!("cannot init zstd encoder for {}", path.display()))?;
            Ok(DestWriter::Zstd(encoder))
        }
        _ => Ok(DestWriter::Plain(buffered)),
    }
}

/// Single-destination sink. The file is truncated exactly once, when
/// the sink is created, then written top to bottom.
pub struct JsonlSink {
    writer: Option<DestWriter>,
    path: PathBuf,
    written: u64,
}

impl JsonlSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = open_destination(&path, false)?;
        Ok(Self {
            writer: Some(writer),
            path,
            written: 0,
        })
    }
}

impl RecordSink for JsonlSink {
    fn write(&mut self, record: &Record) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("output file {} already closed", self.path.display()))?;
        let line = record.to_json_line()?;
        writeln!(writer, "{}", line)
            .with_context(|| format!("cannot write to {}", self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .with_context(|| format!("cannot flush {}", self.path.display()))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finish()
                .with_context(|| format!("cannot finish {}", self.path.display()))?;
        }
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.written
    }
}

/// Maps a record to the destinations it belongs to. An empty result
/// means the record is written nowhere.
pub type Classifier = dyn Fn(&Record) -> Vec<PathBuf> + Send;

/// Fan-out sink: routes each record to per-destination append files,
/// opening handles lazily on first use. Handles stay open for the whole
/// run and are finished in the order they were opened.
pub struct FanoutSink {
    classify: Box<Classifier>,
    handles: IndexMap<PathBuf, DestWriter>,
    first_match_only: bool,
    written: u64,
    closed: bool,
}

impl FanoutSink {
    pub fn new(classify: Box<Classifier>, first_match_only: bool) -> Self {
        Self {
            classify,
            handles: IndexMap::new(),
            first_match_only,
            written: 0,
            closed: false,
        }
    }

    /// Destinations opened so far, in open order.
    pub fn open_destinations(&self) -> impl Iterator<Item = &Path> {
        self.handles.keys().map(PathBuf::as_path)
    }
}

impl RecordSink for FanoutSink {
    fn write(&mut self, record: &Record) -> Result<()> {
        if self.closed {
            bail!("fan-out sink already closed");
        }

        let mut destinations = (self.classify)(record);
        if self.first_match_only {
            destinations.truncate(1);
        }
        if destinations.is_empty() {
            return Ok(());
        }

        let line = record.to_json_line()?;
        for path in destinations {
            if !self.handles.contains_key(&path) {
                debug!("opening fan-out destination {}", path.display());
                let writer = open_destination(&path, true)?;
                self.handles.insert(path.clone(), writer);
            }
            // Entry was just inserted if missing
            let writer = self
                .handles
                .get_mut(&path)
                .ok_or_else(|| anyhow!("missing handle for {}", path.display()))?;
            writeln!(writer, "{}", line)
                .with_context(|| format!("cannot write to {}", path.display()))?;
            self.written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for (path, writer) in self.handles.iter_mut() {
            writer
                .flush()
                .with_context(|| format!("cannot flush {}", path.display()))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        for (path, writer) in self.handles.drain(..) {
            writer
                .finish()
                .with_context(|| format!("cannot finish {}", path.display()))?;
        }
        Ok(())
    }

    fn records_written(&self) -> u64 {
        self.written
    }
}

/// Build a classifier from a template with one `{field}` placeholder,
/// like `out/{subreddit}.jsonl.gz`. Records missing the field, or whose
/// value cannot be a path component, match nowhere.
pub fn template_classifier(template: &str) -> Result<Box<Classifier>> {
    let open = template
        .find('{')
        .ok_or_else(|| anyhow!("fan-out template '{}' has no {{field}} placeholder", template))?;
    let close = template[open..]
        .find('}')
        .map(|i| open + i)
        .ok_or_else(|| anyhow!("fan-out template '{}' has an unclosed placeholder", template))?;

    let field = template[open + 1..close].to_string();
    if field.is_empty() {
        bail!("fan-out template '{}' has an empty placeholder", template);
    }
    let suffix = &template[close + 1..];
    if suffix.contains('{') || suffix.contains('}') {
        bail!(
            "fan-out template '{}' must have exactly one placeholder",
            template
        );
    }
    let prefix = template[..open].to_string();
    let suffix = suffix.to_string();

    Ok(Box::new(move |record: &Record| {
        match record.get_str(&field) {
            Some(value) if is_path_component(value) => {
                vec![PathBuf::from(format!("{}{}{}", prefix, value, suffix))]
            }
            _ => Vec::new(),
        }
    }))
}

/// A field value can name a file only if it stays inside one directory.
fn is_path_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0'])
}

/// Sink thread: drains the egress channel into the sink. The channel
/// disconnecting means every worker is done, so the loop never ends on
/// an empty buffer alone. On cancellation the backlog is abandoned but
/// open destinations are still flushed and finished.
pub fn sink_thread(
    receiver: Receiver<Record>,
    mut sink: Box<dyn RecordSink>,
    progress: Arc<Progress>,
    cancel: CancelToken,
) -> Result<u64> {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match receiver.recv_timeout(DRAIN_POLL_INTERVAL) {
            Ok(record) => {
                if let Err(err) = sink.write(&record) {
                    cancel.cancel();
                    let _ = sink.close();
                    return Err(err);
                }
                progress.add_written(1);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    sink.flush()?;
    sink.close()?;
    Ok(sink.records_written())
}
