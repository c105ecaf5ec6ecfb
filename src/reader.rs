use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::archive::ArchiveReader;
use crate::chunk::{ChunkDecoder, DEFAULT_CHUNK_SIZE};
use crate::platform::CancelToken;
use crate::progress::Progress;
use crate::record::Record;
use crate::stats::ReaderStats;

/// Decoding knobs shared by every reader thread.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub chunk_size: usize,
    pub strict_decode: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            strict_decode: false,
        }
    }
}

/// Stream one archive, parsing each line and sending records downstream.
/// Malformed lines are logged and counted, never fatal. Returns false
/// when the downstream hung up or cancellation hit before the file was
/// fully consumed.
fn read_file(
    path: &Path,
    sender: &Sender<Record>,
    progress: &Arc<Progress>,
    options: &ReadOptions,
    cancel: &CancelToken,
    stats: &mut ReaderStats,
) -> Result<bool> {
    let archive = ArchiveReader::open(path, Arc::clone(progress))?;
    let mut decoder =
        ChunkDecoder::with_chunk_size(archive, options.chunk_size).strict(options.strict_decode);

    // Decode errors already skipped stay counted even when the file is
    // abandoned mid-way.
    let drained = forward_records(&mut decoder, path, sender, cancel, stats);
    stats.decode_errors += decoder.invalid_sequences();

    if drained? {
        stats.files += 1;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn forward_records(
    decoder: &mut ChunkDecoder<ArchiveReader>,
    path: &Path,
    sender: &Sender<Record>,
    cancel: &CancelToken,
    stats: &mut ReaderStats,
) -> Result<bool> {
    for line in decoder {
        if cancel.is_cancelled() {
            return Ok(false);
        }

        let line = line.with_context(|| format!("while decoding {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        match Record::parse(&line) {
            Ok(record) => {
                if sender.send(record).is_err() {
                    // Downstream is gone, nothing left to feed
                    return Ok(false);
                }
                stats.records += 1;
            }
            Err(err) => {
                stats.parse_errors += 1;
                warn!("skipping malformed line in {}: {:#}", path.display(), err);
            }
        }
    }

    Ok(true)
}

/// Reader thread body for a single file.
pub fn reader_thread(
    path: PathBuf,
    sender: Sender<Record>,
    progress: Arc<Progress>,
    options: ReadOptions,
    cancel: CancelToken,
) -> Result<ReaderStats> {
    let mut stats = ReaderStats::default();
    if !cancel.is_cancelled() {
        debug!("reading {}", path.display());
        if let Err(err) = read_file(&path, &sender, &progress, &options, &cancel, &mut stats) {
            cancel.cancel();
            return Err(err);
        }
    }
    Ok(stats)
}

/// Reader thread body for pool mode: pulls paths from a shared queue
/// until it drains.
fn pool_reader_thread(
    reader_id: usize,
    paths: Receiver<PathBuf>,
    sender: Sender<Record>,
    progress: Arc<Progress>,
    options: ReadOptions,
    cancel: CancelToken,
) -> Result<ReaderStats> {
    let mut stats = ReaderStats::default();
    while let Ok(path) = paths.recv() {
        if cancel.is_cancelled() {
            break;
        }
        debug!("reader {} reading {}", reader_id, path.display());
        match read_file(&path, &sender, &progress, &options, &cancel, &mut stats) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                cancel.cancel();
                return Err(err);
            }
        }
    }
    Ok(stats)
}

/// Spawn the ingestion side of the pipeline. With `readers <= 1` each
/// file gets its own thread; otherwise a fixed pool of `readers` threads
/// works through the file list. The passed-in sender is dropped here, so
/// the record channel disconnects exactly when every reader is done.
pub fn spawn_readers(
    paths: &[PathBuf],
    readers: usize,
    sender: Sender<Record>,
    progress: Arc<Progress>,
    options: ReadOptions,
    cancel: CancelToken,
) -> Vec<JoinHandle<Result<ReaderStats>>> {
    let mut handles = Vec::new();

    if readers <= 1 {
        for path in paths {
            let path = path.clone();
            let sender = sender.clone();
            let progress = Arc::clone(&progress);
            let options = options.clone();
            let cancel = cancel.clone();
            handles.push(thread::spawn(move || {
                reader_thread(path, sender, progress, options, cancel)
            }));
        }
    } else {
        let (path_sender, path_receiver) = crossbeam_channel::unbounded();
        for path in paths {
            // Unbounded channel with a live receiver, send cannot fail
            let _ = path_sender.send(path.clone());
        }
        drop(path_sender);

        for reader_id in 0..readers.min(paths.len()) {
            let path_receiver = path_receiver.clone();
            let sender = sender.clone();
            let progress = Arc::clone(&progress);
            let options = options.clone();
            let cancel = cancel.clone();
            handles.push(thread::spawn(move || {
                pool_reader_thread(reader_id, path_receiver, sender, progress, options, cancel)
            }));
        }
    }

    drop(sender);
    handles
}
