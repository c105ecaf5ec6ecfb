use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

const BYTES_LOG_STEP: u64 = 256 * 1024 * 1024;
const RECORDS_LOG_STEP: u64 = 1_000_000;

/// Shared run progress, updated from reader and sink threads.
///
/// Byte counts track the compressed input consumed so far against the total
/// size of all input files; record counts track sink output. Both log at
/// fixed intervals so long runs stay observable without flooding the log.
#[derive(Debug)]
pub struct Progress {
    bytes_total: u64,
    bytes_read: AtomicU64,
    records_written: AtomicU64,
}

impl Progress {
    pub fn new(bytes_total: u64) -> Self {
        Self {
            bytes_total,
            bytes_read: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
        }
    }

    /// Account for compressed bytes consumed from an input file.
    pub fn add_bytes(&self, n: u64) {
        if n == 0 {
            return;
        }
        let prev = self.bytes_read.fetch_add(n, Ordering::Relaxed);
        let now = prev + n;
        if prev / BYTES_LOG_STEP != now / BYTES_LOG_STEP {
            if self.bytes_total > 0 {
                info!(
                    "read {} of {} MiB ({}%)",
                    now / (1024 * 1024),
                    self.bytes_total / (1024 * 1024),
                    now * 100 / self.bytes_total
                );
            } else {
                info!("read {} MiB", now / (1024 * 1024));
            }
        }
    }

    /// Account for records persisted by the sink.
    pub fn add_written(&self, n: u64) {
        if n == 0 {
            return;
        }
        let prev = self.records_written.fetch_add(n, Ordering::Relaxed);
        let now = prev + n;
        if prev / RECORDS_LOG_STEP != now / RECORDS_LOG_STEP {
            info!("wrote {} records", (now / RECORDS_LOG_STEP) * RECORDS_LOG_STEP);
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }
}
