use std::time::Duration;

/// Counters produced by one reader thread.
#[derive(Debug, Default, Clone)]
pub struct ReaderStats {
    /// Records parsed and handed to the transform stage.
    pub records: u64,
    /// Lines that were not valid JSON objects.
    pub parse_errors: u64,
    /// Invalid UTF-8 sequences replaced during decoding.
    pub decode_errors: u64,
    /// Files this reader fully consumed.
    pub files: u64,
}

/// Counters produced by one worker thread.
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Records that passed every stage and went to the sink.
    pub emitted: u64,
    /// Records removed by a filtering stage.
    pub dropped: u64,
    /// Records abandoned because a stage failed.
    pub errors: u64,
}

/// Aggregate counters for a whole run, merged from every thread once the
/// pipeline drains.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub files_processed: u64,
    pub records_read: u64,
    pub parse_errors: u64,
    pub decode_errors: u64,
    pub records_emitted: u64,
    pub records_dropped: u64,
    pub transform_errors: u64,
    pub records_written: u64,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn merge_reader(&mut self, stats: &ReaderStats) {
        self.files_processed += stats.files;
        self.records_read += stats.records;
        self.parse_errors += stats.parse_errors;
        self.decode_errors += stats.decode_errors;
    }

    pub fn merge_worker(&mut self, stats: &WorkerStats) {
        self.records_emitted += stats.emitted;
        self.records_dropped += stats.dropped;
        self.transform_errors += stats.errors;
    }

    pub fn total_errors(&self) -> u64 {
        self.parse_errors + self.decode_errors + self.transform_errors
    }

    pub fn format_report(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Records processed: {} total, {} written, {} dropped",
            self.records_read, self.records_written, self.records_dropped
        ));

        if self.files_processed > 0 {
            output.push_str(&format!(", {} files", self.files_processed));
        }

        if self.total_errors() > 0 {
            output.push_str(&format!(
                ", {} errors ({} parse, {} decode, {} transform)",
                self.total_errors(),
                self.parse_errors,
                self.decode_errors,
                self.transform_errors
            ));
        }

        let elapsed_ms = self.elapsed.as_millis();
        output.push_str(&format!(" in {}ms", elapsed_ms));

        if elapsed_ms > 0 && self.records_read > 0 {
            let records_per_sec = (self.records_read as f64 * 1000.0) / elapsed_ms as f64;
            output.push_str(&format!(" ({:.0} records/s)", records_per_sec));
        }

        output
    }
}
