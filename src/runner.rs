use anyhow::{anyhow, Result};
use crossbeam_channel::bounded;
use log::info;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::archive::total_input_bytes;
use crate::config::{Destination, JobConfig};
use crate::platform::CancelToken;
use crate::progress::Progress;
use crate::reader::{spawn_readers, ReadOptions};
use crate::record::Record;
use crate::sink::{sink_thread, template_classifier, FanoutSink, JsonlSink, RecordSink};
use crate::stats::RunStats;
use crate::worker::spawn_workers;

/// Outcome of a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStats,
    /// False when cancellation cut the run short of draining its input.
    pub completed: bool,
}

/// Build the sink the configuration asks for.
fn build_sink(config: &JobConfig) -> Result<Box<dyn RecordSink>> {
    match &config.output.destination {
        Destination::File(path) => Ok(Box::new(JsonlSink::create(path)?)),
        Destination::Fanout { template } => {
            let classify = template_classifier(template)?;
            Ok(Box::new(FanoutSink::new(
                classify,
                config.output.first_match_only,
            )))
        }
    }
}

/// Run a whole job: readers feed workers over a bounded channel, workers
/// feed the single sink thread over a second channel, and the groups
/// wind down in that order as the channels disconnect.
pub fn run_job(config: &JobConfig, cancel: CancelToken) -> Result<RunReport> {
    // Stat the inputs first: a bad input path must not truncate the
    // output destination.
    total_input_bytes(&config.input.files)?;
    let sink = build_sink(config)?;
    run_job_with_sink(config, sink, cancel)
}

/// Same as [`run_job`] with a caller-supplied sink, for embedding.
pub fn run_job_with_sink(
    config: &JobConfig,
    sink: Box<dyn RecordSink>,
    cancel: CancelToken,
) -> Result<RunReport> {
    let started = Instant::now();
    let total_bytes = total_input_bytes(&config.input.files)?;
    let progress = Arc::new(Progress::new(total_bytes));

    info!(
        "processing {} files ({} MiB) with {} reader threads and {} workers",
        config.input.files.len(),
        total_bytes / (1024 * 1024),
        if config.effective_readers() <= 1 {
            config.input.files.len()
        } else {
            config.effective_readers().min(config.input.files.len())
        },
        config.effective_workers(),
    );

    // Bounded ingest applies backpressure to the readers; egress stays
    // unbounded so workers never block behind the sink.
    let (ingest_sender, ingest_receiver) = bounded::<Record>(config.performance.queue_capacity);
    let (egress_sender, egress_receiver) = crossbeam_channel::unbounded::<Record>();

    let read_options = ReadOptions {
        chunk_size: config.input.chunk_size,
        strict_decode: config.input.strict_decode,
    };

    let reader_handles = spawn_readers(
        &config.input.files,
        config.effective_readers(),
        ingest_sender,
        Arc::clone(&progress),
        read_options,
        cancel.clone(),
    );

    let worker_handles = spawn_workers(
        config.effective_workers(),
        ingest_receiver,
        egress_sender,
        &config.transform.stages,
        config.transform.on_error,
        cancel.clone(),
    );

    let sink_progress = Arc::clone(&progress);
    let sink_cancel = cancel.clone();
    let sink_handle =
        thread::spawn(move || sink_thread(egress_receiver, sink, sink_progress, sink_cancel));

    // Join in pipeline order, collecting every result before failing so
    // no thread is left running behind an early return.
    let mut stats = RunStats::default();
    let mut first_error: Option<anyhow::Error> = None;

    for handle in reader_handles {
        match join_thread(handle, "reader") {
            Ok(reader_stats) => stats.merge_reader(&reader_stats),
            Err(err) => remember_error(&mut first_error, err, &cancel),
        }
    }
    for handle in worker_handles {
        match join_thread(handle, "worker") {
            Ok(worker_stats) => stats.merge_worker(&worker_stats),
            Err(err) => remember_error(&mut first_error, err, &cancel),
        }
    }
    match join_thread(sink_handle, "sink") {
        Ok(written) => stats.records_written = written,
        Err(err) => remember_error(&mut first_error, err, &cancel),
    }

    stats.elapsed = started.elapsed();

    if let Some(err) = first_error {
        return Err(err);
    }

    info!("{}", stats.format_report());

    Ok(RunReport {
        stats,
        completed: !cancel.is_cancelled(),
    })
}

fn join_thread<T>(handle: JoinHandle<Result<T>>, role: &str) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{} thread panicked", role)),
    }
}

fn remember_error(
    first_error: &mut Option<anyhow::Error>,
    err: anyhow::Error,
    cancel: &CancelToken,
) {
    cancel.cancel();
    if first_error.is_none() {
        *first_error = Some(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ErrorStrategy, InputConfig, OutputConfig, PerformanceConfig, TransformConfig,
    };
    use crate::stage::StageSpec;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_input(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn job(files: Vec<PathBuf>, stages: Vec<StageSpec>, destination: Destination) -> JobConfig {
        JobConfig {
            input: InputConfig {
                files,
                chunk_size: 64,
                strict_decode: false,
            },
            transform: TransformConfig {
                stages,
                on_error: ErrorStrategy::Skip,
            },
            output: OutputConfig {
                destination,
                first_match_only: false,
            },
            performance: PerformanceConfig {
                readers: 1,
                workers: 2,
                queue_capacity: 16,
            },
        }
    }

    #[test]
    fn test_run_job_filters_and_projects() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            &dir,
            "in.jsonl",
            "{\"id\":\"1\",\"subreddit\":\"a\",\"body\":\"hi\"}\n{\"id\":\"2\",\"subreddit\":\"b\",\"body\":\"no\"}\n",
        );
        let output = dir.path().join("out.jsonl");

        let stages = vec![
            StageSpec::KeepValues {
                field: "subreddit".to_string(),
                values: ["a".to_string()].into_iter().collect(),
            },
            StageSpec::Project {
                fields: ["id", "subreddit", "body"]
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            },
        ];
        let config = job(vec![input], stages, Destination::File(output.clone()));

        let report = run_job(&config, CancelToken::new()).unwrap();
        assert!(report.completed);
        assert_eq!(report.stats.records_read, 2);
        assert_eq!(report.stats.records_emitted, 1);
        assert_eq!(report.stats.records_dropped, 1);
        assert_eq!(report.stats.records_written, 1);

        let content = std::fs::read_to_string(&output).unwrap();
        assert_eq!(content, "{\"body\":\"hi\",\"id\":\"1\",\"subreddit\":\"a\"}\n");
    }

    #[test]
    fn test_run_job_with_tiny_queue_loses_nothing() {
        let dir = TempDir::new().unwrap();
        let mut content = String::new();
        for i in 0..200 {
            content.push_str(&format!("{{\"i\":{}}}\n", i));
        }
        let input = write_input(&dir, "in.jsonl", &content);
        let output = dir.path().join("out.jsonl");

        let mut config = job(vec![input], Vec::new(), Destination::File(output.clone()));
        config.performance.queue_capacity = 1;

        let report = run_job(&config, CancelToken::new()).unwrap();
        assert_eq!(report.stats.records_read, 200);
        assert_eq!(report.stats.records_written, 200);
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 200);
    }

    #[test]
    fn test_run_job_abort_policy_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "in.jsonl", "{\"id\":\"1\"}\n");
        let output = dir.path().join("out.jsonl");

        let mut config = job(
            vec![input],
            vec![StageSpec::CleanText {
                field: "body".to_string(),
            }],
            Destination::File(output),
        );
        config.transform.on_error = ErrorStrategy::Abort;

        let result = run_job(&config, CancelToken::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_run_job_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, "in.jsonl", "{\"id\":\"1\"}\n");
        let output = dir.path().join("out.jsonl");

        let config = job(vec![input], Vec::new(), Destination::File(output.clone()));
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = run_job(&config, cancel).unwrap();
        assert!(!report.completed);
        assert_eq!(report.stats.records_written, 0);
        // The sink still produced a valid (empty) output file
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
    }

    #[test]
    fn test_run_job_missing_input_fails_before_spawning() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.jsonl");
        let config = job(
            vec![PathBuf::from("/definitely/not/here.zst")],
            Vec::new(),
            Destination::File(output),
        );
        assert!(run_job(&config, CancelToken::new()).is_err());
    }

    #[test]
    fn test_missing_input_leaves_existing_output_untouched() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.jsonl");
        std::fs::write(&output, "{\"id\":\"previous\"}\n").unwrap();

        let config = job(
            vec![PathBuf::from("/definitely/not/here.zst")],
            Vec::new(),
            Destination::File(output.clone()),
        );
        assert!(run_job(&config, CancelToken::new()).is_err());
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "{\"id\":\"previous\"}\n"
        );
    }
}
