use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::debug;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::ErrorStrategy;
use crate::pipeline::TransformPipeline;
use crate::platform::CancelToken;
use crate::record::Record;
use crate::stage::{StageOutcome, StageSpec};
use crate::stats::WorkerStats;

/// How long a blocked thread waits on a channel before rechecking the
/// cancel token. Bounds cancellation latency.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Worker thread: applies the transform pipeline to records until the
/// ingest channel disconnects. Disconnection means every reader is done
/// and the buffer is empty, so an idle moment alone never ends the loop.
pub fn worker_thread(
    worker_id: usize,
    receiver: Receiver<Record>,
    sender: Sender<Record>,
    specs: Vec<StageSpec>,
    on_error: ErrorStrategy,
    cancel: CancelToken,
) -> Result<WorkerStats> {
    let pipeline = TransformPipeline::from_specs(&specs);
    let mut stats = WorkerStats::default();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match receiver.recv_timeout(DRAIN_POLL_INTERVAL) {
            Ok(record) => match pipeline.process(record) {
                Ok(StageOutcome::Emit(record)) => {
                    if sender.send(record).is_err() {
                        break;
                    }
                    stats.emitted += 1;
                }
                Ok(StageOutcome::Drop) => stats.dropped += 1,
                Err(err) => match on_error {
                    ErrorStrategy::Skip => {
                        stats.errors += 1;
                        debug!("worker {} skipping record: {:#}", worker_id, err);
                    }
                    ErrorStrategy::Abort => {
                        cancel.cancel();
                        return Err(err);
                    }
                },
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(stats)
}

/// Spawn the transform side of the pipeline. The passed-in channel ends
/// are dropped here, so downstream disconnects exactly when every worker
/// is done.
pub fn spawn_workers(
    count: usize,
    receiver: Receiver<Record>,
    sender: Sender<Record>,
    specs: &[StageSpec],
    on_error: ErrorStrategy,
    cancel: CancelToken,
) -> Vec<JoinHandle<Result<WorkerStats>>> {
    let handles = (0..count.max(1))
        .map(|worker_id| {
            let receiver = receiver.clone();
            let sender = sender.clone();
            let specs = specs.to_vec();
            let cancel = cancel.clone();
            thread::spawn(move || worker_thread(worker_id, receiver, sender, specs, on_error, cancel))
        })
        .collect();

    drop(receiver);
    drop(sender);
    handles
}
