// Core library for the arcsift archive processing tool

pub use chunk::{ChunkDecoder, DEFAULT_CHUNK_SIZE};
pub use config::{Destination, ErrorStrategy, JobConfig, DEFAULT_QUEUE_CAPACITY};
pub use platform::{CancelToken, ExitCode, SignalHandler};
pub use record::Record;
pub use runner::{run_job, run_job_with_sink, RunReport};
pub use sink::{template_classifier, FanoutSink, JsonlSink, RecordSink};
pub use stage::{Stage, StageOutcome, StageSpec};
pub use stats::RunStats;

pub mod archive;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod reader;
pub mod record;
pub mod runner;
pub mod sink;
pub mod stage;
pub mod stats;
pub mod worker;
