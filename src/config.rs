use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::stage::StageSpec;

/// Records buffered between readers and workers before senders block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 65536;

/// Main configuration struct for a run
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub input: InputConfig,
    pub transform: TransformConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
}

/// Input configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub files: Vec<PathBuf>,
    pub chunk_size: usize,
    pub strict_decode: bool,
}

/// Transform configuration
#[derive(Debug, Clone)]
pub struct TransformConfig {
    pub stages: Vec<StageSpec>,
    pub on_error: ErrorStrategy,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub destination: Destination,
    pub first_match_only: bool,
}

/// Performance configuration
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub readers: usize,
    pub workers: usize,
    pub queue_capacity: usize,
}

/// Where the run writes its records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// One file, truncated at the start of the run.
    File(PathBuf),
    /// Per-value append files chosen by a `{field}` template.
    Fanout { template: String },
}

/// Error handling strategy for failing transform stages
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Log the record and keep going.
    #[default]
    Skip,
    /// Stop the whole run on the first stage error.
    Abort,
}

impl JobConfig {
    /// Create configuration from CLI arguments. Stages arrive separately
    /// because their order comes from argument positions.
    pub fn from_cli(cli: &crate::cli::Cli, stages: Vec<StageSpec>) -> Result<Self> {
        let destination = match (&cli.output, &cli.fanout) {
            (Some(path), None) => Destination::File(path.clone()),
            (None, Some(template)) => Destination::Fanout {
                template: template.clone(),
            },
            (Some(_), Some(_)) => {
                bail!("--output and --fanout are mutually exclusive")
            }
            (None, None) => bail!("one of --output or --fanout is required"),
        };

        Ok(Self {
            input: InputConfig {
                files: cli.files.clone(),
                chunk_size: cli.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1),
                strict_decode: cli.strict,
            },
            transform: TransformConfig {
                stages,
                on_error: cli.on_error,
            },
            output: OutputConfig {
                destination,
                first_match_only: cli.first_match,
            },
            performance: PerformanceConfig {
                readers: cli.readers,
                workers: cli.workers,
                queue_capacity: cli.queue_size.max(1),
            },
        })
    }

    /// Get effective worker count with defaults
    pub fn effective_workers(&self) -> usize {
        if self.performance.workers == 0 {
            num_cpus::get()
        } else {
            self.performance.workers
        }
    }

    /// Reader count normalized so 0 and 1 both mean thread-per-file
    pub fn effective_readers(&self) -> usize {
        self.performance.readers.max(1)
    }
}
