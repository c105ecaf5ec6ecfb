// Command-line interface definitions and ordered stage extraction

use anyhow::{bail, Context, Result};
use clap::{ArgMatches, Parser};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{ErrorStrategy, DEFAULT_QUEUE_CAPACITY};
use crate::stage::StageSpec;

#[derive(Parser)]
#[command(name = "arcsift")]
#[command(about = "Stream, filter, and reshape large compressed NDJSON archives")]
#[command(
    long_about = "Stream, filter, and reshape large compressed NDJSON archives\n\nReads zstandard, gzip, or plain newline-delimited JSON and rewrites it through\nan ordered list of transform stages. Stage flags apply in the order they appear\non the command line, so `--keep ... --project ...` filters before it projects.\n\nCOMMON EXAMPLES:\n  arcsift RC_2015-01.zst --keep subreddit=askreddit -o askreddit.jsonl\n  arcsift RC_2015-01.zst --project id,subreddit,body --clean body -o slim.jsonl\n  arcsift RC_2015-01.zst --keep-file subreddit=communities.txt --fanout 'out/{subreddit}.zst'\n\nNeed a quick reference?  arcsift -h"
)]
#[command(author = "Mattia Samory <mattia.samory@gmail.com>")]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Input archives (.zst, .gz, or plain NDJSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Write surviving records to a single file, one sorted-key JSON object per line
    #[arg(short = 'o', long = "output", help_heading = "Output Options")]
    pub output: Option<PathBuf>,

    /// Route each record to a path derived from a field value, e.g. 'out/{subreddit}.zst'
    #[arg(
        long = "fanout",
        value_name = "TEMPLATE",
        help_heading = "Output Options"
    )]
    pub fanout: Option<String>,

    /// Write each record only to the first destination it maps to
    #[arg(long = "first-match", help_heading = "Output Options")]
    pub first_match: bool,

    /// Keep only records whose FIELD matches one of the listed values (repeatable)
    #[arg(
        long = "keep",
        value_name = "FIELD=V1,V2,..",
        help_heading = "Transform Options"
    )]
    pub keep: Vec<String>,

    /// Like --keep, with the value list read from the first column of a file
    #[arg(
        long = "keep-file",
        value_name = "FIELD=PATH",
        help_heading = "Transform Options"
    )]
    pub keep_file: Vec<String>,

    /// Drop every field not in the comma-separated list (repeatable)
    #[arg(
        long = "project",
        value_name = "F1,F2,..",
        help_heading = "Transform Options"
    )]
    pub project: Vec<String>,

    /// Rename a field, overwriting NEW if it already exists (repeatable)
    #[arg(
        long = "rename",
        value_name = "OLD=NEW",
        help_heading = "Transform Options"
    )]
    pub rename: Vec<String>,

    /// Lowercase FIELD, collapse whitespace, and strip control characters (repeatable)
    #[arg(long = "clean", value_name = "FIELD", help_heading = "Transform Options")]
    pub clean: Vec<String>,

    /// What to do when a transform stage fails on a record
    #[arg(
        long = "on-error",
        value_enum,
        default_value = "skip",
        help_heading = "Error Handling"
    )]
    pub on_error: ErrorStrategy,

    /// Fail on invalid UTF-8 instead of replacing bad sequences
    #[arg(long = "strict", help_heading = "Error Handling")]
    pub strict: bool,

    /// Decompression chunk size in bytes
    #[arg(
        long = "chunk-size",
        value_name = "BYTES",
        help_heading = "Performance Options"
    )]
    pub chunk_size: Option<usize>,

    /// Number of reader threads; 1 gives every input file its own thread
    #[arg(
        long = "readers",
        default_value_t = 1,
        help_heading = "Performance Options"
    )]
    pub readers: usize,

    /// Number of transform worker threads (0 = one per CPU core)
    #[arg(
        short = 'w',
        long = "workers",
        default_value_t = 0,
        help_heading = "Performance Options"
    )]
    pub workers: usize,

    /// Capacity of the record queue between readers and workers
    #[arg(
        long = "queue-size",
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        help_heading = "Performance Options"
    )]
    pub queue_size: usize,

    /// Print a processing report to stderr when the run finishes
    #[arg(short = 's', long = "stats")]
    pub stats: bool,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Extract transform stages in the order their flags appeared on the
    /// command line.
    pub fn ordered_stages(&self, matches: &ArgMatches) -> Result<Vec<StageSpec>> {
        let mut stages_with_indices = Vec::new();

        if let Some(keep_indices) = matches.indices_of("keep") {
            let keep_values: Vec<&String> = matches.get_many::<String>("keep").unwrap().collect();
            for (pos, index) in keep_indices.enumerate() {
                let (field, values) = parse_keep_spec(keep_values[pos])?;
                stages_with_indices.push((index, StageSpec::KeepValues { field, values }));
            }
        }

        if let Some(file_indices) = matches.indices_of("keep_file") {
            let file_values: Vec<&String> =
                matches.get_many::<String>("keep_file").unwrap().collect();
            for (pos, index) in file_indices.enumerate() {
                let (field, path) = split_spec(file_values[pos], "--keep-file", "FIELD=PATH")?;
                let values = load_lexicon(Path::new(path))?;
                stages_with_indices.push((
                    index,
                    StageSpec::KeepValues {
                        field: field.to_string(),
                        values,
                    },
                ));
            }
        }

        if let Some(project_indices) = matches.indices_of("project") {
            let project_values: Vec<&String> =
                matches.get_many::<String>("project").unwrap().collect();
            for (pos, index) in project_indices.enumerate() {
                let fields = parse_field_list(project_values[pos])?;
                stages_with_indices.push((index, StageSpec::Project { fields }));
            }
        }

        if let Some(rename_indices) = matches.indices_of("rename") {
            let rename_values: Vec<&String> =
                matches.get_many::<String>("rename").unwrap().collect();
            for (pos, index) in rename_indices.enumerate() {
                let (from, to) = split_spec(rename_values[pos], "--rename", "OLD=NEW")?;
                stages_with_indices.push((
                    index,
                    StageSpec::Rename {
                        from: from.to_string(),
                        to: to.to_string(),
                    },
                ));
            }
        }

        if let Some(clean_indices) = matches.indices_of("clean") {
            let clean_values: Vec<&String> = matches.get_many::<String>("clean").unwrap().collect();
            for (pos, index) in clean_indices.enumerate() {
                let field = clean_values[pos].trim();
                if field.is_empty() {
                    bail!("--clean requires a field name");
                }
                stages_with_indices.push((
                    index,
                    StageSpec::CleanText {
                        field: field.to_string(),
                    },
                ));
            }
        }

        // Sort by original command line position
        stages_with_indices.sort_by_key(|(index, _)| *index);

        Ok(stages_with_indices
            .into_iter()
            .map(|(_, stage)| stage)
            .collect())
    }
}

/// Split a FIELD=REST spec at the first '=', rejecting empty halves.
fn split_spec<'a>(raw: &'a str, flag: &str, shape: &str) -> Result<(&'a str, &'a str)> {
    match raw.split_once('=') {
        Some((field, rest)) if !field.trim().is_empty() && !rest.trim().is_empty() => {
            Ok((field.trim(), rest.trim()))
        }
        _ => bail!("{} expects {}, got '{}'", flag, shape, raw),
    }
}

fn parse_keep_spec(raw: &str) -> Result<(String, HashSet<String>)> {
    let (field, rest) = split_spec(raw, "--keep", "FIELD=V1,V2,..")?;
    let values: HashSet<String> = rest
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        bail!("--keep requires at least one value (e.g. --keep subreddit=askreddit)");
    }
    Ok((field.to_string(), values))
}

fn parse_field_list(raw: &str) -> Result<HashSet<String>> {
    let fields: HashSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    if fields.is_empty() {
        bail!("--project requires at least one field name (e.g. --project id,body)");
    }
    Ok(fields)
}

/// Load an allow-list from a file: the first tab-separated column of every
/// non-blank line. Extra columns carry counts or notes and are ignored.
pub fn load_lexicon(path: &Path) -> Result<HashSet<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read keep-file {}", path.display()))?;

    let mut values = HashSet::new();
    for line in content.lines() {
        let first = line.split('\t').next().unwrap_or("").trim();
        if !first.is_empty() {
            values.insert(first.to_string());
        }
    }

    if values.is_empty() {
        bail!("keep-file {} contains no values", path.display());
    }
    Ok(values)
}
