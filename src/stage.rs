use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::record::Record;

/// What a stage did with the record it was handed.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Pass the (possibly rewritten) record to the next stage.
    Emit(Record),
    /// Remove the record from the run. Later stages never see it.
    Drop,
}

/// One step of the transform pipeline. Stages own no record state; a
/// worker thread applies them to one record at a time.
pub trait Stage: Send {
    fn name(&self) -> &str;
    fn apply(&self, record: Record) -> Result<StageOutcome>;
}

pub type CustomFn = dyn Fn(Record) -> Result<StageOutcome> + Send + Sync;

/// Declarative stage description. Specs are built once from the CLI (or
/// by an embedding program), cloned into every worker, and turned into
/// runnable stages through [`build_stage`].
#[derive(Clone)]
pub enum StageSpec {
    /// Keep records whose `field` is a string contained in `values`,
    /// drop everything else including records missing the field.
    KeepValues {
        field: String,
        values: HashSet<String>,
    },
    /// Keep only the listed fields. Records keep their identity even
    /// when projection empties them.
    Project { fields: HashSet<String> },
    /// Move the value under `from` to `to`. Records without `from` pass
    /// through unchanged.
    Rename { from: String, to: String },
    /// Lowercase `field`, collapse whitespace runs, strip control
    /// characters. Fails on records where `field` is missing or not a
    /// string.
    CleanText { field: String },
    /// Caller-supplied stage for embedding as a library.
    Custom { name: String, func: Arc<CustomFn> },
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageSpec::KeepValues { field, values } => f
                .debug_struct("KeepValues")
                .field("field", field)
                .field("values", values)
                .finish(),
            StageSpec::Project { fields } => {
                f.debug_struct("Project").field("fields", fields).finish()
            }
            StageSpec::Rename { from, to } => f
                .debug_struct("Rename")
                .field("from", from)
                .field("to", to)
                .finish(),
            StageSpec::CleanText { field } => {
                f.debug_struct("CleanText").field("field", field).finish()
            }
            StageSpec::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

struct KeepValuesStage {
    field: String,
    values: HashSet<String>,
}

impl Stage for KeepValuesStage {
    fn name(&self) -> &str {
        "keep-values"
    }

    fn apply(&self, record: Record) -> Result<StageOutcome> {
        match record.get_str(&self.field) {
            Some(value) if self.values.contains(value) => Ok(StageOutcome::Emit(record)),
            _ => Ok(StageOutcome::Drop),
        }
    }
}

struct ProjectStage {
    fields: HashSet<String>,
}

impl Stage for ProjectStage {
    fn name(&self) -> &str {
        "project"
    }

    fn apply(&self, mut record: Record) -> Result<StageOutcome> {
        record.retain(|key| self.fields.contains(key));
        Ok(StageOutcome::Emit(record))
    }
}

struct RenameStage {
    from: String,
    to: String,
}

impl Stage for RenameStage {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, mut record: Record) -> Result<StageOutcome> {
        if let Some(value) = record.remove(&self.from) {
            record.insert(self.to.clone(), value);
        }
        Ok(StageOutcome::Emit(record))
    }
}

struct CleanTextStage {
    field: String,
}

impl Stage for CleanTextStage {
    fn name(&self) -> &str {
        "clean-text"
    }

    fn apply(&self, mut record: Record) -> Result<StageOutcome> {
        let cleaned = match record.get_str(&self.field) {
            Some(text) => clean_text(text),
            None => {
                return Err(anyhow!(
                    "field '{}' is missing or not a string",
                    self.field
                ))
            }
        };
        record.insert(self.field.clone(), cleaned.into());
        Ok(StageOutcome::Emit(record))
    }
}

struct CustomStage {
    name: String,
    func: Arc<CustomFn>,
}

impl Stage for CustomStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, record: Record) -> Result<StageOutcome> {
        (self.func)(record)
    }
}

/// Lowercase, strip control characters, and collapse whitespace runs to
/// a single space. Leading and trailing whitespace is removed.
fn clean_text(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.to_lowercase().chars() {
        if ch.is_whitespace() {
            pending_space = !output.is_empty();
        } else if !ch.is_control() {
            if pending_space {
                output.push(' ');
                pending_space = false;
            }
            output.push(ch);
        }
    }
    output
}

/// Turn one spec into a runnable stage.
pub fn build_stage(spec: &StageSpec) -> Box<dyn Stage> {
    match spec {
        StageSpec::KeepValues { field, values } => Box::new(KeepValuesStage {
            field: field.clone(),
            values: values.clone(),
        }),
        StageSpec::Project { fields } => Box::new(ProjectStage {
            fields: fields.clone(),
        }),
        StageSpec::Rename { from, to } => Box::new(RenameStage {
            from: from.clone(),
            to: to.clone(),
        }),
        StageSpec::CleanText { field } => Box::new(CleanTextStage {
            field: field.clone(),
        }),
        StageSpec::Custom { name, func } => Box::new(CustomStage {
            name: name.clone(),
            func: Arc::clone(func),
        }),
    }
}

/// Build all stages, preserving the order the specs were given in.
pub fn build_stages(specs: &[StageSpec]) -> Vec<Box<dyn Stage>> {
    specs.iter().map(build_stage).collect()
}
