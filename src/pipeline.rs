use anyhow::{Context, Result};

use crate::record::Record;
use crate::stage::{build_stages, Stage, StageOutcome, StageSpec};

/// Ordered sequence of transform stages. Each worker thread owns one
/// pipeline built from the shared specs, so stages never need interior
/// locking.
pub struct TransformPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl TransformPipeline {
    pub fn from_specs(specs: &[StageSpec]) -> Self {
        Self {
            stages: build_stages(specs),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Run the record through every stage in order. A `Drop` outcome
    /// short-circuits: later stages never observe the record. A stage
    /// error abandons the record and carries the stage name.
    pub fn process(&self, record: Record) -> Result<StageOutcome> {
        let mut current = record;
        for stage in &self.stages {
            match stage
                .apply(current)
                .with_context(|| format!("stage '{}' failed", stage.name()))?
            {
                StageOutcome::Emit(next) => current = next,
                StageOutcome::Drop => return Ok(StageOutcome::Drop),
            }
        }
        Ok(StageOutcome::Emit(current))
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("TransformPipeline")
            .field("stages", &names)
            .finish()
    }
}
