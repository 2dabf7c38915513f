use serde::{Deserialize, Serialize};

/// A single named stage in a pipeline-timing record (§3, §4.7). Stages are
/// appended in order and finished in place; no wall-clock skew correction
/// is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub start_ns: u128,
    pub end_ns: Option<u128>,
}

/// An ordered, appendable list of timing stages carried through request
/// metadata (§4.7). Symmetric JSON in and out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineTiming {
    pub stages: Vec<Stage>,
}

impl PipelineTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new stage, started now. Returns its index for `finish`.
    pub fn start_stage(&mut self, name: impl Into<String>, now_ns: u128) -> usize {
        self.stages.push(Stage {
            name: name.into(),
            start_ns: now_ns,
            end_ns: None,
        });
        self.stages.len() - 1
    }

    pub fn finish_stage(&mut self, index: usize, now_ns: u128) {
        if let Some(stage) = self.stages.get_mut(index) {
            stage.end_ns = Some(now_ns);
        }
    }
}
