//! Pipeline configuration and its immutable per-job snapshot (spec §3, §6).

use serde::{Deserialize, Serialize};

/// One configured step in a campaign's pipeline.
///
/// `id` is the processor **slug** (DESIGN NOTES §9 resolves the source's
/// ambiguity between sortable-id/slug/category in favor of slug as the sole
/// stable pipeline reference). A `None` id marks a placeholder step that is
/// skipped rather than dispatched (spec §4.6 step 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// An ordered sequence of processor steps. `Campaign.pipeline` is one of
/// these; `Job.pipeline` is a deep copy of it taken at job-creation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub processors: Vec<PipelineStep>,
}

impl PipelineSnapshot {
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&PipelineStep> {
        self.processors.get(index)
    }

    /// Slugs of every non-skipped step, in pipeline order.
    pub fn slugs(&self) -> Vec<&str> {
        self.processors
            .iter()
            .filter_map(|p| p.id.as_deref())
            .collect()
    }
}
