//! The processor handler contract (spec §4.3 "Handler contract").

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docflow_core::id::JobId;
use docflow_core::model::Document;
use docflow_storage::ArtifactStore;
use docflow_vault::CredentialVault;

/// What one processor invocation returns. Matches
/// `ProcessorResult = {success, output, error?, tokens_used?, cost_credits?,
/// artifacts?}` verbatim (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct ProcessorResult {
    pub success: bool,
    pub output: HashMap<String, serde_json::Value>,
    pub error: Option<String>,
    pub tokens_used: Option<u64>,
    pub cost_credits: Option<f64>,
    pub artifacts: Vec<ArtifactDescriptor>,
}

impl ProcessorResult {
    pub fn ok(output: HashMap<String, serde_json::Value>) -> Self {
        Self {
            success: true,
            output,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// `true` when the output carries a pending external transaction id —
    /// the signal for the workflow to suspend rather than advance
    /// (spec §4.6 step 6, §4.7 step 11).
    pub fn awaiting_callback(&self) -> Option<&str> {
        if self.output.get("awaiting_callback").and_then(|v| v.as_bool()) != Some(true) {
            return None;
        }
        self.output.get("transaction_id").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactDescriptor {
    pub collection_name: String,
    pub filename: String,
    pub content: Vec<u8>,
}

/// Everything a handler may read besides `(document, config)`: the outputs
/// of already-completed steps in this job, a scoped credential resolver,
/// and the running job/step coordinates for tracing.
pub struct HandlerContext {
    pub job_id: JobId,
    pub step_index: usize,
    pub previous_outputs: HashMap<String, HashMap<String, serde_json::Value>>,
    pub credentials: Arc<CredentialVault>,
    pub artifacts: Arc<ArtifactStore>,
}

/// A unit of work over a document (spec §4.3). Handlers are pure in the
/// sense that all I/O is either against the supplied `context` or against
/// external services they broker themselves — they never touch the job or
/// execution records directly (the `ActivityRunner` owns that).
#[async_trait]
pub trait ProcessorHandler: Send + Sync {
    /// Mime/size pre-check.
    fn can_process(&self, document: &Document) -> bool;

    async fn process(
        &self,
        document: &Document,
        config: &serde_json::Value,
        context: &HandlerContext,
    ) -> ProcessorResult;

    /// JSON schema the output must satisfy, if any (spec §4.7 step 8).
    fn output_schema(&self) -> Option<serde_json::Value> {
        None
    }

    /// Slugs that must have a `completed` `ExecutionRecord` on this job
    /// before this handler runs (spec §4.6 step 3).
    fn dependency_slugs(&self) -> Vec<String> {
        Vec::new()
    }
}
