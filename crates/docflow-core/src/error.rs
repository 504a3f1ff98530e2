//! Error taxonomy shared across the engine.
//!
//! Every failure a processor step can produce is normalized to one of these
//! variants so the workflow engine only ever has to ask one question:
//! "is this retryable?"

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing pipeline entry, unknown handler slug, schema violation in
    /// handler output, pipeline index out of bounds.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required prior step did not complete.
    #[error("dependency not satisfied: {0}")]
    DependencyNotSatisfied(String),

    /// Unsupported mime, invalid file, document file missing from storage.
    #[error("input error: {0}")]
    Input(String),

    /// Required credential not resolvable for scope.
    #[error("credential error: {0}")]
    Credential(String),

    /// Network, timeout, rate limit, 5xx from upstream.
    #[error("transient error: {0}")]
    Transient(String),

    /// Workflow observed a cancel request.
    #[error("workflow cancelled")]
    Cancelled,

    /// No tenant bound to the current execution scope.
    #[error("no tenant context bound to current execution scope")]
    NoTenantContext,

    /// `ProcessorRegistry::get` found no handler for the given slug.
    #[error("processor not registered: {0}")]
    ProcessorNotRegistered(String),

    /// Underlying store/transport failure, not part of the domain taxonomy.
    #[error("store error: {0}")]
    Store(String),
}

impl PipelineError {
    /// Whether the workflow engine should retry the step that produced
    /// this error (within the step's retry policy) or abort the workflow
    /// immediately and mark the job failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }

    /// Classify a raw error message from a processor handler into the
    /// taxonomy. Handlers report failures as free-form strings (per the
    /// `ProcessorResult` contract); this is the single place that decides
    /// retryable vs. non-retryable from that string, per spec §4.7's "Error
    /// classification" rule.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let non_retryable = [
            "unsupported",
            "invalid file",
            "not found",
            "schema",
            "missing dependency",
            "missing configuration",
        ];
        if non_retryable.iter().any(|needle| lower.contains(needle)) {
            PipelineError::Input(message)
        } else {
            PipelineError::Transient(message)
        }
    }
}

/// One entry in a job's append-only error log (spec §7 "User-visible
/// behavior").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub attempt: u32,
    pub message: String,
}

impl ErrorLogEntry {
    pub fn new(attempt: u32, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            attempt,
            message: message.into(),
        }
    }
}
