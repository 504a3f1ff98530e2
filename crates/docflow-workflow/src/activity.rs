//! Executes exactly one processor step (spec §4.7).

use std::collections::HashMap;
use std::sync::Arc;

use docflow_core::error::PipelineError;
use docflow_core::model::{Document, ExecutionRecord, Job, KycCallbackMapping, UsageEvent};
use docflow_core::store::CentralStore;
use docflow_registry::{HandlerContext, ProcessorRegistry, RegistryError};
use docflow_storage::ArtifactStore;
use docflow_tenant::TenantContext;
use docflow_vault::CredentialVault;
use tracing::{info, warn};

use crate::event_bus::{EngineEvent, EventBus};

/// What one dispatched step resolved to. `WorkflowEngine` branches on this
/// to decide whether to advance, suspend, or treat the job as done with one
/// fewer step than `job.pipeline.len()`.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// `step.id` was null (spec §4.7 step 3 / §4.6 step 1).
    Skipped,
    Completed {
        output: HashMap<String, serde_json::Value>,
        /// `Some(transaction_id)` when the handler's output asked the
        /// workflow to suspend on an external callback (spec §4.6 step 6).
        awaiting_callback: Option<String>,
    },
}

/// Runs the twelve-step protocol of spec §4.7. Holds everything a step
/// needs except the tenant's own store, which it rehydrates per call from
/// [`TenantContext`] (protocol step 1) rather than caching a handle —
/// the same ambient-binding discipline `docflow_tenant` itself documents.
pub struct ActivityRunner {
    central_store: Arc<dyn CentralStore>,
    registry: Arc<ProcessorRegistry>,
    vault: Arc<CredentialVault>,
    artifacts: Arc<ArtifactStore>,
    events: Arc<dyn EventBus>,
}

impl ActivityRunner {
    pub fn new(
        central_store: Arc<dyn CentralStore>,
        registry: Arc<ProcessorRegistry>,
        vault: Arc<CredentialVault>,
        artifacts: Arc<ArtifactStore>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            central_store,
            registry,
            vault,
            artifacts,
            events,
        }
    }

    pub async fn run_step(
        &self,
        job: &Job,
        document: &mut Document,
        step_index: usize,
        previous_outputs: &HashMap<String, HashMap<String, serde_json::Value>>,
    ) -> Result<StepOutcome, PipelineError> {
        // Step 1.
        let tenant_store = TenantContext::current().map_err(|_| PipelineError::NoTenantContext)?;
        let tenant_id = tenant_store.tenant_id();

        // Steps 2-3.
        let step = job
            .pipeline
            .step(step_index)
            .ok_or_else(|| PipelineError::Configuration(format!("pipeline has no step at index {step_index}")))?;
        let Some(slug) = step.id.clone() else {
            info!(%tenant_id, job_id = %job.id, step_index, "step has no processor id, skipping");
            let mut skip_record = ExecutionRecord::new(
                job.id,
                docflow_core::id::ProcessorId::new(),
                step_index,
                "",
                step.config.clone(),
            );
            skip_record.skip().map_err(|e| PipelineError::Configuration(e.to_string()))?;
            tenant_store
                .put_execution_record(skip_record)
                .await
                .map_err(|e| PipelineError::Store(e.to_string()))?;
            return Ok(StepOutcome::Skipped);
        };
        let config = step.config.clone();

        // Step 4.
        let processor = tenant_store
            .get_processor_by_slug(&slug)
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?
            .ok_or_else(|| PipelineError::Configuration(format!("processor catalog entry not found: {slug}")))?;

        // Step 5.
        let handler = self.registry.get(&slug, tenant_store.as_ref()).await.map_err(|err| match err {
            RegistryError::Store(e) => PipelineError::Store(e.to_string()),
            other => PipelineError::Configuration(other.to_string()),
        })?;

        // Dependency check (spec §4.6 step 3, folded into this protocol
        // ahead of dispatch since both need the same execution-record scan).
        for dependency in handler.dependency_slugs() {
            let records = tenant_store
                .execution_records_for_job(job.id)
                .await
                .map_err(|e| PipelineError::Store(e.to_string()))?;
            let satisfied = records
                .iter()
                .any(|r| r.slug == dependency && r.state == docflow_core::state::ExecutionState::Completed);
            if !satisfied {
                return Err(PipelineError::DependencyNotSatisfied(format!(
                    "step '{slug}' requires completed '{dependency}'"
                )));
            }
        }

        // Step 6.
        let mut record = ExecutionRecord::new(job.id, processor.id, step_index, &slug, config.clone());
        record.start().map_err(|e| PipelineError::Configuration(e.to_string()))?;
        tenant_store
            .put_execution_record(record.clone())
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        // Step 7.
        let context = HandlerContext {
            job_id: job.id,
            step_index,
            previous_outputs: previous_outputs.clone(),
            credentials: self.vault.clone(),
            artifacts: self.artifacts.clone(),
        };
        let result = handler.process(document, &config, &context).await;

        if !result.success {
            // Step 10.
            let error = result
                .error
                .unwrap_or_else(|| "processor reported failure with no message".to_string());
            record.fail(error.clone()).map_err(|e| PipelineError::Configuration(e.to_string()))?;
            tenant_store
                .put_execution_record(record.clone())
                .await
                .map_err(|e| PipelineError::Store(e.to_string()))?;
            warn!(%tenant_id, job_id = %job.id, slug = %slug, error = %error, "step failed");
            self.events.publish(EngineEvent::ExecutionFailed {
                job_id: job.id,
                execution_id: record.id,
                slug: slug.clone(),
                error: error.clone(),
            });
            return Err(PipelineError::classify(error));
        }

        // Step 8.
        if let Some(schema) = handler.output_schema() {
            if let Err(violation) = validate_output_schema(&schema, &result.output) {
                let message = format!("schema violation on '{slug}': {violation}");
                record.fail(message.clone()).map_err(|e| PipelineError::Configuration(e.to_string()))?;
                tenant_store
                    .put_execution_record(record.clone())
                    .await
                    .map_err(|e| PipelineError::Store(e.to_string()))?;
                self.events.publish(EngineEvent::ExecutionFailed {
                    job_id: job.id,
                    execution_id: record.id,
                    slug: slug.clone(),
                    error: message.clone(),
                });
                return Err(PipelineError::Configuration(message));
            }
        }

        // Step 9.
        record
            .complete(result.output.clone(), result.tokens_used, result.cost_credits)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        tenant_store
            .put_execution_record(record.clone())
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        for artifact in &result.artifacts {
            self.artifacts
                .put(record.id, &artifact.collection_name, &artifact.filename, &artifact.content)
                .await
                .map_err(|e| PipelineError::Store(e.to_string()))?;
        }

        if result.tokens_used.is_some() || result.cost_credits.is_some() {
            let usage = UsageEvent::new(
                job.campaign_id,
                document.id,
                job.id,
                format!("processor.{slug}"),
                result.tokens_used.unwrap_or(0) as f64,
                result.cost_credits.unwrap_or(0.0),
            );
            if let Err(err) = tenant_store.append_usage_event(usage).await {
                warn!(%tenant_id, job_id = %job.id, slug = %slug, error = %err, "failed to append usage event");
            }
        }

        merge_well_known_outputs(document, &slug, &result.output);
        tenant_store
            .put_document(document.clone())
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        // Step 11.
        let awaiting_callback = result.awaiting_callback().map(str::to_string);
        if let Some(transaction_id) = &awaiting_callback {
            let mapping = KycCallbackMapping::new(
                transaction_id.clone(),
                tenant_id,
                document.id,
                record.id,
                job.id,
                job.campaign_id,
                serde_json::json!({ "slug": slug }),
            );
            self.central_store
                .register_mapping(mapping)
                .await
                .map_err(|e| PipelineError::Store(e.to_string()))?;
        }

        // Step 12.
        info!(%tenant_id, job_id = %job.id, slug = %slug, "step completed");
        self.events.publish(EngineEvent::ExecutionCompleted {
            job_id: job.id,
            execution_id: record.id,
            slug: slug.clone(),
        });

        Ok(StepOutcome::Completed {
            output: result.output,
            awaiting_callback,
        })
    }
}

/// Minimal `{"required": [...]}` checker (spec §4.7 step 8). The spec never
/// asks for full JSON Schema (types, nesting, formats) — only top-level key
/// presence — so a hand-rolled check covers it without pulling in a general
/// schema validator for one clause.
fn validate_output_schema(schema: &serde_json::Value, output: &HashMap<String, serde_json::Value>) -> Result<(), String> {
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return Ok(());
    };
    for key in required {
        let Some(key) = key.as_str() else { continue };
        if !output.contains_key(key) {
            return Err(format!("missing required output key '{key}'"));
        }
    }
    Ok(())
}

/// Folds recognized output keys into `Document.metadata`, plus the whole
/// output map keyed by processor slug (spec §4.7 step 9).
fn merge_well_known_outputs(document: &mut Document, slug: &str, output: &HashMap<String, serde_json::Value>) {
    document.merge_metadata(slug, serde_json::to_value(output).unwrap_or(serde_json::Value::Null));
    for key in ["text", "category", "extracted_fields"] {
        if let Some(value) = output.get(key) {
            document.merge_metadata(key, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::NullEventBus;
    use async_trait::async_trait;
    use docflow_core::id::TenantId;
    use docflow_core::model::{PipelineStep, ProcessorCatalogEntry};
    use docflow_core::store::{InMemoryCentralStore, InMemoryTenantStore};
    use docflow_registry::handler::{ProcessorHandler, ProcessorResult};
    use docflow_storage::{ArtifactStore, InMemoryBlobStore};
    use docflow_vault::CredentialCipher;

    struct EchoHandler;

    #[async_trait]
    impl ProcessorHandler for EchoHandler {
        fn can_process(&self, _document: &Document) -> bool {
            true
        }

        async fn process(
            &self,
            _document: &Document,
            _config: &serde_json::Value,
            _context: &HandlerContext,
        ) -> ProcessorResult {
            let mut output = HashMap::new();
            output.insert("text".to_string(), serde_json::json!("hello"));
            ProcessorResult::ok(output)
        }
    }

    struct SchemaEnforcingHandler;

    #[async_trait]
    impl ProcessorHandler for SchemaEnforcingHandler {
        fn can_process(&self, _document: &Document) -> bool {
            true
        }

        async fn process(
            &self,
            _document: &Document,
            _config: &serde_json::Value,
            _context: &HandlerContext,
        ) -> ProcessorResult {
            ProcessorResult::ok(HashMap::new())
        }

        fn output_schema(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({ "required": ["text"] }))
        }
    }

    async fn new_runner(
        tenant_store: Arc<dyn docflow_core::store::TenantStore>,
        registry: ProcessorRegistry,
    ) -> (ActivityRunner, Job) {
        let central_store = InMemoryCentralStore::new();
        let cipher = Arc::new(CredentialCipher::new([7u8; 32]));
        let vault = Arc::new(CredentialVault::new(tenant_store.clone(), cipher));
        let artifacts = Arc::new(ArtifactStore::new(Arc::new(InMemoryBlobStore::new()), tenant_store.clone()));

        let processor = ProcessorCatalogEntry::new(tenant_store.tenant_id(), "ocr", "ocr::echo", "ocr");
        tenant_store.put_processor(processor).await.unwrap();

        let mut job = Job::new(
            docflow_core::id::CampaignId::new(),
            docflow_core::id::DocumentId::new(),
            docflow_core::model::PipelineSnapshot {
                processors: vec![PipelineStep {
                    id: Some("ocr".into()),
                    kind: "ocr".into(),
                    config: serde_json::json!({}),
                }],
            },
        );
        job.start().unwrap();

        let runner = ActivityRunner::new(central_store, Arc::new(registry), vault, artifacts, Arc::new(NullEventBus));
        (runner, job)
    }

    #[tokio::test]
    async fn completed_step_merges_output_into_document_metadata() {
        let tenant_store: Arc<dyn docflow_core::store::TenantStore> = InMemoryTenantStore::new(TenantId::new());
        let mut registry = ProcessorRegistry::new();
        registry.register("ocr", Arc::new(EchoHandler)).await;
        let (runner, job) = new_runner(tenant_store.clone(), registry).await;

        let mut document = Document::new(job.campaign_id, "f.png", "image/png", 1, "p", "d", "h");
        let outcome = TenantContext::run(tenant_store, runner.run_step(&job, &mut document, 0, &HashMap::new())).await.unwrap();

        assert!(matches!(outcome, StepOutcome::Completed { .. }));
        assert_eq!(document.metadata.get("text").unwrap(), &serde_json::json!("hello"));
    }

    struct MeteredHandler;

    #[async_trait]
    impl ProcessorHandler for MeteredHandler {
        fn can_process(&self, _document: &Document) -> bool {
            true
        }

        async fn process(
            &self,
            _document: &Document,
            _config: &serde_json::Value,
            _context: &HandlerContext,
        ) -> ProcessorResult {
            let mut output = HashMap::new();
            output.insert("text".to_string(), serde_json::json!("metered"));
            let mut result = ProcessorResult::ok(output);
            result.tokens_used = Some(128);
            result.cost_credits = Some(0.04);
            result
        }
    }

    #[tokio::test]
    async fn completed_step_with_tokens_appends_a_usage_event() {
        let concrete_store = InMemoryTenantStore::new(TenantId::new());
        let tenant_store: Arc<dyn docflow_core::store::TenantStore> = concrete_store.clone();
        let mut registry = ProcessorRegistry::new();
        registry.register("ocr", Arc::new(MeteredHandler)).await;
        let (runner, job) = new_runner(tenant_store.clone(), registry).await;

        let mut document = Document::new(job.campaign_id, "f.png", "image/png", 1, "p", "d", "h");
        TenantContext::run(tenant_store, runner.run_step(&job, &mut document, 0, &HashMap::new())).await.unwrap();

        let events = concrete_store.usage_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].units, 128.0);
        assert_eq!(events[0].cost_credits, 0.04);
        assert_eq!(events[0].job_id, job.id);
    }

    #[tokio::test]
    async fn schema_violation_is_a_non_retryable_configuration_error() {
        let tenant_store: Arc<dyn docflow_core::store::TenantStore> = InMemoryTenantStore::new(TenantId::new());
        let mut registry = ProcessorRegistry::new();
        registry.register("ocr", Arc::new(SchemaEnforcingHandler)).await;
        let (runner, job) = new_runner(tenant_store.clone(), registry).await;

        let mut document = Document::new(job.campaign_id, "f.png", "image/png", 1, "p", "d", "h");
        let err = TenantContext::run(tenant_store, runner.run_step(&job, &mut document, 0, &HashMap::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn missing_processor_catalog_entry_is_non_retryable() {
        let tenant_store: Arc<dyn docflow_core::store::TenantStore> = InMemoryTenantStore::new(TenantId::new());
        let registry = ProcessorRegistry::new();
        let central_store = InMemoryCentralStore::new();
        let cipher = Arc::new(CredentialCipher::new([9u8; 32]));
        let vault = Arc::new(CredentialVault::new(tenant_store.clone(), cipher));
        let artifacts = Arc::new(ArtifactStore::new(Arc::new(InMemoryBlobStore::new()), tenant_store.clone()));
        let runner = ActivityRunner::new(central_store, Arc::new(registry), vault, artifacts, Arc::new(NullEventBus));

        let job = Job::new(
            docflow_core::id::CampaignId::new(),
            docflow_core::id::DocumentId::new(),
            docflow_core::model::PipelineSnapshot {
                processors: vec![PipelineStep {
                    id: Some("missing".into()),
                    kind: "missing".into(),
                    config: serde_json::json!({}),
                }],
            },
        );
        let mut document = Document::new(job.campaign_id, "f.png", "image/png", 1, "p", "d", "h");

        let err = TenantContext::run(tenant_store, runner.run_step(&job, &mut document, 0, &HashMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn null_step_id_is_skipped() {
        let tenant_store: Arc<dyn docflow_core::store::TenantStore> = InMemoryTenantStore::new(TenantId::new());
        let registry = ProcessorRegistry::new();
        let central_store = InMemoryCentralStore::new();
        let cipher = Arc::new(CredentialCipher::new([11u8; 32]));
        let vault = Arc::new(CredentialVault::new(tenant_store.clone(), cipher));
        let artifacts = Arc::new(ArtifactStore::new(Arc::new(InMemoryBlobStore::new()), tenant_store.clone()));
        let runner = ActivityRunner::new(central_store, Arc::new(registry), vault, artifacts, Arc::new(NullEventBus));

        let job = Job::new(
            docflow_core::id::CampaignId::new(),
            docflow_core::id::DocumentId::new(),
            docflow_core::model::PipelineSnapshot {
                processors: vec![PipelineStep {
                    id: None,
                    kind: "placeholder".into(),
                    config: serde_json::json!({}),
                }],
            },
        );
        let mut document = Document::new(job.campaign_id, "f.png", "image/png", 1, "p", "d", "h");

        let outcome = TenantContext::run(
            tenant_store.clone(),
            runner.run_step(&job, &mut document, 0, &HashMap::new()),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped));

        let records = tenant_store.execution_records_for_job(job.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, docflow_core::state::ExecutionState::Skipped);
    }
}
