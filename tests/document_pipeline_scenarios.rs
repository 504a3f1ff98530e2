//! End-to-end scenarios wiring every crate together: ingest a document,
//! run it through `JobManager` + `WorkflowEngine` + `ActivityRunner`
//! against in-memory stores, and assert on the document/job state the
//! same way `tests/kyc_full_lifecycle.rs`-style suites assert on a real
//! deployment's outcome. No live database is needed — these run as plain
//! `tokio::test`s.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docflow_core::id::TenantId;
use docflow_core::model::{Campaign, Document, PipelineStep, ProcessorCatalogEntry};
use docflow_core::state::{DocumentState, JobState};
use docflow_core::store::{CentralStore, InMemoryCentralStore, InMemoryTenantStore, TenantStore};
use docflow_registry::{HandlerContext, ProcessorHandler, ProcessorRegistry, ProcessorResult};
use docflow_storage::{ArtifactStore, InMemoryBlobStore};
use docflow_tenant::TenantContext;
use docflow_vault::{CredentialCipher, CredentialVault};
use docflow_workflow::{ActivityRunner, InMemoryWorkflowStore, JobManager, NullEventBus, SignalBox, WorkflowEngine};

/// Everything one scenario needs, built fresh per test so state never
/// leaks between them.
struct Harness {
    central_store: Arc<dyn CentralStore>,
    tenant_store: Arc<dyn TenantStore>,
    signals: Arc<SignalBox>,
    engine: WorkflowEngine,
}

fn new_campaign(tenant_id: TenantId, slug: &str, steps: &[&str]) -> Campaign {
    let mut campaign = Campaign::new(tenant_id, slug);
    campaign.pipeline.processors = steps
        .iter()
        .map(|slug| PipelineStep {
            id: Some(slug.to_string()),
            kind: slug.to_string(),
            config: serde_json::json!({}),
        })
        .collect();
    campaign.publish().expect("test pipelines are never empty");
    campaign
}

async fn build_harness(tenant_id: TenantId, handlers: Vec<(&str, Arc<dyn ProcessorHandler>)>) -> Harness {
    let central_store = InMemoryCentralStore::new();
    let tenant_store: Arc<dyn TenantStore> = InMemoryTenantStore::new(tenant_id);

    let registry = ProcessorRegistry::new();
    for (slug, handler) in handlers {
        tenant_store
            .put_processor(ProcessorCatalogEntry::new(tenant_id, slug, slug, slug))
            .await
            .unwrap();
        registry.register(slug, handler).await;
    }
    let registry = Arc::new(registry);

    let blobs = Arc::new(InMemoryBlobStore::new());
    let artifacts = Arc::new(ArtifactStore::new(blobs, tenant_store.clone()));
    let cipher = Arc::new(CredentialCipher::new([1u8; 32]));
    let vault = Arc::new(CredentialVault::new(tenant_store.clone(), cipher));
    let events = Arc::new(NullEventBus);

    let activity_runner = Arc::new(ActivityRunner::new(
        central_store.clone(),
        registry.clone(),
        vault,
        artifacts,
        events.clone(),
    ));
    let job_manager = Arc::new(JobManager::new(tenant_store.clone(), events));
    let workflow_store = InMemoryWorkflowStore::new();
    let signals = Arc::new(SignalBox::new());
    let engine = WorkflowEngine::new(job_manager, activity_runner, workflow_store, signals.clone(), tenant_store.clone());

    Harness {
        central_store,
        tenant_store,
        signals,
        engine,
    }
}

struct OcrHandler;

#[async_trait]
impl ProcessorHandler for OcrHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, _context: &HandlerContext) -> ProcessorResult {
        let mut output = HashMap::new();
        output.insert("text".to_string(), serde_json::json!("$8.50 Coffee Shop"));
        ProcessorResult::ok(output)
    }
}

struct ExtractionHandler;

#[async_trait]
impl ProcessorHandler for ExtractionHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, context: &HandlerContext) -> ProcessorResult {
        let text = context
            .previous_outputs
            .get("ocr")
            .and_then(|o| o.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        assert_eq!(text, "$8.50 Coffee Shop");

        let mut output = HashMap::new();
        output.insert(
            "extracted_fields".to_string(),
            serde_json::json!({
                "merchant": { "value": "Coffee Shop", "confidence": 0.96 },
                "total": { "value": 8.50, "confidence": 0.98 },
            }),
        );
        ProcessorResult::ok(output)
    }
}

/// Scenario 1: linear happy path.
#[tokio::test]
async fn linear_happy_path_completes_with_merged_metadata() {
    let tenant_id = TenantId::new();
    let harness = build_harness(
        tenant_id,
        vec![
            ("ocr", Arc::new(OcrHandler)),
            ("extraction", Arc::new(ExtractionHandler)),
        ],
    )
    .await;

    let campaign = new_campaign(tenant_id, "receipt-ocr", &["ocr", "extraction"]);
    harness.tenant_store.put_campaign(campaign.clone()).await.unwrap();

    TenantContext::run(harness.tenant_store.clone(), async {
        let mut document = Document::new(campaign.id, "receipt.png", "image/png", 2048, "ingest/1", "local", "hash-1");
        harness.tenant_store.put_document(document.clone()).await.unwrap();

        let job_manager = JobManager::new(harness.tenant_store.clone(), Arc::new(NullEventBus));
        let mut job = job_manager.create(&mut document, &campaign).await.unwrap();

        harness.engine.run(&mut job, &mut document).await.unwrap();

        assert_eq!(document.state, DocumentState::Completed);
        assert_eq!(job.state, JobState::Completed);

        let records = harness.tenant_store.execution_records_for_job(job.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.state == docflow_core::state::ExecutionState::Completed));

        assert_eq!(
            document.metadata.get("text").unwrap(),
            &serde_json::json!("$8.50 Coffee Shop")
        );
        assert_eq!(
            document.metadata["extracted_fields"]["merchant"]["value"],
            serde_json::json!("Coffee Shop")
        );

        let progress = harness.tenant_store.get_progress(job.id).await.unwrap().unwrap();
        assert_eq!(progress.percentage(), 100);
    })
    .await;
}

struct UnsupportedFormatHandler;

#[async_trait]
impl ProcessorHandler for UnsupportedFormatHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, _context: &HandlerContext) -> ProcessorResult {
        ProcessorResult::failure("unsupported format")
    }
}

struct NeverCalledHandler;

#[async_trait]
impl ProcessorHandler for NeverCalledHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, _context: &HandlerContext) -> ProcessorResult {
        panic!("extraction must never run once ocr fails non-retryably");
    }
}

/// Scenario 2: a non-retryable failure mid-pipeline stops dispatch of
/// every later step and fails the job after exactly one attempt.
#[tokio::test]
async fn non_retryable_failure_stops_the_pipeline() {
    let tenant_id = TenantId::new();
    let harness = build_harness(
        tenant_id,
        vec![
            ("ocr", Arc::new(UnsupportedFormatHandler)),
            ("extraction", Arc::new(NeverCalledHandler)),
        ],
    )
    .await;

    let campaign = new_campaign(tenant_id, "receipt-ocr", &["ocr", "extraction"]);
    harness.tenant_store.put_campaign(campaign.clone()).await.unwrap();

    TenantContext::run(harness.tenant_store.clone(), async {
        let mut document = Document::new(campaign.id, "receipt.png", "image/png", 2048, "ingest/2", "local", "hash-2");
        harness.tenant_store.put_document(document.clone()).await.unwrap();

        let job_manager = JobManager::new(harness.tenant_store.clone(), Arc::new(NullEventBus));
        let mut job = job_manager.create(&mut document, &campaign).await.unwrap();

        harness.engine.run(&mut job, &mut document).await.unwrap();

        assert_eq!(document.state, DocumentState::Failed);
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error_log.len(), 1);

        let records = harness.tenant_store.execution_records_for_job(job.id).await.unwrap();
        assert_eq!(records.len(), 1, "extraction must never have dispatched");
    })
    .await;
}

struct EkycHandler;

#[async_trait]
impl ProcessorHandler for EkycHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, _context: &HandlerContext) -> ProcessorResult {
        let mut output = HashMap::new();
        output.insert("transaction_id".to_string(), serde_json::json!("T-1"));
        output.insert("awaiting_callback".to_string(), serde_json::json!(true));
        output.insert("kyc_status".to_string(), serde_json::json!("pending"));
        ProcessorResult::ok(output)
    }
}

struct SignHandler;

#[async_trait]
impl ProcessorHandler for SignHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, context: &HandlerContext) -> ProcessorResult {
        let ekyc = context.previous_outputs.get("ekyc").expect("ekyc output must be available");
        assert_eq!(ekyc.get("transaction_id").and_then(|v| v.as_str()), Some("T-1"));
        assert_eq!(ekyc.get("callback_status").and_then(|v| v.as_str()), Some("auto_approved"));

        let mut output = HashMap::new();
        output.insert("signed".to_string(), serde_json::json!(true));
        ProcessorResult::ok(output)
    }
}

/// Scenario 4: a step that asks the workflow to suspend on an external
/// transaction id resumes, through the real `CallbackRegistry`/`SignalBox`
/// wiring, once the callback arrives.
#[tokio::test]
async fn callback_signal_resumes_the_suspended_workflow() {
    let tenant_id = TenantId::new();
    let harness = build_harness(
        tenant_id,
        vec![("ekyc", Arc::new(EkycHandler)), ("sign", Arc::new(SignHandler))],
    )
    .await;

    let campaign = new_campaign(tenant_id, "ekyc-sign", &["ekyc", "sign"]);
    harness.tenant_store.put_campaign(campaign.clone()).await.unwrap();

    let callback_registry = docflow_callback::CallbackRegistry::new(harness.central_store.clone(), harness.signals.clone());

    TenantContext::run(harness.tenant_store.clone(), async {
        let mut document = Document::new(campaign.id, "id-card.png", "image/png", 512, "ingest/3", "local", "hash-3");
        harness.tenant_store.put_document(document.clone()).await.unwrap();

        let job_manager = JobManager::new(harness.tenant_store.clone(), Arc::new(NullEventBus));
        let mut job = job_manager.create(&mut document, &campaign).await.unwrap();

        let run = harness.engine.run(&mut job, &mut document);
        let deliver = async {
            // Give the engine a chance to register its mapping and suspend
            // before the callback arrives.
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let mapping = harness.central_store.get_mapping("T-1").await.unwrap();
            assert!(mapping.is_some(), "ekyc step must have registered a pending callback mapping");
            callback_registry
                .handle_callback("T-1", "auto_approved", serde_json::json!({ "status": "auto_approved" }))
                .await
                .unwrap();
        };

        let (run_result, _) = tokio::join!(run, deliver);
        run_result.unwrap();

        assert_eq!(document.state, DocumentState::Completed);
        assert_eq!(job.state, JobState::Completed);

        let mapping = harness.central_store.get_mapping("T-1").await.unwrap().unwrap();
        assert_eq!(mapping.status, docflow_core::model::CallbackStatus::Received);
    })
    .await;
}

struct FlakyHandler {
    attempts: AtomicU32,
}

#[async_trait]
impl ProcessorHandler for FlakyHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, _context: &HandlerContext) -> ProcessorResult {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            return ProcessorResult::failure("upstream request timed out");
        }
        let mut output = HashMap::new();
        output.insert("text".to_string(), serde_json::json!("recovered"));
        ProcessorResult::ok(output)
    }
}

/// Scenario 3: a transient failure on attempts 1-2 retries within the same
/// Activity dispatch and succeeds on attempt 3; the job-level attempt
/// counter is untouched since step retries never count as whole-job
/// retries (spec §4.5 "Retries").
#[tokio::test]
async fn transient_failure_retries_within_the_activity_and_then_succeeds() {
    let tenant_id = TenantId::new();
    let handler = Arc::new(FlakyHandler { attempts: AtomicU32::new(0) });
    let harness = build_harness(tenant_id, vec![("ocr", handler.clone())]).await;

    let campaign = new_campaign(tenant_id, "flaky-ocr", &["ocr"]);
    harness.tenant_store.put_campaign(campaign.clone()).await.unwrap();

    TenantContext::run(harness.tenant_store.clone(), async {
        let mut document = Document::new(campaign.id, "receipt.png", "image/png", 2048, "ingest/4", "local", "hash-4");
        harness.tenant_store.put_document(document.clone()).await.unwrap();

        let job_manager = JobManager::new(harness.tenant_store.clone(), Arc::new(NullEventBus));
        let mut job = job_manager.create(&mut document, &campaign).await.unwrap();

        harness.engine.run(&mut job, &mut document).await.unwrap();

        assert_eq!(document.state, DocumentState::Completed);
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.attempts, 0, "step-level retries must not count as job-level attempts");
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 3);

        let records = harness.tenant_store.execution_records_for_job(job.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, docflow_core::state::ExecutionState::Completed);
    })
    .await;
}

/// Scenario 6: tenant isolation. Two tenants each create a document; a
/// query made under one tenant's context never observes the other's row,
/// and a query made with no bound context fails outright rather than
/// silently defaulting to some tenant.
#[tokio::test]
async fn tenant_isolation_holds_across_separate_stores_and_no_context() {
    let tenant_a = TenantId::new();
    let tenant_b = TenantId::new();
    let store_a: Arc<dyn TenantStore> = InMemoryTenantStore::new(tenant_a);
    let store_b: Arc<dyn TenantStore> = InMemoryTenantStore::new(tenant_b);

    let campaign_a = new_campaign(tenant_a, "campaign-a", &["ocr"]);
    let campaign_b = new_campaign(tenant_b, "campaign-b", &["ocr"]);

    let doc_a = Document::new(campaign_a.id, "a.png", "image/png", 10, "p-a", "d", "hash-a");
    let doc_b = Document::new(campaign_b.id, "b.png", "image/png", 10, "p-b", "d", "hash-b");

    store_a.put_document(doc_a.clone()).await.unwrap();
    store_b.put_document(doc_b.clone()).await.unwrap();

    assert!(store_a.get_document(doc_a.id).await.unwrap().is_some());
    assert!(store_a.get_document(doc_b.id).await.unwrap().is_none());
    assert!(store_b.get_document(doc_b.id).await.unwrap().is_some());
    assert!(store_b.get_document(doc_a.id).await.unwrap().is_none());

    assert!(docflow_tenant::TenantContext::current().is_err());

    TenantContext::run(store_a.clone(), async {
        let bound = docflow_tenant::TenantContext::current().unwrap();
        assert!(bound.get_document(doc_a.id).await.unwrap().is_some());
        assert!(bound.get_document(doc_b.id).await.unwrap().is_none());
    })
    .await;
}
