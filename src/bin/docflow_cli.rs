//! `docflow-cli` — boots the pipeline execution engine against an
//! in-memory store and drives one document through a demo pipeline.
//!
//! There is no Postgres-backed `TenantStore`/`CentralStore` in this crate
//! (spec §1 treats the concrete database as an implementation detail); this
//! binary exists to exercise the full stack — ingest, `JobManager`,
//! `WorkflowEngine`, `ActivityRunner` — the way the teacher's
//! `batch_test_harness` exercises template execution against a real
//! database. The OCR/classification/extraction handlers registered here are
//! local stand-ins for the external AI/KYC vendors the spec keeps out of
//! scope (§9 "air-gapped deployments replace external ... handlers with
//! local equivalents behind the same handler contract").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use sha2::{Digest, Sha256};

use docflow_core::id::TenantId;
use docflow_core::model::{Campaign, Document, PipelineStep, ProcessorCatalogEntry, Tenant};
use docflow_core::store::{CentralStore, InMemoryCentralStore, InMemoryTenantStore, TenantStore};
use docflow_registry::{HandlerContext, ProcessorHandler, ProcessorRegistry, ProcessorResult};
use docflow_storage::{ArtifactStore, BlobStore, InMemoryBlobStore};
use docflow_tenant::TenantContext;
use docflow_vault::{CredentialCipher, CredentialVault};
use docflow_workflow::{ActivityRunner, BroadcastEventBus, EngineEvent, InMemoryWorkflowStore, JobManager, SignalBox, WorkflowEngine};

/// Document processing pipeline execution engine (spec §1-§2).
#[derive(Parser, Debug)]
#[command(name = "docflow-cli")]
#[command(about = "Run a document through a demo pipeline against an in-memory store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Ingest a file under a tenant/campaign and drive it to completion.
    Ingest {
        /// Tenant slug; created if it doesn't exist yet.
        #[arg(long, default_value = "demo-tenant")]
        tenant_slug: String,

        /// Campaign slug; created with the default ocr/classify/extract
        /// pipeline if it doesn't exist yet.
        #[arg(long, default_value = "receipt-ocr")]
        campaign_slug: String,

        /// Path to the file to ingest.
        #[arg(long)]
        file: PathBuf,

        /// MIME type to record for the document.
        #[arg(long, default_value = "image/png")]
        mime: String,

        /// Print every engine event as it is published.
        #[arg(long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest {
            tenant_slug,
            campaign_slug,
            file,
            mime,
            verbose,
        } => run_ingest(&tenant_slug, &campaign_slug, &file, &mime, verbose).await,
    }
}

async fn run_ingest(
    tenant_slug: &str,
    campaign_slug: &str,
    file: &PathBuf,
    mime: &str,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(file).await?;
    let content_hash = content_hash(&bytes);

    let central_store = InMemoryCentralStore::new();
    let tenant_id = TenantId::new();
    central_store.put_tenant(Tenant::new(tenant_slug)).await?;

    let tenant_store: Arc<dyn TenantStore> = InMemoryTenantStore::new(tenant_id);
    let campaign = demo_campaign(tenant_id, campaign_slug);
    tenant_store.put_campaign(campaign.clone()).await?;
    for (slug, handler_key, category) in demo_catalog() {
        tenant_store
            .put_processor(ProcessorCatalogEntry::new(tenant_id, slug, handler_key, category))
            .await?;
    }

    let mut registry = ProcessorRegistry::new();
    registry.register("ocr::demo", Arc::new(DemoOcrHandler)).await;
    registry.register("classification::demo", Arc::new(DemoClassifierHandler)).await;
    registry.register("extraction::demo", Arc::new(DemoExtractionHandler)).await;

    let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
    let storage_path = format!("ingest/{}", uuid::Uuid::new_v4());
    blobs.put(&storage_path, &bytes).await?;

    let cipher = Arc::new(CredentialCipher::new(encryption_key_from_env()));
    let vault = Arc::new(CredentialVault::new(tenant_store.clone(), cipher));
    let artifacts = Arc::new(ArtifactStore::new(blobs, tenant_store.clone()));

    let events = Arc::new(BroadcastEventBus::default());
    if verbose {
        spawn_event_logger(events.subscribe());
    }
    let events_dyn: Arc<dyn docflow_workflow::EventBus> = events;

    let activity_runner = Arc::new(ActivityRunner::new(
        central_store,
        Arc::new(registry),
        vault,
        artifacts,
        events_dyn.clone(),
    ));
    let job_manager = Arc::new(JobManager::new(tenant_store.clone(), events_dyn));
    let workflow_store = InMemoryWorkflowStore::new();
    let signals = Arc::new(SignalBox::new());
    let engine = WorkflowEngine::new(job_manager.clone(), activity_runner, workflow_store, signals, tenant_store.clone());

    let mut document = Document::new(campaign.id, file.display().to_string(), mime, bytes.len() as u64, storage_path, "local", content_hash);

    TenantContext::run(tenant_store.clone(), async {
        tenant_store.put_document(document.clone()).await.unwrap();
        let mut job = job_manager.create(&mut document, &campaign).await.unwrap();

        engine.run(&mut job, &mut document).await.unwrap();

        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "document_id": document.id.to_string(),
                "document_state": document.state,
                "job_id": job.id.to_string(),
                "job_state": job.state,
                "metadata": document.metadata,
            }))
            .unwrap()
        );
    })
    .await;

    Ok(())
}

fn encryption_key_from_env() -> [u8; 32] {
    match std::env::var("DOCFLOW_ENCRYPTION_KEY") {
        Ok(hex) if hex.len() == 64 => {
            let mut key = [0u8; 32];
            for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
                let byte = u8::from_str_radix(std::str::from_utf8(chunk).unwrap_or("00"), 16).unwrap_or(0);
                key[i] = byte;
            }
            key
        }
        _ => [7u8; 32],
    }
}

fn spawn_event_logger(mut rx: tokio::sync::broadcast::Receiver<EngineEvent>) {
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            tracing::info!(?event, "engine event");
        }
    });
}

fn demo_campaign(tenant_id: TenantId, slug: &str) -> Campaign {
    let mut campaign = Campaign::new(tenant_id, slug);
    campaign.pipeline.processors = vec![
        PipelineStep { id: Some("ocr".to_string()), kind: "ocr".to_string(), config: serde_json::json!({}) },
        PipelineStep {
            id: Some("classification".to_string()),
            kind: "classification".to_string(),
            config: serde_json::json!({}),
        },
        PipelineStep {
            id: Some("extraction".to_string()),
            kind: "extraction".to_string(),
            config: serde_json::json!({}),
        },
    ];
    campaign.publish().expect("demo pipeline is never empty");
    campaign
}

fn demo_catalog() -> [(&'static str, &'static str, &'static str); 3] {
    [
        ("ocr", "ocr::demo", "ocr"),
        ("classification", "classification::demo", "classification"),
        ("extraction", "extraction::demo", "extraction"),
    ]
}

/// Stand-in OCR handler: reports the byte length of the document rather
/// than running a real OCR engine (out of scope, spec §1).
struct DemoOcrHandler;

#[async_trait]
impl ProcessorHandler for DemoOcrHandler {
    fn can_process(&self, document: &Document) -> bool {
        document.mime.starts_with("image/") || document.mime == "application/pdf"
    }

    async fn process(&self, document: &Document, _config: &serde_json::Value, _context: &HandlerContext) -> ProcessorResult {
        let mut output = HashMap::new();
        output.insert(
            "text".to_string(),
            serde_json::json!(format!("[demo ocr] {} bytes read from {}", document.size_bytes, document.filename)),
        );
        ProcessorResult::ok(output)
    }
}

struct DemoClassifierHandler;

#[async_trait]
impl ProcessorHandler for DemoClassifierHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, _context: &HandlerContext) -> ProcessorResult {
        let mut output = HashMap::new();
        output.insert("category".to_string(), serde_json::json!("receipt"));
        ProcessorResult::ok(output)
    }
}

struct DemoExtractionHandler;

#[async_trait]
impl ProcessorHandler for DemoExtractionHandler {
    fn can_process(&self, _document: &Document) -> bool {
        true
    }

    async fn process(&self, _document: &Document, _config: &serde_json::Value, context: &HandlerContext) -> ProcessorResult {
        let mut output = HashMap::new();
        let text = context
            .previous_outputs
            .get("ocr")
            .and_then(|o| o.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        output.insert(
            "extracted_fields".to_string(),
            serde_json::json!({ "source_text": { "value": text, "confidence": 0.5 } }),
        );
        ProcessorResult::ok(output)
    }
}

/// Computes `Document.content_hash` (spec §3: "hash matches bytes").
fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
