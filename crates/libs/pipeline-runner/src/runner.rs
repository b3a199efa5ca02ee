//! Pipeline runner session
//!
//! One runner owns one execution engine for one registry. Submission is
//! synchronous from the caller's point of view: `submit` drives a document
//! through every stage and hands back the finished context (or the failure
//! with its partial context).

use std::sync::Arc;

use annopipe_core::{
    extract, AnnotationRecord, CancelHandle, CancelToken, ExecutionEngine, JobContext,
    PipelineManifest, PipelineRegistry, Result, RunResult, StageClient,
};

/// A scoped pipeline session: registry + engine + guaranteed release
///
/// # Example
///
/// ```ignore
/// use annopipe_runner::PipelineRunner;
/// use annopipe_transport_http::HttpStageClient;
/// use std::sync::Arc;
///
/// let manifest = PipelineManifest::from_path("pipeline.yaml")?;
/// let runner = PipelineRunner::from_manifest(&manifest, Arc::new(HttpStageClient::new()))?;
///
/// let context = runner.submit("Ich finde es wirklich toll, dass das jetzt passiert.").await?;
/// for record in runner.extract(&context, "Sarcasm") {
///     println!("{:?}", record);
/// }
///
/// runner.shutdown();
/// ```
pub struct PipelineRunner {
    engine: ExecutionEngine,
}

impl PipelineRunner {
    /// Create a runner for a registry and a stage client
    pub fn new(registry: PipelineRegistry, client: Arc<dyn StageClient>) -> Result<Self> {
        let engine = ExecutionEngine::new(registry, client)?;
        Ok(Self { engine })
    }

    /// Create a runner from a declarative manifest
    pub fn from_manifest(
        manifest: &PipelineManifest,
        client: Arc<dyn StageClient>,
    ) -> Result<Self> {
        let registry = manifest.build_registry()?;
        tracing::info!(
            pipeline = manifest.name.as_deref().unwrap_or("<unnamed>"),
            stages = registry.len(),
            "pipeline runner configured"
        );
        Self::new(registry, client)
    }

    /// The registry this runner executes
    pub fn registry(&self) -> &PipelineRegistry {
        self.engine.registry()
    }

    /// Submit one document and run it through the full pipeline
    pub async fn submit(&self, document_text: impl Into<String>) -> RunResult {
        self.engine.run(JobContext::new(document_text)).await
    }

    /// Submit one document with a caller-held cancellation token
    pub async fn submit_with_cancel(
        &self,
        document_text: impl Into<String>,
        token: CancelToken,
    ) -> RunResult {
        self.engine
            .run_with_cancel(JobContext::new(document_text), token)
            .await
    }

    /// Submit a batch of documents; per-stage scale bounds apply across the
    /// whole batch
    pub async fn submit_batch(
        &self,
        documents: impl IntoIterator<Item = String>,
    ) -> Vec<RunResult> {
        let contexts = documents.into_iter().map(JobContext::new).collect();
        self.engine.run_batch(contexts).await
    }

    /// Read the ordered records for `kind` off a context
    ///
    /// A kind that was never produced yields an empty slice.
    pub fn extract<'a>(&self, context: &'a JobContext, kind: &str) -> &'a [AnnotationRecord] {
        extract(context, kind)
    }

    /// Create a linked cancel handle/token pair for use with
    /// [`submit_with_cancel`](Self::submit_with_cancel)
    pub fn cancel_pair(&self) -> (CancelHandle, CancelToken) {
        annopipe_core::cancel_pair()
    }

    /// Release the engine and end the session
    pub fn shutdown(self) {
        self.engine.release();
    }
}

impl Drop for PipelineRunner {
    fn drop(&mut self) {
        // release() is idempotent, so an explicit shutdown() followed by the
        // drop is safe
        self.engine.release();
    }
}
