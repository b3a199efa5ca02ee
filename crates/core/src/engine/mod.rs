//! Execution engine
//!
//! Runs a [`JobContext`] through every stage of a [`PipelineRegistry`] in
//! registry order. Each stage receives the document text plus the
//! annotations accumulated so far and may extend them; a stage wait is
//! bounded by the stage's timeout, retried once on expiry, and cancellable
//! by the caller. Batch submission fans jobs out concurrently while a
//! per-stage semaphore keeps in-flight requests at or below the stage's
//! `scale`.
//!
//! Failures never discard work: every run error carries the partial context
//! accumulated up to the failure point.

pub mod client;

pub use client::{StageClient, StageRequest, StageResponse};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::time::timeout;

use crate::annotation::AnnotationRecord;
use crate::context::JobContext;
use crate::registry::PipelineRegistry;
use crate::stage::StageDescriptor;
use crate::{Error, Result};

/// A run failure together with the partial context accumulated before it
///
/// Annotations from stages that completed before the failure point remain on
/// `partial` and are returned to the caller, not discarded.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunError {
    /// What went wrong
    #[source]
    pub error: Error,

    /// The job context as it stood when the failure occurred
    pub partial: JobContext,
}

impl RunError {
    fn new(error: Error, partial: JobContext) -> Self {
        Self { error, partial }
    }

    /// Split into the error and the partial context
    pub fn into_parts(self) -> (Error, JobContext) {
        (self.error, self.partial)
    }
}

/// Result of a single pipeline run
pub type RunResult = std::result::Result<JobContext, RunError>;

/// Caller-held handle that aborts an in-flight run
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Abort the current stage wait of every run holding the paired token
    ///
    /// The affected runs skip their remaining stages and return
    /// [`Error::Cancelled`] with the partial context. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Token passed to [`ExecutionEngine::run_with_cancel`]
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Create a linked cancel handle/token pair
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

struct EngineInner {
    registry: PipelineRegistry,
    client: Arc<dyn StageClient>,

    /// One semaphore per stage, sized by the stage's `scale`; the only
    /// shared mutable resource of the engine
    permits: HashMap<String, Arc<Semaphore>>,

    closed: AtomicBool,

    /// Never-fired sender backing the token used by uncancellable runs;
    /// kept alive so subscribed receivers never observe a closed channel
    idle_cancel: watch::Sender<bool>,
}

/// Drives job contexts through a pipeline registry
///
/// Cheap to clone; clones share the same registry, client, and per-stage
/// permit table. Construct once per registry, call [`release`] exactly once
/// after use (repeat calls are safe no-ops).
///
/// [`release`]: ExecutionEngine::release
#[derive(Clone)]
pub struct ExecutionEngine {
    inner: Arc<EngineInner>,
}

impl ExecutionEngine {
    /// Create an engine for a registry and a stage client
    ///
    /// Fails with [`Error::InvalidConfiguration`] when the registry is
    /// empty.
    pub fn new(registry: PipelineRegistry, client: Arc<dyn StageClient>) -> Result<Self> {
        if registry.is_empty() {
            return Err(Error::config(
                "pipeline registry must contain at least one stage",
            ));
        }

        let permits = registry
            .stages()
            .iter()
            .map(|stage| {
                (
                    stage.name().to_string(),
                    Arc::new(Semaphore::new(stage.scale())),
                )
            })
            .collect();

        let (idle_cancel, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(EngineInner {
                registry,
                client,
                permits,
                closed: AtomicBool::new(false),
                idle_cancel,
            }),
        })
    }

    /// The registry this engine executes
    pub fn registry(&self) -> &PipelineRegistry {
        &self.inner.registry
    }

    /// Run one job through every stage in registry order
    pub async fn run(&self, context: JobContext) -> RunResult {
        let token = CancelToken {
            rx: self.inner.idle_cancel.subscribe(),
        };
        self.inner.run(context, token).await
    }

    /// Run one job with a caller-held cancellation token
    pub async fn run_with_cancel(&self, context: JobContext, token: CancelToken) -> RunResult {
        self.inner.run(context, token).await
    }

    /// Run a batch of jobs concurrently
    ///
    /// Jobs proceed independently; per-stage semaphores guarantee that no
    /// stage ever sees more than `scale` simultaneous requests. Results are
    /// returned in submission order.
    pub async fn run_batch(&self, contexts: Vec<JobContext>) -> Vec<RunResult> {
        let token = CancelToken {
            rx: self.inner.idle_cancel.subscribe(),
        };
        self.run_batch_with_cancel(contexts, token).await
    }

    /// Run a batch of jobs with a shared cancellation token
    pub async fn run_batch_with_cancel(
        &self,
        contexts: Vec<JobContext>,
        token: CancelToken,
    ) -> Vec<RunResult> {
        let runs = contexts
            .into_iter()
            .map(|context| self.inner.run(context, token.clone()));
        futures::future::join_all(runs).await
    }

    /// Release the engine's resources
    ///
    /// Closes every per-stage permit table so no new dispatches start; any
    /// operation after the first `release` fails with
    /// [`Error::EngineClosed`]. Repeated calls are safe no-ops.
    pub fn release(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for semaphore in self.inner.permits.values() {
            semaphore.close();
        }
        tracing::info!("execution engine released");
    }

    /// Whether `release` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl EngineInner {
    async fn run(&self, mut context: JobContext, token: CancelToken) -> RunResult {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RunError::new(Error::EngineClosed, context));
        }

        let mut cancel_rx = token.rx;

        for stage in self.registry.stages() {
            if self.closed.load(Ordering::SeqCst) {
                return Err(RunError::new(Error::EngineClosed, context));
            }

            tracing::debug!(job = %context.id(), stage = %stage.name(), "dispatching stage");

            match self.run_stage(stage, &context, &mut cancel_rx).await {
                Ok(records) => {
                    let produced = records.len();
                    if let Err(error) = merge_records(&mut context, stage, records) {
                        return Err(RunError::new(error, context));
                    }
                    tracing::debug!(
                        job = %context.id(),
                        stage = %stage.name(),
                        records = produced,
                        "stage completed"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        job = %context.id(),
                        stage = %stage.name(),
                        %error,
                        "aborting remaining stages"
                    );
                    return Err(RunError::new(error, context));
                }
            }
        }

        Ok(context)
    }

    /// Dispatch one stage, enforcing scale, timeout, the single retry, and
    /// cancellation
    async fn run_stage(
        &self,
        stage: &StageDescriptor,
        context: &JobContext,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<Vec<AnnotationRecord>> {
        let semaphore = self
            .permits
            .get(stage.name())
            .ok_or_else(|| Error::config(format!("no permit table for stage '{}'", stage.name())))?;

        // Holding the permit across the retry keeps the scale bound exact.
        // The acquisition itself is raced against the cancel token: a job
        // queued behind the stage's scale limit stays cancellable.
        let _permit = tokio::select! {
            _ = wait_cancelled(cancel_rx) => {
                return Err(Error::Cancelled {
                    stage: stage.name().to_string(),
                });
            }
            permit = semaphore.acquire() => permit.map_err(|_| Error::EngineClosed)?,
        };

        match self.attempt(stage, context, cancel_rx).await? {
            Some(response) => Ok(response.annotations),
            None => {
                tracing::warn!(
                    stage = %stage.name(),
                    timeout_ms = stage.timeout_ms(),
                    "stage timed out, retrying once"
                );
                match self.attempt(stage, context, cancel_rx).await? {
                    Some(response) => Ok(response.annotations),
                    None => Err(Error::StageTimeout {
                        stage: stage.name().to_string(),
                        timeout_ms: stage.timeout_ms(),
                    }),
                }
            }
        }
    }

    /// One dispatch attempt; `Ok(None)` means the timeout expired
    async fn attempt(
        &self,
        stage: &StageDescriptor,
        context: &JobContext,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<Option<StageResponse>> {
        let request = StageRequest::from_context(context);

        tokio::select! {
            _ = wait_cancelled(cancel_rx) => Err(Error::Cancelled {
                stage: stage.name().to_string(),
            }),
            outcome = timeout(stage.timeout(), self.client.process(stage, request)) => {
                match outcome {
                    Ok(Ok(response)) => Ok(Some(response)),
                    Ok(Err(error)) => Err(Error::StageFailure {
                        stage: stage.name().to_string(),
                        message: error.to_string(),
                    }),
                    Err(_) => Ok(None),
                }
            }
        }
    }
}

/// Resolve only when the token actually fires; a dropped handle means the
/// run can no longer be cancelled, so the wait parks forever instead of
/// resolving
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Merge a stage's returned records into the context, grouping by kind in
/// first-appearance order and preserving arrival order within each kind
///
/// A record with an empty kind is a malformed response and surfaces as
/// [`Error::StageFailure`] naming the stage.
fn merge_records(
    context: &mut JobContext,
    stage: &StageDescriptor,
    records: Vec<AnnotationRecord>,
) -> Result<()> {
    let mut groups: Vec<(String, Vec<AnnotationRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(kind, _)| *kind == record.kind) {
            Some((_, bucket)) => bucket.push(record),
            None => groups.push((record.kind.clone(), vec![record])),
        }
    }

    for (kind, bucket) in groups {
        context
            .add_annotations(&kind, bucket)
            .map_err(|error| Error::StageFailure {
                stage: stage.name().to_string(),
                message: error.to_string(),
            })?;
    }
    Ok(())
}
