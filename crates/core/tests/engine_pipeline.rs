//! End-to-end engine tests against scripted stage clients

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use annopipe_core::{
    cancel_pair, extract, AnnotationRecord, Error, ExecutionEngine, JobContext, PipelineRegistry,
    Result, Span, StageClient, StageDescriptor, StageRequest, StageResponse,
};

fn stage(name: &str, scale: usize, timeout: Duration) -> StageDescriptor {
    StageDescriptor::new(name, format!("http://localhost/{}", name), scale, timeout).unwrap()
}

fn registry(stages: Vec<StageDescriptor>) -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();
    for s in stages {
        registry.add(s).unwrap();
    }
    registry
}

/// What a scripted stage does when it receives a request
#[derive(Clone)]
enum Behavior {
    /// Answer with one "Mark" record labeled with the stage name
    Mark,
    /// Answer with the given records
    Annotate(Vec<AnnotationRecord>),
    /// Sleep past any configured timeout
    Hang,
    /// Report a remote fault
    Fail(String),
}

/// Scripted client: per-stage behavior plus call counting
struct ScriptedClient {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedClient {
    fn new(behaviors: Vec<(&str, Behavior)>) -> Arc<Self> {
        Arc::new(Self {
            behaviors: behaviors
                .into_iter()
                .map(|(name, b)| (name.to_string(), b))
                .collect(),
            calls: Mutex::new(HashMap::new()),
        })
    }

    fn calls_to(&self, stage: &str) -> usize {
        *self.calls.lock().unwrap().get(stage).unwrap_or(&0)
    }
}

#[async_trait]
impl StageClient for ScriptedClient {
    async fn process(
        &self,
        stage: &StageDescriptor,
        _request: StageRequest,
    ) -> Result<StageResponse> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(stage.name().to_string())
            .or_insert(0) += 1;

        match self.behaviors.get(stage.name()) {
            Some(Behavior::Mark) => Ok(StageResponse {
                annotations: vec![
                    AnnotationRecord::new("Mark", Span::new(0, 1)).with_field("stage", stage.name())
                ],
            }),
            Some(Behavior::Annotate(records)) => Ok(StageResponse {
                annotations: records.clone(),
            }),
            Some(Behavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(StageResponse::default())
            }
            Some(Behavior::Fail(message)) => Err(Error::transport(message.clone())),
            None => Ok(StageResponse::default()),
        }
    }
}

#[tokio::test]
async fn test_successful_pipeline_merges_all_stages_in_order() {
    let client = ScriptedClient::new(vec![
        ("first", Behavior::Mark),
        ("second", Behavior::Mark),
        ("third", Behavior::Mark),
    ]);
    let engine = ExecutionEngine::new(
        registry(vec![
            stage("first", 1, Duration::from_secs(1)),
            stage("second", 1, Duration::from_secs(1)),
            stage("third", 1, Duration::from_secs(1)),
        ]),
        client.clone(),
    )
    .unwrap();

    let context = engine.run(JobContext::new("a document")).await.unwrap();

    let marks = extract(&context, "Mark");
    assert_eq!(marks.len(), 3);
    let stages: Vec<_> = marks
        .iter()
        .map(|m| m.fields["stage"].as_str().unwrap())
        .collect();
    assert_eq!(stages, vec!["first", "second", "third"]);

    engine.release();
}

#[tokio::test]
async fn test_second_stage_double_timeout_keeps_first_stage_results() {
    let client = ScriptedClient::new(vec![
        ("first", Behavior::Mark),
        ("second", Behavior::Hang),
        ("third", Behavior::Mark),
    ]);
    let engine = ExecutionEngine::new(
        registry(vec![
            stage("first", 1, Duration::from_secs(1)),
            stage("second", 1, Duration::from_millis(50)),
            stage("third", 1, Duration::from_secs(1)),
        ]),
        client.clone(),
    )
    .unwrap();

    let err = engine.run(JobContext::new("a document")).await.unwrap_err();

    assert!(matches!(
        &err.error,
        Error::StageTimeout { stage, timeout_ms } if stage == "second" && *timeout_ms == 50
    ));

    // Partial results from the first stage survive; stage three never ran
    assert_eq!(extract(&err.partial, "Mark").len(), 1);
    assert_eq!(client.calls_to("first"), 1);
    assert_eq!(client.calls_to("second"), 2); // initial attempt + one retry
    assert_eq!(client.calls_to("third"), 0);

    engine.release();
}

#[tokio::test]
async fn test_stage_fault_aborts_with_partial_results() {
    let client = ScriptedClient::new(vec![
        ("first", Behavior::Mark),
        ("second", Behavior::Fail("model container returned 500".into())),
    ]);
    let engine = ExecutionEngine::new(
        registry(vec![
            stage("first", 1, Duration::from_secs(1)),
            stage("second", 1, Duration::from_secs(1)),
        ]),
        client.clone(),
    )
    .unwrap();

    let err = engine.run(JobContext::new("a document")).await.unwrap_err();

    match &err.error {
        Error::StageFailure { stage, message } => {
            assert_eq!(stage, "second");
            assert!(message.contains("model container returned 500"));
        }
        other => panic!("expected StageFailure, got {:?}", other),
    }
    assert_eq!(extract(&err.partial, "Mark").len(), 1);
    // A remote fault is not retried
    assert_eq!(client.calls_to("second"), 1);

    engine.release();
}

#[tokio::test]
async fn test_cancellation_aborts_current_wait_and_returns_partial() {
    let client = ScriptedClient::new(vec![
        ("first", Behavior::Mark),
        ("second", Behavior::Hang),
    ]);
    let engine = ExecutionEngine::new(
        registry(vec![
            stage("first", 1, Duration::from_secs(1)),
            stage("second", 1, Duration::from_secs(30)),
        ]),
        client,
    )
    .unwrap();

    let (handle, token) = cancel_pair();
    let runner = engine.clone();
    let run = tokio::spawn(async move {
        runner
            .run_with_cancel(JobContext::new("a document"), token)
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(
        &err.error,
        Error::Cancelled { stage } if stage == "second"
    ));
    assert_eq!(extract(&err.partial, "Mark").len(), 1);

    engine.release();
}

#[tokio::test]
async fn test_cancellation_while_queued_on_stage_permit_returns_promptly() {
    // One stage with scale 1; the first job hangs and holds the sole permit
    // through its timeout plus retry (~10s). The second job queues behind it
    // and must still observe cancellation immediately.
    let client = ScriptedClient::new(vec![("bounded", Behavior::Hang)]);
    let engine = ExecutionEngine::new(
        registry(vec![stage("bounded", 1, Duration::from_secs(5))]),
        client,
    )
    .unwrap();

    let holder = engine.clone();
    let first = tokio::spawn(async move { holder.run(JobContext::new("permit holder")).await });

    // Let the first job take the permit before queuing the second
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (handle, token) = cancel_pair();
    let queued = engine.clone();
    let second = tokio::spawn(async move {
        queued
            .run_with_cancel(JobContext::new("queued job"), token)
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let cancelled_at = std::time::Instant::now();
    handle.cancel();

    let err = second.await.unwrap().unwrap_err();
    let waited = cancelled_at.elapsed();

    assert!(matches!(
        &err.error,
        Error::Cancelled { stage } if stage == "bounded"
    ));
    // Must return on cancellation, not once the permit holder's
    // timeout-plus-retry frees the permit
    assert!(
        waited < Duration::from_secs(1),
        "cancelled queued job took {:?} to return",
        waited
    );

    first.abort();
    engine.release();
}

#[tokio::test]
async fn test_operations_after_release_fail_closed() {
    let client = ScriptedClient::new(vec![("only", Behavior::Mark)]);
    let engine = ExecutionEngine::new(
        registry(vec![stage("only", 1, Duration::from_secs(1))]),
        client,
    )
    .unwrap();

    engine.release();
    engine.release(); // repeated release is a safe no-op

    let err = engine.run(JobContext::new("text")).await.unwrap_err();
    assert!(matches!(err.error, Error::EngineClosed));

    let batch = engine
        .run_batch(vec![JobContext::new("one"), JobContext::new("two")])
        .await;
    assert_eq!(batch.len(), 2);
    for result in batch {
        assert!(matches!(result.unwrap_err().error, Error::EngineClosed));
    }
}

/// Counts concurrent entries to verify the per-stage scale bound
struct ConcurrencyProbe {
    current: AtomicUsize,
    max_seen: AtomicUsize,
}

#[async_trait]
impl StageClient for ConcurrencyProbe {
    async fn process(
        &self,
        _stage: &StageDescriptor,
        _request: StageRequest,
    ) -> Result<StageResponse> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(StageResponse::default())
    }
}

#[tokio::test]
async fn test_batch_never_exceeds_stage_scale() {
    let probe = Arc::new(ConcurrencyProbe {
        current: AtomicUsize::new(0),
        max_seen: AtomicUsize::new(0),
    });
    let engine = ExecutionEngine::new(
        registry(vec![stage("bounded", 2, Duration::from_secs(5))]),
        probe.clone(),
    )
    .unwrap();

    let contexts: Vec<_> = (0..8)
        .map(|i| JobContext::new(format!("doc {}", i)))
        .collect();
    let results = engine.run_batch(contexts).await;

    assert_eq!(results.len(), 8);
    for result in results {
        assert!(result.is_ok());
    }
    // Saturated, but never above scale
    assert_eq!(probe.max_seen.load(Ordering::SeqCst), 2);

    engine.release();
}

#[tokio::test]
async fn test_sarcasm_scenario() {
    let document = "Ich finde es wirklich toll, dass das jetzt passiert.";
    let client = ScriptedClient::new(vec![(
        "sarcasm",
        Behavior::Annotate(vec![AnnotationRecord::new(
            "Sarcasm",
            Span::new(0, document.len()),
        )
        .with_field("label", "ironic")]),
    )]);
    let engine = ExecutionEngine::new(
        registry(vec![stage("sarcasm", 1, Duration::from_millis(500))]),
        client,
    )
    .unwrap();

    let context = engine.run(JobContext::new(document)).await.unwrap();

    let records = extract(&context, "Sarcasm");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].span, Span::new(0, document.len()));
    assert_eq!(records[0].fields["label"], "ironic");

    assert!(extract(&context, "Other").is_empty());

    engine.release();
}
