//! Core harness for annotation pipelines
//!
//! Transport-agnostic execution engine for document-annotation pipelines:
//! declare an ordered set of remote processing stages, submit a document,
//! run it through every stage in order, and read typed annotation records
//! back off the finished context.
//!
//! The crate is organized around five pieces:
//!
//! - [`StageDescriptor`] — one stage: endpoint, scale, timeout
//! - [`PipelineRegistry`] — ordered, name-unique stage collection
//! - [`JobContext`] — one document plus its append-only annotation store
//! - [`ExecutionEngine`] — runs jobs through the registry, in order, with
//!   per-stage timeouts, one retry on timeout, bounded per-stage
//!   concurrency, and caller-driven cancellation
//! - [`extract`] — reads a kind's records off a context; a missing kind is
//!   an empty result, not an error
//!
//! Concrete stage transports implement [`StageClient`] in their own crates.

pub mod annotation;
pub mod context;
pub mod engine;
pub mod error;
pub mod extract;
pub mod manifest;
pub mod registry;
pub mod stage;

pub use annotation::{AnnotationKind, AnnotationRecord, KindRegistry, Span};
pub use context::JobContext;
pub use engine::{
    cancel_pair, CancelHandle, CancelToken, ExecutionEngine, RunError, RunResult, StageClient,
    StageRequest, StageResponse,
};
pub use error::{Error, Result};
pub use extract::{extract, extract_kind};
pub use manifest::{PipelineManifest, StageSpec};
pub use registry::PipelineRegistry;
pub use stage::StageDescriptor;
