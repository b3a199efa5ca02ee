//! Stage client contract
//!
//! The engine reaches a remote stage through the [`StageClient`] trait; the
//! concrete transport (HTTP, in-process stub, ...) lives outside this crate.
//! The request/response types below are the narrow wire contract: a stage
//! receives the document text plus the annotations accumulated so far, and
//! answers with the annotations it produced.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationRecord;
use crate::context::JobContext;
use crate::stage::StageDescriptor;
use crate::Result;

/// Payload dispatched to a stage endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRequest {
    /// The input document text
    pub document_text: String,

    /// Annotations accumulated by earlier stages, flattened in kind order
    /// then arrival order
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
}

impl StageRequest {
    /// Build the request a stage receives for the current state of a job
    pub fn from_context(context: &JobContext) -> Self {
        Self {
            document_text: context.document_text().to_string(),
            annotations: context.all_annotations(),
        }
    }
}

/// Payload a stage endpoint answers with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageResponse {
    /// Annotations produced by the stage
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
}

/// Transport-agnostic client for one stage request/response exchange
///
/// Implementations perform a single dispatch and report transport or remote
/// faults through `Err`; the engine owns timeout enforcement, the retry, and
/// the mapping of client errors onto stage failures.
#[async_trait]
pub trait StageClient: Send + Sync {
    /// Dispatch `request` to `stage` and await its response
    async fn process(&self, stage: &StageDescriptor, request: StageRequest)
        -> Result<StageResponse>;
}
