//! Job context
//!
//! A [`JobContext`] carries one document through a pipeline run: the input
//! text plus an append-only store of annotations keyed by kind. The engine
//! owns the context exclusively for the duration of a run and hands it back
//! afterward; on failure the context returned alongside the error holds
//! everything accumulated up to the failure point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotation::AnnotationRecord;
use crate::{Error, Result};

/// One document submitted for processing through a full pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    id: String,
    document_text: String,
    annotations: BTreeMap<String, Vec<AnnotationRecord>>,
}

impl JobContext {
    /// Create a context for a document, with an empty annotation store
    pub fn new(document_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_text: document_text.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// Unique job id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The input document text
    pub fn document_text(&self) -> &str {
        &self.document_text
    }

    /// Append records under `kind`, preserving arrival order
    ///
    /// Fails with [`Error::InvalidKind`] when `kind` is empty.
    pub fn add_annotations(
        &mut self,
        kind: &str,
        records: Vec<AnnotationRecord>,
    ) -> Result<()> {
        if kind.trim().is_empty() {
            return Err(Error::InvalidKind(
                "annotation kind must not be empty".to_string(),
            ));
        }
        self.annotations
            .entry(kind.to_string())
            .or_default()
            .extend(records);
        Ok(())
    }

    /// Stored records for `kind`, or an empty slice if the kind is absent
    ///
    /// Never fails; a missing kind is a normal outcome.
    pub fn get(&self, kind: &str) -> &[AnnotationRecord] {
        self.annotations
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Kinds present on this context, in sorted order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.annotations.keys().map(String::as_str)
    }

    /// Total number of stored annotation records across all kinds
    pub fn annotation_count(&self) -> usize {
        self.annotations.values().map(Vec::len).sum()
    }

    /// All stored records, flattened in kind order then arrival order
    ///
    /// This is the "annotations so far" view a stage request carries.
    pub fn all_annotations(&self) -> Vec<AnnotationRecord> {
        self.annotations.values().flatten().cloned().collect()
    }
}
