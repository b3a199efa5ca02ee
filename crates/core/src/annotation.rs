//! Annotation records and the kind registry
//!
//! An [`AnnotationRecord`] is a typed fact about a span of the input
//! document, produced by a stage. Records are append-only: created from a
//! stage's response and never mutated after insertion into a job context.
//!
//! The [`KindRegistry`] resolves annotation-kind names to interned
//! [`AnnotationKind`] handles at configuration time, so callers extract
//! results through a statically known handle instead of a runtime name
//! lookup. A name that was never registered is a normal outcome, not an
//! error.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Half-open character span into the job's document text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start offset, inclusive
    pub start: usize,
    /// End offset, exclusive
    pub end: usize,
}

impl Span {
    /// Create a span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// One annotation produced by a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Annotation kind name (e.g. "Sentiment", "Sarcasm")
    pub kind: String,

    /// Document span the annotation covers
    pub span: Span,

    /// Stage-defined payload fields
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl AnnotationRecord {
    /// Create a record with no payload fields
    pub fn new(kind: impl Into<String>, span: Span) -> Self {
        Self {
            kind: kind.into(),
            span,
            fields: BTreeMap::new(),
        }
    }

    /// Add a payload field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Interned handle for a registered annotation kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationKind(Arc<str>);

impl AnnotationKind {
    /// Kind name this handle resolves
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Configuration-time registry of known annotation kinds
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, AnnotationKind>,
}

impl KindRegistry {
    /// Create an empty kind registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind name, returning its interned handle
    ///
    /// Registering the same name twice returns the existing handle. Fails
    /// with [`Error::InvalidKind`] on an empty name.
    pub fn register(&mut self, name: impl Into<String>) -> Result<AnnotationKind> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidKind(
                "annotation kind name must not be empty".to_string(),
            ));
        }
        let kind = self
            .kinds
            .entry(name.clone())
            .or_insert_with(|| AnnotationKind(Arc::from(name.as_str())));
        Ok(kind.clone())
    }

    /// Resolve a previously registered kind name
    pub fn resolve(&self, name: &str) -> Option<AnnotationKind> {
        self.kinds.get(name).cloned()
    }

    /// Iterate over registered kind names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}
