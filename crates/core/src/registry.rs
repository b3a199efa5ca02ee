//! Pipeline registry
//!
//! Ordered collection of stage descriptors. Insertion order is execution
//! order. Registries are built once at setup time and treated as immutable
//! during the run phase; no concurrent mutation is supported.

use crate::stage::StageDescriptor;
use crate::{Error, Result};

/// Ordered, name-unique collection of pipeline stages
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    stages: Vec<StageDescriptor>,
}

impl PipelineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage, preserving insertion order
    ///
    /// Fails with [`Error::DuplicateStage`] when a stage of the same name is
    /// already present; the registry is left unchanged in that case.
    pub fn add(&mut self, descriptor: StageDescriptor) -> Result<()> {
        if self.stages.iter().any(|s| s.name() == descriptor.name()) {
            return Err(Error::DuplicateStage {
                name: descriptor.name().to_string(),
            });
        }
        self.stages.push(descriptor);
        Ok(())
    }

    /// Ordered, read-only view of the registered stages
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Look up a stage by name
    pub fn get(&self, name: &str) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.name() == name)
    }

    /// Number of registered stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when no stages are registered
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
