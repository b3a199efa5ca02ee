//! Pipeline manifests
//!
//! Declarative stage lists in YAML or JSON, converted into a validated
//! [`PipelineRegistry`]. A manifest is the setup-time artifact; descriptor
//! validation happens during conversion, so a manifest that parses can still
//! be rejected.
//!
//! ```yaml
//! version: v1
//! name: sarcasm-demo
//! stages:
//!   - name: sarcasm
//!     endpoint: http://localhost:9714/v1/process
//!     scale: 1
//!     timeout_ms: 500
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::registry::PipelineRegistry;
use crate::stage::StageDescriptor;
use crate::{Error, Result};

fn default_version() -> String {
    "v1".to_string()
}

fn default_scale() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// One stage entry in a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage name, unique within the manifest
    pub name: String,

    /// Endpoint address
    pub endpoint: String,

    /// Maximum simultaneous in-flight requests (default 1)
    #[serde(default = "default_scale")]
    pub scale: usize,

    /// Per-request timeout in milliseconds (default 30000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Declarative pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineManifest {
    /// Manifest format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional pipeline name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ordered stage list; manifest order is execution order
    pub stages: Vec<StageSpec>,
}

impl PipelineManifest {
    /// Parse a manifest from YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse YAML manifest: {}", e)))
    }

    /// Parse a manifest from JSON
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a manifest from a file, dispatching on the extension
    ///
    /// `.yaml`/`.yml` parse as YAML, everything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Build a validated registry from this manifest
    ///
    /// Descriptor constraints and name uniqueness are enforced here; the
    /// registry preserves manifest order.
    pub fn build_registry(&self) -> Result<PipelineRegistry> {
        let mut registry = PipelineRegistry::new();
        for spec in &self.stages {
            registry.add(StageDescriptor::try_from(spec.clone())?)?;
        }
        Ok(registry)
    }
}
