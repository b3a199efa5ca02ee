//! Stage descriptors
//!
//! A [`StageDescriptor`] declares one remote processing stage: where to reach
//! it, how many requests may be in flight against it at once, and how long to
//! wait for an answer. Descriptors are validated on construction and never
//! mutated after they enter a registry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::manifest::StageSpec;
use crate::{Error, Result};

/// Declaration of one processing stage in a pipeline
///
/// Deserialization goes through [`StageSpec`], so a descriptor read from a
/// manifest carries the same validation as one built with [`new`].
///
/// [`new`]: StageDescriptor::new
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StageSpec")]
pub struct StageDescriptor {
    name: String,
    endpoint: String,
    scale: usize,
    timeout_ms: u64,
}

impl StageDescriptor {
    /// Create a validated stage descriptor
    ///
    /// Fails with [`Error::InvalidConfiguration`] when the name or endpoint
    /// is empty, `scale` is zero, or the timeout is zero.
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        scale: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let endpoint = endpoint.into();

        if name.trim().is_empty() {
            return Err(Error::config("stage name must not be empty"));
        }
        if endpoint.trim().is_empty() {
            return Err(Error::config(format!(
                "stage '{}' has an empty endpoint",
                name
            )));
        }
        if scale == 0 {
            return Err(Error::config(format!(
                "stage '{}' has scale 0, must be >= 1",
                name
            )));
        }
        if timeout.is_zero() {
            return Err(Error::config(format!(
                "stage '{}' has a zero timeout",
                name
            )));
        }

        Ok(Self {
            name,
            endpoint,
            scale,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// Stage name, unique within a registry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint address the stage is reached at
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Maximum simultaneous in-flight requests the engine may issue to this stage
    pub fn scale(&self) -> usize {
        self.scale
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Per-request timeout in milliseconds
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}

impl TryFrom<StageSpec> for StageDescriptor {
    type Error = Error;

    fn try_from(spec: StageSpec) -> Result<Self> {
        StageDescriptor::new(
            spec.name,
            spec.endpoint,
            spec.scale,
            Duration::from_millis(spec.timeout_ms),
        )
    }
}
