//! HTTP/JSON stage transport
//!
//! Implements [`StageClient`] over plain HTTP: the request is POSTed as JSON
//! to the stage's endpoint, the response body is the stage's JSON answer.
//! Timeouts, the retry, and concurrency bounds are the engine's concern; this
//! client performs exactly one exchange per call and reports transport-level
//! problems as [`Error::Transport`].

use async_trait::async_trait;
use url::Url;

use annopipe_core::{Error, Result, StageClient, StageDescriptor, StageRequest, StageResponse};

/// Stage client speaking the JSON request/response contract over HTTP POST
#[derive(Debug, Clone)]
pub struct HttpStageClient {
    client: reqwest::Client,
}

impl HttpStageClient {
    /// Create a client with default connection settings
    ///
    /// No request timeout is set here; the engine bounds every dispatch by
    /// the stage's configured timeout.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from a preconfigured `reqwest::Client`
    ///
    /// Useful for custom TLS, proxy, or connection-pool settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpStageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageClient for HttpStageClient {
    async fn process(
        &self,
        stage: &StageDescriptor,
        request: StageRequest,
    ) -> Result<StageResponse> {
        let url = Url::parse(stage.endpoint()).map_err(|e| {
            Error::transport(format!(
                "invalid endpoint '{}' for stage '{}': {}",
                stage.endpoint(),
                stage.name(),
                e
            ))
        })?;

        tracing::debug!(stage = %stage.name(), %url, "posting stage request");

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::transport(format!("request to stage '{}' failed: {}", stage.name(), e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(format!(
                "stage '{}' answered {}: {}",
                stage.name(),
                status,
                body
            )));
        }

        response.json::<StageResponse>().await.map_err(|e| {
            Error::transport(format!(
                "malformed response from stage '{}': {}",
                stage.name(),
                e
            ))
        })
    }
}
