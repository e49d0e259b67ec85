//! HTTP generation backend

use crate::settings::BackendConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studio_artifact::{DeploymentHandle, PreviewHandle};
use studio_core::{
    GenerationClient, GenerationError, GenerationOutput, GenerationRequest, RequestDescription,
};

/// Body POSTed for every variant
#[derive(Debug, Serialize)]
struct GeneratePayload<'a> {
    batch: String,
    slot: usize,
    batch_size: usize,
    model: &'a str,
    instructions: &'a str,
    request: &'a RequestDescription,
}

impl<'a> From<&'a GenerationRequest> for GeneratePayload<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            batch: request.batch.to_string(),
            slot: request.slot,
            batch_size: request.batch_size,
            model: &request.model,
            instructions: &request.instructions,
            request: &request.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    source: String,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    deployment_url: Option<String>,
    #[serde(default)]
    deployment_id: Option<String>,
}

impl From<GenerateResponse> for GenerationOutput {
    fn from(response: GenerateResponse) -> Self {
        let mut output = GenerationOutput::new(response.source);
        if let Some(url) = response.preview_url {
            output = output.with_preview(PreviewHandle::new(url));
        }
        if let Some(url) = response.deployment_url {
            let mut deployment = DeploymentHandle::new(url);
            if let Some(id) = response.deployment_id {
                deployment = deployment.with_id(id);
            }
            output = output.with_deployment(deployment);
        }
        output
    }
}

/// Generation client that calls a JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGenerationClient {
    /// Create a client for an endpoint
    ///
    /// # Errors
    /// Fails if the underlying HTTP client cannot be built
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::build(endpoint.into(), None, None)
    }

    /// Create from the `[backend]` table
    ///
    /// # Errors
    /// Fails if no endpoint is configured or the key variable is missing
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .context("no backend endpoint configured; set [backend].endpoint or use --offline")?;
        Self::build(endpoint, config.api_key()?, config.request_timeout())
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build(endpoint: String, api_key: Option<String>, timeout: Option<std::time::Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!("studio/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        let mut call = self
            .client
            .post(&self.endpoint)
            .json(&GeneratePayload::from(request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        tracing::debug!(endpoint = %self.endpoint, batch = %request.batch, slot = request.slot, "POST generate");
        let response = call
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend(format!("{status}: {}", body.trim())));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidArtifact(format!("malformed response: {e}")))?;
        Ok(parsed.into())
    }
}
