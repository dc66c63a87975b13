//! HTTP backend for OpenAI-compatible providers.
//!
//! Implements `CompletionBackend` over `reqwest` against any base URL that
//! speaks the OpenAI chat completions or responses API. Every non-2xx reply
//! is surfaced as `ProbeError::Upstream`; there are no retries here.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    BackendFactory, BackendTarget, ChatRequest, ChatResponse, CompletionBackend, ResponsesRequest,
    ResponsesResponse,
};
use crate::error::{ProbeError, Result};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const REQUEST_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiCompatClient {
    http: Client,
    provider: String,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiCompatClient {
    pub fn new(provider: &str, base_url: &str, api_key: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                ProbeError::configuration(format!("Failed to build HTTP client for {provider}: {e}"))
            })?;

        Ok(Self {
            http,
            provider: provider.to_string(),
            base_url: base_url.to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` joined with `path`, tolerating a trailing slash on either side.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint_url(path);
        debug!(provider = %self.provider, url = %url, "POST");

        let response = self
            .http
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProbeError::upstream(&self.provider, None, format!("Request error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(provider = %self.provider, status = %status, error = %error_text, "Provider rejected request");
            return Err(ProbeError::upstream(
                &self.provider,
                Some(status.as_u16()),
                error_text,
            ));
        }

        // Decode failures carry no status.
        response.json::<R>().await.map_err(|e| {
            ProbeError::upstream(&self.provider, None, format!("Failed to parse response: {e}"))
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatClient {
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.post("chat/completions", request).await
    }

    async fn create_response(&self, request: &ResponsesRequest) -> Result<ResponsesResponse> {
        self.post("responses", request).await
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Default factory: one `OpenAiCompatClient` per target.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpBackendFactory;

impl BackendFactory for HttpBackendFactory {
    fn build(&self, target: BackendTarget) -> Result<Arc<dyn CompletionBackend>> {
        let client = OpenAiCompatClient::new(&target.provider, &target.base_url, target.api_key)?;
        Ok(Arc::new(client))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
