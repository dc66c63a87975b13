//! Completion client capability.
//!
//! Defines the `CompletionBackend` trait the dispatcher calls through, the
//! OpenAI-compatible request/response shapes for both endpoint styles, and
//! the factory used to build one backend per model identifier.

pub mod cache;
pub mod http;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::types::TokenLogprob;

/// `include` entry asking the responses endpoint for output logprobs.
pub const INCLUDE_OUTPUT_LOGPROBS: &str = "message.output_text.logprobs";

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatMessage>,
    #[serde(default)]
    pub logprobs: Option<ChoiceLogprobs>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceLogprobs {
    #[serde(default)]
    pub content: Option<Vec<TokenLogprob>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
    #[serde(default)]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u32,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
    pub top_logprobs: u32,
    pub include: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}

impl ResponsesResponse {
    /// The first `output_text` part of the first message item. Reasoning
    /// items are skipped.
    pub fn output_text(&self) -> Option<&OutputContent> {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .find(|part| part.kind == "output_text")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub logprobs: Vec<TokenLogprob>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub input_tokens_details: Option<PromptTokensDetails>,
    #[serde(default)]
    pub output_tokens_details: Option<CompletionTokensDetails>,
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// An OpenAI-compatible completion client bound to one provider endpoint.
///
/// Implementors must report any rejected request as
/// [`crate::ProbeError::Upstream`] and must not retry on their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// `POST /chat/completions`
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// `POST /responses`
    async fn create_response(&self, request: &ResponsesRequest) -> Result<ResponsesResponse>;
}

/// Everything needed to construct a backend for one model identifier.
#[derive(Debug)]
pub struct BackendTarget {
    pub model: String,
    pub provider: String,
    pub base_url: String,
    pub api_key: SecretString,
}

/// Builds backends for the client cache.
pub trait BackendFactory: Send + Sync {
    fn build(&self, target: BackendTarget) -> Result<Arc<dyn CompletionBackend>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
