//! Request dispatcher.
//!
//! Resolves a model identifier into an effective `CompletionRequest`
//! (defaults < provider quirks < call overrides < reasoning floor), calls
//! the provider through the cached backend, and wraps the reply in a
//! `ResponseEnvelope` with the answer-position candidates located.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::cache::ClientCache;
use crate::client::http::HttpBackendFactory;
use crate::client::{
    BackendFactory, ChatMessage, ChatRequest, ChatResponse, CompletionBackend, ResponsesRequest,
    ResponsesResponse, INCLUDE_OUTPUT_LOGPROBS,
};
use crate::error::{ProbeError, Result};
use crate::locate::{self, AnchorSet, DEFAULT_ANCHORS};
use crate::provider::{EndpointStyle, ModelId, ProviderRegistry, Quirks};
use crate::types::{AuxInfo, RawResponse, ResponseEnvelope, TokenLogprob};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Built-in request defaults, the lowest-priority layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestDefaults {
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_tokens_reasoning: u32,
    pub top_logprobs: u32,
    pub endpoint: EndpointStyle,
    pub logprobs: bool,
    pub anchors: Vec<String>,
    pub require_anchor: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 1,
            max_tokens_reasoning: 4096,
            top_logprobs: 20,
            endpoint: EndpointStyle::Chat,
            logprobs: true,
            anchors: DEFAULT_ANCHORS.iter().map(|a| a.to_string()).collect(),
            require_anchor: false,
        }
    }
}

/// Per-call overrides. Set fields win over provider quirks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub max_tokens_reasoning: Option<u32>,
    pub top_logprobs: Option<u32>,
    pub endpoint: Option<EndpointStyle>,
    pub logprobs: Option<bool>,
    pub require_anchor: Option<bool>,
}

impl RequestOptions {
    pub fn top_logprobs(mut self, n: u32) -> Self {
        self.top_logprobs = Some(n);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn temperature(mut self, t: f64) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn endpoint(mut self, endpoint: EndpointStyle) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn require_anchor(mut self, strict: bool) -> Self {
        self.require_anchor = Some(strict);
        self
    }
}

/// Effective parameters for one call. Derived fresh, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: ModelId,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_logprobs: u32,
    pub endpoint: EndpointStyle,
    pub logprobs: bool,
    pub reasoning: bool,
    pub anchors: AnchorSet,
    pub require_anchor: bool,
}

impl CompletionRequest {
    pub fn resolve(
        model: ModelId,
        defaults: &RequestDefaults,
        quirks: &Quirks,
        overrides: &RequestOptions,
    ) -> Self {
        let reasoning = model.wants_reasoning();

        let mut max_tokens = overrides
            .max_tokens
            .or(quirks.max_tokens)
            .unwrap_or(defaults.max_tokens);
        if reasoning {
            // Hidden reasoning is spent before the first visible token.
            let floor = overrides
                .max_tokens_reasoning
                .or(quirks.max_tokens_reasoning)
                .unwrap_or(defaults.max_tokens_reasoning);
            max_tokens = max_tokens.max(floor);
        }

        let mut anchors = AnchorSet::new(defaults.anchors.iter().cloned());
        if let Some(extra) = &quirks.anchors {
            anchors.extend(extra.iter().cloned());
        }

        Self {
            temperature: overrides
                .temperature
                .or(quirks.temperature)
                .unwrap_or(defaults.temperature),
            max_tokens,
            top_logprobs: overrides
                .top_logprobs
                .or(quirks.top_logprobs)
                .unwrap_or(defaults.top_logprobs),
            endpoint: overrides
                .endpoint
                .or(quirks.endpoint)
                .unwrap_or(defaults.endpoint),
            logprobs: overrides
                .logprobs
                .or(quirks.logprobs)
                .unwrap_or(defaults.logprobs),
            require_anchor: overrides
                .require_anchor
                .or(quirks.require_anchor)
                .unwrap_or(defaults.require_anchor),
            reasoning,
            anchors,
            model,
        }
    }

    pub fn to_chat(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.name().to_string(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            logprobs: Some(self.logprobs),
            top_logprobs: self.logprobs.then_some(self.top_logprobs),
        }
    }

    pub fn to_responses(&self, prompt: &str) -> ResponsesRequest {
        ResponsesRequest {
            model: self.model.name().to_string(),
            input: prompt.to_string(),
            temperature: self.temperature,
            max_output_tokens: self.max_tokens,
            top_logprobs: self.top_logprobs,
            include: vec![INCLUDE_OUTPUT_LOGPROBS.to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    clients: ClientCache,
    defaults: RequestDefaults,
}

impl Dispatcher {
    /// Dispatcher calling providers over HTTP.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::with_factory(registry, Arc::new(HttpBackendFactory))
    }

    pub fn with_factory(registry: Arc<ProviderRegistry>, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            registry,
            clients: ClientCache::new(factory),
            defaults: RequestDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.defaults
    }

    /// Effective request for `model`, without touching the network.
    pub fn resolve_request(&self, model: &str, overrides: &RequestOptions) -> Result<CompletionRequest> {
        let id = ModelId::parse(model)?;
        let entry = self.registry.resolve(model)?;
        Ok(CompletionRequest::resolve(id, &self.defaults, &entry.quirks, overrides))
    }

    /// Send `prompt` to `model` and return the envelope with the answer
    /// position located.
    pub async fn get_completion(
        &self,
        model: &str,
        prompt: &str,
        overrides: &RequestOptions,
    ) -> Result<ResponseEnvelope> {
        let id = ModelId::parse(model)?;
        let entry = self.registry.resolve(model)?;
        let request = CompletionRequest::resolve(id, &self.defaults, &entry.quirks, overrides);
        let client = self.clients.get_or_build(model, &entry)?;

        debug!(
            model,
            endpoint = %request.endpoint,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            top_logprobs = request.top_logprobs,
            reasoning = request.reasoning,
            "Dispatching completion"
        );

        let envelope = match request.endpoint {
            EndpointStyle::Chat => self.call_chat(client.as_ref(), &request, prompt).await?,
            EndpointStyle::Responses => self.call_responses(client.as_ref(), &request, prompt).await?,
        };

        info!(
            model,
            rtt_ms = envelope.aux().rtt.as_millis() as u64,
            input_tokens = envelope.aux().input_tokens,
            output_tokens = envelope.aux().output_tokens,
            reasoning_tokens = envelope.aux().reasoning_tokens,
            candidates = envelope.logprobs().len(),
            "Completion received"
        );

        Ok(envelope)
    }

    /// Same as [`Dispatcher::get_completion`].
    pub async fn get_logprobs_response(
        &self,
        model: &str,
        prompt: &str,
        overrides: &RequestOptions,
    ) -> Result<ResponseEnvelope> {
        self.get_completion(model, prompt, overrides).await
    }

    /// Probability that `model` answers `prompt` with `answer`.
    pub async fn probability(
        &self,
        model: &str,
        prompt: &str,
        answer: &str,
        overrides: &RequestOptions,
    ) -> Result<f64> {
        let envelope = self.get_completion(model, prompt, overrides).await?;
        Ok(envelope.probability(answer))
    }

    async fn call_chat(
        &self,
        client: &dyn CompletionBackend,
        request: &CompletionRequest,
        prompt: &str,
    ) -> Result<ResponseEnvelope> {
        let started = Instant::now();
        let resp = client.chat_completion(&request.to_chat(prompt)).await?;
        let rtt = started.elapsed();
        chat_envelope(request, resp, rtt)
    }

    async fn call_responses(
        &self,
        client: &dyn CompletionBackend,
        request: &CompletionRequest,
        prompt: &str,
    ) -> Result<ResponseEnvelope> {
        let started = Instant::now();
        let resp = client.create_response(&request.to_responses(prompt)).await?;
        let rtt = started.elapsed();
        responses_envelope(request, resp, rtt)
    }
}

// ---------------------------------------------------------------------------
// Envelope construction
// ---------------------------------------------------------------------------

fn located(
    request: &CompletionRequest,
    tokens: &[TokenLogprob],
) -> Result<(Option<usize>, Vec<crate::types::TokenCandidate>)> {
    let model = request.model.as_str();
    let index = if request.require_anchor {
        locate::locate_answer_strict(tokens, &request.anchors, model)?
    } else {
        locate::locate_answer(tokens, &request.anchors)
    };
    let candidates = index
        .map(|i| tokens[i].top_logprobs.clone())
        .unwrap_or_default();
    if candidates.is_empty() {
        warn!(model, tokens = tokens.len(), "No answer-position logprobs in response");
    }
    Ok((index, candidates))
}

fn chat_envelope(
    request: &CompletionRequest,
    resp: ChatResponse,
    rtt: Duration,
) -> Result<ResponseEnvelope> {
    let provider = request.model.provider();
    let choice = resp
        .choices
        .first()
        .ok_or_else(|| ProbeError::malformed(provider, "response has no choices"))?;
    let tokens: &[TokenLogprob] = choice
        .logprobs
        .as_ref()
        .and_then(|l| l.content.as_deref())
        .unwrap_or_default();
    let (answer_index, logprobs) = located(request, tokens)?;

    let usage = resp.usage.clone().unwrap_or_default();
    let aux = AuxInfo {
        rtt,
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        cached_tokens: usage.prompt_tokens_details.map_or(0, |d| d.cached_tokens),
        reasoning_tokens: usage.completion_tokens_details.map_or(0, |d| d.reasoning_tokens),
        logprobs,
        answer_index,
    };
    Ok(ResponseEnvelope::new(request.model.as_str(), RawResponse::Chat(resp), aux))
}

fn responses_envelope(
    request: &CompletionRequest,
    resp: ResponsesResponse,
    rtt: Duration,
) -> Result<ResponseEnvelope> {
    let provider = request.model.provider();
    if resp.output.is_empty() {
        return Err(ProbeError::malformed(provider, "response has no output items"));
    }
    let tokens: &[TokenLogprob] = resp
        .output_text()
        .map(|part| part.logprobs.as_slice())
        .unwrap_or_default();
    let (answer_index, logprobs) = located(request, tokens)?;

    let usage = resp.usage.clone().unwrap_or_default();
    let aux = AuxInfo {
        rtt,
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        cached_tokens: usage.input_tokens_details.map_or(0, |d| d.cached_tokens),
        reasoning_tokens: usage.output_tokens_details.map_or(0, |d| d.reasoning_tokens),
        logprobs,
        answer_index,
    };
    Ok(ResponseEnvelope::new(request.model.as_str(), RawResponse::Responses(resp), aux))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
