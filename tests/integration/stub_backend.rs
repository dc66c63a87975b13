//! Stub completion backend for integration testing.
//!
//! Provides a deterministic `CompletionBackend` that answers every request
//! from a fixed token script, truncating each position's alternatives to
//! the requested top-K like a real provider would. No network involved.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use logprobe::client::{
    BackendFactory, BackendTarget, ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChatUsage,
    ChoiceLogprobs, CompletionBackend, OutputContent, OutputItem, ResponsesRequest,
    ResponsesResponse, ResponsesUsage,
};
use logprobe::{ProbeError, Result, TokenCandidate, TokenLogprob};

/// A scripted provider.
///
/// Each script entry is one generated token with its full ranked list of
/// alternatives (descending probability).
pub struct StubBackend {
    provider: String,
    script: Vec<(String, Vec<(String, f64)>)>,
    /// Requests asking for more alternatives than this are rejected.
    max_top_logprobs: u32,
    calls: AtomicUsize,
    last_chat: Mutex<Option<ChatRequest>>,
    last_responses: Mutex<Option<ResponsesRequest>>,
}

impl StubBackend {
    pub fn new(provider: &str, script: &[(&str, &[(&str, f64)])]) -> Self {
        Self {
            provider: provider.to_string(),
            script: script
                .iter()
                .map(|(tok, alts)| {
                    (
                        tok.to_string(),
                        alts.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
                    )
                })
                .collect(),
            max_top_logprobs: 20,
            calls: AtomicUsize::new(0),
            last_chat: Mutex::new(None),
            last_responses: Mutex::new(None),
        }
    }

    pub fn with_ceiling(mut self, max_top_logprobs: u32) -> Self {
        self.max_top_logprobs = max_top_logprobs;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_chat(&self) -> Option<ChatRequest> {
        self.last_chat.lock().unwrap().clone()
    }

    pub fn last_responses(&self) -> Option<ResponsesRequest> {
        self.last_responses.lock().unwrap().clone()
    }

    fn tokens(&self, top_k: u32, max_tokens: u32) -> Result<Vec<TokenLogprob>> {
        if top_k > self.max_top_logprobs {
            return Err(ProbeError::Upstream {
                provider: self.provider.clone(),
                status: Some(400),
                message: format!("top_logprobs must be <= {}", self.max_top_logprobs),
            });
        }
        Ok(self
            .script
            .iter()
            .take(max_tokens as usize)
            .map(|(tok, alts)| TokenLogprob {
                token: tok.clone(),
                logprob: alts.first().map_or(0.0, |(_, p)| p.ln()),
                top_logprobs: alts
                    .iter()
                    .take(top_k as usize)
                    .map(|(t, p)| TokenCandidate::new(t.clone(), p.ln()))
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl CompletionBackend for StubBackend {
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_chat.lock().unwrap() = Some(request.clone());
        let top_k = request.top_logprobs.unwrap_or(0);
        let tokens = self.tokens(top_k, request.max_tokens)?;
        let completion_tokens = tokens.len() as u32;
        let logprobs = request.logprobs.unwrap_or(false).then(|| ChoiceLogprobs {
            content: Some(tokens),
        });

        Ok(ChatResponse {
            model: Some(request.model.clone()),
            choices: vec![ChatChoice {
                message: Some(ChatMessage {
                    role: "assistant".into(),
                    content: None,
                }),
                logprobs,
                finish_reason: Some("length".into()),
            }],
            usage: Some(ChatUsage {
                prompt_tokens: request.messages.len() as u32 * 10,
                completion_tokens,
                ..Default::default()
            }),
        })
    }

    async fn create_response(&self, request: &ResponsesRequest) -> Result<ResponsesResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_responses.lock().unwrap() = Some(request.clone());
        let tokens = self.tokens(request.top_logprobs, request.max_output_tokens)?;
        let output_tokens = tokens.len() as u32;

        Ok(ResponsesResponse {
            model: Some(request.model.clone()),
            output: vec![OutputItem {
                kind: "message".into(),
                content: vec![OutputContent {
                    kind: "output_text".into(),
                    text: None,
                    logprobs: tokens,
                }],
            }],
            usage: Some(ResponsesUsage {
                input_tokens: 10,
                output_tokens,
                ..Default::default()
            }),
        })
    }
}

/// Factory handing out one shared stub and recording every target it saw.
pub struct StubFactory {
    backend: Arc<StubBackend>,
    pub targets: Mutex<Vec<(String, String)>>,
}

impl StubFactory {
    pub fn new(backend: Arc<StubBackend>) -> Self {
        Self {
            backend,
            targets: Mutex::new(Vec::new()),
        }
    }
}

impl BackendFactory for StubFactory {
    fn build(&self, target: BackendTarget) -> Result<Arc<dyn CompletionBackend>> {
        self.targets
            .lock()
            .unwrap()
            .push((target.model, target.base_url));
        Ok(self.backend.clone())
    }
}
