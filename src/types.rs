//! Shared types for LOGPROBE.
//!
//! Token candidates as returned by providers, and the response envelope
//! the dispatcher builds around every raw reply.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::client::{ChatResponse, ResponsesResponse};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// One alternative token at an output position, with its log-probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCandidate {
    pub token: String,
    pub logprob: f64,
}

impl TokenCandidate {
    pub fn new(token: impl Into<String>, logprob: f64) -> Self {
        Self {
            token: token.into(),
            logprob,
        }
    }

    /// Linear probability, `exp(logprob)`.
    pub fn probability(&self) -> f64 {
        self.logprob.exp()
    }
}

impl fmt::Display for TokenCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:.2}%)", self.token, self.probability() * 100.0)
    }
}

/// A generated token together with the provider's ranked alternatives.
///
/// Ordering of `top_logprobs` is provider-assigned and preserved as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
    #[serde(default)]
    pub top_logprobs: Vec<TokenCandidate>,
}

impl TokenLogprob {
    /// Whether the token carries no visible text.
    pub fn is_blank(&self) -> bool {
        self.token.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// The provider reply as returned by whichever endpoint style was used.
#[derive(Debug, Clone)]
pub enum RawResponse {
    Chat(ChatResponse),
    Responses(ResponsesResponse),
}

/// Auxiliary record synthesised by the dispatcher. Not part of any wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxInfo {
    pub rtt: Duration,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_tokens: u32,
    pub reasoning_tokens: u32,
    /// Top-K candidates at the located answer position; empty when the
    /// output carried no usable signal.
    pub logprobs: Vec<TokenCandidate>,
    /// Index of the answer token within the output channel, if one was found.
    pub answer_index: Option<usize>,
}

/// Raw reply plus auxiliary record. Built once by the dispatcher, read-only after.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    model: String,
    raw: RawResponse,
    aux: AuxInfo,
}

impl ResponseEnvelope {
    pub fn new(model: impl Into<String>, raw: RawResponse, aux: AuxInfo) -> Self {
        Self {
            model: model.into(),
            raw,
            aux,
        }
    }

    /// The full model identifier the request was made with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn raw(&self) -> &RawResponse {
        &self.raw
    }

    pub fn aux(&self) -> &AuxInfo {
        &self.aux
    }

    /// Candidates at the answer position.
    pub fn logprobs(&self) -> &[TokenCandidate] {
        &self.aux.logprobs
    }

    /// Whether any candidate was found at the answer position.
    pub fn has_signal(&self) -> bool {
        !self.aux.logprobs.is_empty()
    }

    /// Probability that the answer position matches `answer`.
    pub fn probability(&self, answer: &str) -> f64 {
        crate::probability::aggregate(&self.aux.logprobs, answer)
    }
}

impl fmt::Display for ResponseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] rtt: {:.0}ms | in: {} | out: {} | cached: {} | reasoning: {} | candidates: {}",
            self.model,
            self.aux.rtt.as_secs_f64() * 1000.0,
            self.aux.input_tokens,
            self.aux.output_tokens,
            self.aux.cached_tokens,
            self.aux.reasoning_tokens,
            self.aux.logprobs.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
