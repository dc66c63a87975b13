//! Answer-position locator.
//!
//! Some models emit hidden reasoning before the visible answer, closed by
//! a marker token such as `</think>`. The answer position is the first
//! non-blank token after the last marker, or after the start of the stream
//! when no marker is present.

use std::fmt;

use crate::error::{ProbeError, Result};
use crate::types::{TokenCandidate, TokenLogprob};

/// End-of-reasoning markers recognised for every provider.
pub const DEFAULT_ANCHORS: [&str; 2] = ["</think>", "<|message|>"];

// ---------------------------------------------------------------------------
// Anchor set
// ---------------------------------------------------------------------------

/// Tokens that mark the end of a reasoning preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSet {
    anchors: Vec<String>,
}

impl Default for AnchorSet {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHORS)
    }
}

impl AnchorSet {
    pub fn new<I, S>(anchors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self { anchors: Vec::new() };
        set.extend(anchors);
        set
    }

    /// Add markers, skipping blanks and duplicates.
    pub fn extend<I, S>(&mut self, anchors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for anchor in anchors {
            let anchor = anchor.into();
            if !anchor.trim().is_empty() && !self.anchors.contains(&anchor) {
                self.anchors.push(anchor);
            }
        }
    }

    pub fn is_anchor(&self, token: &str) -> bool {
        let token = token.trim();
        self.anchors.iter().any(|a| a == token)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.anchors
    }
}

impl fmt::Display for AnchorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.anchors.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Index of the rightmost anchor token in `tokens`.
pub fn find_anchor(tokens: &[TokenLogprob], anchors: &AnchorSet) -> Option<usize> {
    tokens.iter().rposition(|t| anchors.is_anchor(&t.token))
}

/// Index of the first non-blank token after the last anchor (or from 0).
pub fn locate_answer(tokens: &[TokenLogprob], anchors: &AnchorSet) -> Option<usize> {
    let start = find_anchor(tokens, anchors).map_or(0, |i| i + 1);
    tokens
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, t)| !t.is_blank())
        .map(|(i, _)| i)
}

/// Top-K candidates at the answer position; empty when there is none.
pub fn answer_candidates<'a>(tokens: &'a [TokenLogprob], anchors: &AnchorSet) -> &'a [TokenCandidate] {
    match locate_answer(tokens, anchors) {
        Some(i) => &tokens[i].top_logprobs,
        None => &[],
    }
}

/// Like [`locate_answer`], but a missing anchor is an error.
pub fn locate_answer_strict(
    tokens: &[TokenLogprob],
    anchors: &AnchorSet,
    model: &str,
) -> Result<Option<usize>> {
    if find_anchor(tokens, anchors).is_none() {
        return Err(ProbeError::SignalMissing {
            model: model.to_string(),
            anchors: anchors.as_slice().to_vec(),
        });
    }
    Ok(locate_answer(tokens, anchors))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
