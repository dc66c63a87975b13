//! Answer probability from top-K token candidates.
//!
//! Sums `exp(logprob)` over every candidate whose left-trimmed, uppercased
//! text is a prefix of the uppercased answer, clamped to 1.0. Overlapping
//! prefixes ("Y" and "YES") are counted independently, so this is an
//! approximation of P(answer), not a proper measure. Only answers that fit
//! in a single generated token are captured reliably.

use tracing::trace;

use crate::types::{ResponseEnvelope, TokenCandidate};

/// Probability mass of candidates that prefix-match `answer`.
pub fn aggregate(candidates: &[TokenCandidate], answer: &str) -> f64 {
    let answer = answer.to_uppercase();
    let total: f64 = candidates
        .iter()
        .filter(|c| answer.starts_with(&c.token.trim_start().to_uppercase()))
        .map(|c| {
            trace!(token = %c.token, logprob = c.logprob, "Matching candidate");
            c.probability()
        })
        .sum();
    total.min(1.0)
}

/// Probability that `envelope`'s answer position matches `answer`.
pub fn get_probability(envelope: &ResponseEnvelope, answer: &str) -> f64 {
    aggregate(envelope.logprobs(), answer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
