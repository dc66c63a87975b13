//! Model identifier parsing.
//!
//! Identifiers have the shape `provider:model-name[:aux-tags]`. The
//! auxiliary field is free text; a feature counts as requested when its
//! name appears anywhere in it. This is a plain membership test, not
//! keyword parsing.

use std::fmt;

use crate::error::{ProbeError, Result};

/// Auxiliary tags that request hidden reasoning before the answer.
const REASONING_TAGS: [&str; 2] = ["thinking", "reasoning"];

/// A parsed `provider:model-name[:aux-tags]` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    raw: String,
    provider: String,
    name: String,
    aux: String,
}

impl ModelId {
    pub fn parse(id: &str) -> Result<Self> {
        let mut parts = id.split(':');
        let provider = parts.next().unwrap_or_default();
        let name = parts
            .next()
            .ok_or_else(|| ProbeError::Format(format!("Missing model name in identifier: {id:?}")))?;
        if provider.is_empty() {
            return Err(ProbeError::Format(format!("Missing provider in identifier: {id:?}")));
        }
        if name.is_empty() {
            return Err(ProbeError::Format(format!("Missing model name in identifier: {id:?}")));
        }
        let aux = parts.next().unwrap_or_default();

        Ok(Self {
            raw: id.to_string(),
            provider: provider.to_string(),
            name: name.to_string(),
            aux: aux.to_string(),
        })
    }

    /// The full identifier as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Underlying model name sent to the provider.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Auxiliary tag field, empty when absent.
    pub fn aux(&self) -> &str {
        &self.aux
    }

    /// Whether `feature` appears as a substring of the auxiliary field.
    pub fn has_feature(&self, feature: &str) -> bool {
        !feature.is_empty() && self.aux.contains(feature)
    }

    pub fn wants_reasoning(&self) -> bool {
        REASONING_TAGS.iter().any(|tag| self.has_feature(tag))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Provider part of an identifier: everything before the first colon.
pub fn provider_name(id: &str) -> &str {
    id.split(':').next().unwrap_or_default()
}

/// Second colon-delimited field. Missing or empty is a `Format` error.
pub fn model_name(id: &str) -> Result<String> {
    id.split(':')
        .nth(1)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProbeError::Format(format!("Missing model name in identifier: {id:?}")))
}

/// Third colon-delimited field, or an empty string.
pub fn model_aux_str(id: &str) -> String {
    id.split(':').nth(2).unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
