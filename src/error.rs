//! Error taxonomy for LOGPROBE.
//!
//! Configuration and format problems are detected before any network
//! call. Upstream failures carry the provider's status and message and
//! are never retried by this crate.

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for LOGPROBE.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Unknown provider, or patching a provider that was never registered.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed model identifier.
    #[error("Format error: {0}")]
    Format(String),

    /// The remote API rejected the request or could not be reached.
    #[error("Upstream error ({provider}){}: {message}", status_suffix(.status))]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Strict anchor mode was requested but no anchor appeared in the output.
    #[error("Reasoning anchor missing for {model} (expected one of {anchors:?})")]
    SignalMissing { model: String, anchors: Vec<String> },

    /// The provider answered 2xx but the body lacks the expected shape.
    #[error("Malformed response ({provider}): {message}")]
    MalformedResponse { provider: String, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" HTTP {code}"),
        None => String::new(),
    }
}

impl ProbeError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        ProbeError::Configuration(msg.into())
    }

    pub(crate) fn upstream(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        ProbeError::Upstream {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(provider: &str, message: impl Into<String>) -> Self {
        ProbeError::MalformedResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status reported by the provider, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProbeError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

/// Alias for `Result<T, ProbeError>`.
pub type Result<T> = std::result::Result<T, ProbeError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
