//! LOGPROBE: answer probabilities from provider token log-probabilities.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod locate;
pub mod parallel;
pub mod probability;
pub mod provider;
pub mod types;

pub use dispatch::{CompletionRequest, Dispatcher, RequestDefaults, RequestOptions};
pub use error::{ProbeError, Result};
pub use probability::get_probability;
pub use provider::{CredentialResolver, EndpointStyle, ModelId, ProviderRegistry, Quirk, Quirks};
pub use types::{ResponseEnvelope, TokenCandidate, TokenLogprob};
