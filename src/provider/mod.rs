//! Provider configuration.
//!
//! Model identifier parsing, the provider registry with its typed quirks
//! and credential resolvers, and the built-in provider table.

pub mod builtin;
pub mod model_id;
pub mod registry;

pub use model_id::{model_aux_str, model_name, provider_name, ModelId};
pub use registry::{
    CredentialResolver, EndpointStyle, ProviderEntry, ProviderRegistry, Quirk, Quirks,
    NO_API_KEY,
};
