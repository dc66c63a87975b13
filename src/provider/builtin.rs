//! Built-in OpenAI-compatible providers.

use super::registry::{CredentialResolver, EndpointStyle, ProviderRegistry, Quirk, Quirks};

/// (name, base URL) for every provider known at startup.
///
/// groq, baseten, siliconflow, deepinfra and huggingface currently return
/// no top-logprobs on the chat endpoint; they are kept so aliases and
/// quirk patches can target them.
pub const BUILTIN_PROVIDERS: &[(&str, &str)] = &[
    ("lmstudio", "http://localhost:1234/v1"),
    ("openrouter", "https://openrouter.ai/api/v1"),
    ("hyperbolic", "https://api.hyperbolic.xyz/v1"),
    ("fireworks", "https://api.fireworks.ai/inference/v1"),
    ("together", "https://api.together.xyz/v1"),
    ("openai", "https://api.openai.com/v1"),
    ("xai", "https://api.x.ai/v1/"),
    ("google", "https://generativelanguage.googleapis.com/v1beta/"),
    ("cerebras", "https://api.cerebras.ai/v1"),
    ("novita", "https://api.novita.ai/openai"),
    ("groq", "https://api.groq.com/openai/v1"),
    ("baseten", "https://inference.baseten.co/v1"),
    ("siliconflow", "https://api.siliconflow.com/v1"),
    ("deepinfra", "https://api.deepinfra.com/v1/openai"),
    ("huggingface", "https://router.huggingface.co/v1"),
    ("nebius", "https://api.tokenfactory.nebius.com/v1/"),
];

fn builtin_quirks(provider: &str) -> Option<Quirks> {
    let q = Quirks::default();
    let quirks = match provider {
        "lmstudio" => q
            .with(Quirk::Endpoint(EndpointStyle::Responses))
            .with(Quirk::MaxTokens(2)),
        "openai" => q.with(Quirk::MaxTokens(16)),
        "xai" => q.with(Quirk::TopLogprobs(8)),
        "fireworks" => q.with(Quirk::TopLogprobs(5)),
        // Cerebras rejects an exact zero temperature.
        "cerebras" => q.with(Quirk::Temperature(1e-8)),
        "huggingface" => q.with(Quirk::ApiKey(CredentialResolver::EnvVar("HF_TOKEN".into()))),
        _ => return None,
    };
    Some(quirks)
}

/// Register every built-in provider into `registry`.
pub fn register_builtin(registry: &ProviderRegistry) {
    for (name, base_url) in BUILTIN_PROVIDERS {
        registry.register_provider(name, base_url, builtin_quirks(name));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
