//! Configuration loading from TOML.
//!
//! Reads an optional `logprobe.toml` with request defaults, extra
//! providers and aliases, and applies it on top of a `ProviderRegistry`.
//! Credentials are referenced by env-var name, never stored in the file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use tracing::{info, warn};

use crate::dispatch::RequestDefaults;
use crate::error::{ProbeError, Result};
use crate::provider::{CredentialResolver, ProviderRegistry, Quirks};

/// Default config file name looked up by the binary.
pub const DEFAULT_CONFIG_FILE: &str = "logprobe.toml";

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProbeConfig {
    pub defaults: RequestDefaults,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub aliases: BTreeMap<String, AliasConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Read the key from this variable instead of `{PROVIDER}_API_KEY`.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(flatten)]
    pub quirks: Quirks,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AliasConfig {
    pub source: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(flatten)]
    pub quirks: Quirks,
}

/// Keys `Quirks` accepts when flattened into a provider or alias table.
const QUIRK_KEYS: [&str; 8] = [
    "endpoint",
    "max_tokens",
    "max_tokens_reasoning",
    "top_logprobs",
    "temperature",
    "logprobs",
    "anchors",
    "require_anchor",
];

const TOP_LEVEL_KEYS: [&str; 3] = ["defaults", "providers", "aliases"];

/// `[defaults]` shares its key names with the quirks.
const DEFAULTS_KEYS: [&str; 8] = QUIRK_KEYS;

const PROVIDER_KEYS: [&str; 2] = ["base_url", "api_key_env"];
const ALIAS_KEYS: [&str; 2] = ["source", "api_key_env"];

/// Dotted paths of keys that no config section recognises.
///
/// Flattened quirks drop unknown keys during deserialization; this scans
/// the raw table instead. Unparseable input yields no keys.
pub fn unknown_keys(contents: &str) -> Vec<String> {
    let Ok(root) = contents.parse::<toml::Table>() else {
        return Vec::new();
    };
    let mut unknown = Vec::new();
    for (key, value) in &root {
        match key.as_str() {
            "defaults" => collect_unknown(&mut unknown, "defaults", value, &DEFAULTS_KEYS, &[]),
            "providers" | "aliases" => {
                let extra: &[&str] = if key == "providers" {
                    &PROVIDER_KEYS
                } else {
                    &ALIAS_KEYS
                };
                if let Some(entries) = value.as_table() {
                    for (name, entry) in entries {
                        let path = format!("{key}.{name}");
                        collect_unknown(&mut unknown, &path, entry, &QUIRK_KEYS, extra);
                    }
                }
            }
            other if !TOP_LEVEL_KEYS.contains(&other) => unknown.push(other.to_string()),
            _ => {}
        }
    }
    unknown
}

fn collect_unknown(
    unknown: &mut Vec<String>,
    path: &str,
    value: &toml::Value,
    known: &[&str],
    extra: &[&str],
) {
    let Some(table) = value.as_table() else {
        return;
    };
    unknown.extend(
        table
            .keys()
            .filter(|k| !known.contains(&k.as_str()) && !extra.contains(&k.as_str()))
            .map(|k| format!("{path}.{k}")),
    );
}

fn with_key_env(quirks: &Quirks, api_key_env: &Option<String>) -> Quirks {
    let mut quirks = quirks.clone();
    if let Some(var) = api_key_env {
        quirks.api_key = Some(CredentialResolver::EnvVar(var.clone()));
    }
    quirks
}

impl ProbeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ProbeError::configuration(format!("Failed to read config file {path}: {e}"))
        })?;
        Self::parse(&contents)
            .map_err(|e| ProbeError::configuration(format!("Failed to parse config file {path}: {e}")))
    }

    /// Parse TOML text. Unrecognised keys are logged and otherwise ignored.
    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        let config = toml::from_str(contents)?;
        for key in unknown_keys(contents) {
            warn!(key = %key, "Ignoring unknown configuration key");
        }
        Ok(config)
    }

    /// Register providers, then aliases (which may refer to them).
    pub fn apply(&self, registry: &ProviderRegistry) -> Result<()> {
        for (name, provider) in &self.providers {
            let quirks = with_key_env(&provider.quirks, &provider.api_key_env);
            registry.register_provider(name, &provider.base_url, Some(quirks));
        }
        for (alias, cfg) in &self.aliases {
            let quirks = with_key_env(&cfg.quirks, &cfg.api_key_env);
            registry.register_alias(alias, &cfg.source, Some(quirks))?;
        }
        info!(
            providers = self.providers.len(),
            aliases = self.aliases.len(),
            "Configuration applied"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EndpointStyle;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
        [defaults]
        top_logprobs = 10
        max_tokens_reasoning = 2048

        [providers.vllm]
        base_url = "http://gpu-box:8000/v1"
        endpoint = "responses"
        max_tokens = 4
        anchors = ["<|end_thought|>"]

        [aliases.openai_team]
        source = "openai"
        api_key_env = "OPENAI_TEAM_KEY"
        max_tokens = 8
    "#;

    #[test]
    fn test_parse_sample() {
        let cfg = ProbeConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.defaults.top_logprobs, 10);
        assert_eq!(cfg.defaults.max_tokens_reasoning, 2048);
        assert_eq!(cfg.defaults.max_tokens, 1);
        assert_eq!(cfg.defaults.temperature, 0.0);
        let vllm = &cfg.providers["vllm"];
        assert_eq!(vllm.quirks.endpoint, Some(EndpointStyle::Responses));
        assert_eq!(vllm.quirks.max_tokens, Some(4));
        assert_eq!(cfg.aliases["openai_team"].source, "openai");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = ProbeConfig::parse("").unwrap();
        assert_eq!(cfg.defaults, RequestDefaults::default());
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn test_apply_registers_providers_and_aliases() {
        std::env::set_var("OPENAI_TEAM_KEY", "sk-team");
        let registry = ProviderRegistry::with_builtin_providers();
        ProbeConfig::parse(SAMPLE).unwrap().apply(&registry).unwrap();

        assert_eq!(registry.base_url("vllm:llama").unwrap(), "http://gpu-box:8000/v1");
        let alias = registry.quirks("openai_team").unwrap();
        assert_eq!(alias.max_tokens, Some(8));
        assert_eq!(
            registry.api_key("openai_team:gpt-4.1-nano").unwrap().expose_secret(),
            "sk-team"
        );
    }

    #[test]
    fn test_alias_to_unknown_source_fails() {
        let cfg = ProbeConfig::parse(
            r#"
            [aliases.orphan]
            source = "nobody"
            "#,
        )
        .unwrap();
        let err = cfg.apply(&ProviderRegistry::new()).unwrap_err();
        assert!(matches!(err, ProbeError::Configuration(_)));
    }

    #[test]
    fn test_sample_has_no_unknown_keys() {
        assert!(unknown_keys(SAMPLE).is_empty());
        assert!(unknown_keys("").is_empty());
    }

    #[test]
    fn test_every_known_key_is_accepted() {
        let full = r#"
            [defaults]
            temperature = 0.0
            max_tokens = 1
            max_tokens_reasoning = 4096
            top_logprobs = 20
            endpoint = "chat"
            logprobs = true
            anchors = ["</think>"]
            require_anchor = false

            [providers.full]
            base_url = "http://localhost:1234/v1"
            api_key_env = "FULL_KEY"
            endpoint = "responses"
            max_tokens = 2
            max_tokens_reasoning = 1024
            top_logprobs = 5
            temperature = 1e-8
            logprobs = false
            anchors = ["<|end|>"]
            require_anchor = true

            [aliases.copy]
            source = "full"
            api_key_env = "COPY_KEY"
            top_logprobs = 3
        "#;
        assert!(ProbeConfig::parse(full).is_ok());
        assert!(unknown_keys(full).is_empty());
    }

    #[test]
    fn test_misspelt_keys_are_reported() {
        let contents = r#"
            [defaults]
            top_logprob = 5

            [providers.vllm]
            base_url = "http://gpu-box:8000/v1"
            max_token = 4

            [aliases.team]
            source = "openai"
            sorce = "openai"

            [provider.typo]
            base_url = "http://x/v1"
        "#;
        let cfg = ProbeConfig::parse(contents).unwrap();
        // Misspelt keys fall through to the defaults.
        assert_eq!(cfg.defaults.top_logprobs, 20);
        assert_eq!(cfg.providers["vllm"].quirks.max_tokens, None);

        let mut found = unknown_keys(contents);
        found.sort();
        assert_eq!(
            found,
            vec![
                "aliases.team.sorce".to_string(),
                "defaults.top_logprob".to_string(),
                "provider".to_string(),
                "providers.vllm.max_token".to_string(),
            ]
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = ProbeConfig::load("/nonexistent/logprobe.toml").unwrap_err();
        assert!(matches!(err, ProbeError::Configuration(_)));
    }
}
