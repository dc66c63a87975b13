//! Provider registry.
//!
//! Maps provider names to an endpoint base URL and a set of typed quirks.
//! Entries are created at startup (see [`super::builtin`]) or registered
//! at runtime, patched one quirk at a time, and never removed.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use super::model_id::provider_name;
use crate::error::{ProbeError, Result};

/// Credential used when no source provides one. Local providers ignore it.
pub const NO_API_KEY: &str = "NONE";

// ---------------------------------------------------------------------------
// Quirks
// ---------------------------------------------------------------------------

/// Which completion endpoint a provider is called through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStyle {
    /// `/chat/completions`
    #[default]
    Chat,
    /// `/responses`
    Responses,
}

impl fmt::Display for EndpointStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointStyle::Chat => write!(f, "chat"),
            EndpointStyle::Responses => write!(f, "responses"),
        }
    }
}

/// Provider-supplied credential lookup function, given the full model identifier.
pub type KeyFn = dyn Fn(&str) -> Option<String> + Send + Sync;

/// How a provider's API key is obtained.
#[derive(Clone, Default)]
pub enum CredentialResolver {
    /// `{PROVIDER_UPPER}_API_KEY`.
    #[default]
    Environment,
    /// A specific environment variable, e.g. `HF_TOKEN`.
    EnvVar(String),
    /// A fixed key.
    Static(Arc<SecretString>),
    /// Arbitrary lookup keyed by the full model identifier.
    Custom(Arc<KeyFn>),
}

impl CredentialResolver {
    pub fn fixed(key: impl Into<String>) -> Self {
        CredentialResolver::Static(Arc::new(SecretString::new(key.into())))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        CredentialResolver::Custom(Arc::new(f))
    }

    /// Resolve the key for `model`. Every variant other than `Environment`
    /// fully overrides the default variable; a miss yields [`NO_API_KEY`].
    pub fn resolve(&self, model: &str) -> SecretString {
        let key = match self {
            CredentialResolver::Environment => std::env::var(default_key_var(provider_name(model))).ok(),
            CredentialResolver::EnvVar(var) => std::env::var(var).ok(),
            CredentialResolver::Static(key) => Some(key.expose_secret().clone()),
            CredentialResolver::Custom(f) => f(model),
        };
        SecretString::new(key.unwrap_or_else(|| NO_API_KEY.to_string()))
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialResolver::Environment => write!(f, "Environment"),
            CredentialResolver::EnvVar(var) => f.debug_tuple("EnvVar").field(var).finish(),
            CredentialResolver::Static(_) => write!(f, "Static([REDACTED])"),
            CredentialResolver::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl PartialEq for CredentialResolver {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CredentialResolver::Environment, CredentialResolver::Environment) => true,
            (CredentialResolver::EnvVar(a), CredentialResolver::EnvVar(b)) => a == b,
            (CredentialResolver::Static(a), CredentialResolver::Static(b)) => {
                a.expose_secret() == b.expose_secret()
            }
            (CredentialResolver::Custom(a), CredentialResolver::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Environment variable consulted by default for `provider`.
pub fn default_key_var(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase())
}

/// Per-provider behavioral overrides. Absent fields fall back to the
/// dispatcher's defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Quirks {
    pub endpoint: Option<EndpointStyle>,
    pub max_tokens: Option<u32>,
    /// Minimum output budget when the model identifier requests reasoning.
    pub max_tokens_reasoning: Option<u32>,
    pub top_logprobs: Option<u32>,
    pub temperature: Option<f64>,
    /// Chat style only.
    pub logprobs: Option<bool>,
    /// Extra end-of-reasoning markers, added to the default set.
    pub anchors: Option<Vec<String>>,
    pub require_anchor: Option<bool>,
    #[serde(skip)]
    pub api_key: Option<CredentialResolver>,
}

/// A single quirk, for [`ProviderRegistry::set_quirk`].
#[derive(Debug, Clone, PartialEq)]
pub enum Quirk {
    Endpoint(EndpointStyle),
    MaxTokens(u32),
    MaxTokensReasoning(u32),
    TopLogprobs(u32),
    Temperature(f64),
    Logprobs(bool),
    Anchors(Vec<String>),
    RequireAnchor(bool),
    ApiKey(CredentialResolver),
}

impl Quirks {
    pub fn with(mut self, quirk: Quirk) -> Self {
        self.set(quirk);
        self
    }

    /// Overwrite exactly the field named by `quirk`.
    pub fn set(&mut self, quirk: Quirk) {
        match quirk {
            Quirk::Endpoint(v) => self.endpoint = Some(v),
            Quirk::MaxTokens(v) => self.max_tokens = Some(v),
            Quirk::MaxTokensReasoning(v) => self.max_tokens_reasoning = Some(v),
            Quirk::TopLogprobs(v) => self.top_logprobs = Some(v),
            Quirk::Temperature(v) => self.temperature = Some(v),
            Quirk::Logprobs(v) => self.logprobs = Some(v),
            Quirk::Anchors(v) => self.anchors = Some(v),
            Quirk::RequireAnchor(v) => self.require_anchor = Some(v),
            Quirk::ApiKey(v) => self.api_key = Some(v),
        }
    }

    /// Shallow right-biased merge: fields set in `overlay` win.
    pub fn merged(&self, overlay: &Quirks) -> Quirks {
        Quirks {
            endpoint: overlay.endpoint.or(self.endpoint),
            max_tokens: overlay.max_tokens.or(self.max_tokens),
            max_tokens_reasoning: overlay.max_tokens_reasoning.or(self.max_tokens_reasoning),
            top_logprobs: overlay.top_logprobs.or(self.top_logprobs),
            temperature: overlay.temperature.or(self.temperature),
            logprobs: overlay.logprobs.or(self.logprobs),
            anchors: overlay.anchors.clone().or_else(|| self.anchors.clone()),
            require_anchor: overlay.require_anchor.or(self.require_anchor),
            api_key: overlay.api_key.clone().or_else(|| self.api_key.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Quirks::default()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A registered provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEntry {
    pub name: String,
    pub base_url: String,
    pub quirks: Quirks,
}

impl ProviderEntry {
    /// API key for `model`, resolved through the provider's credential quirk.
    pub fn api_key(&self, model: &str) -> SecretString {
        self.quirks.api_key.clone().unwrap_or_default().resolve(model)
    }
}

/// Provider table shared between the dispatcher and its callers.
///
/// Read-mostly; all writes go through the explicit registration and
/// patch methods below.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, ProviderEntry>>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in providers.
    pub fn with_builtin_providers() -> Self {
        let registry = Self::new();
        super::builtin::register_builtin(&registry);
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderEntry>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderEntry>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace a provider wholesale. `None` quirks means no overrides.
    pub fn register_provider(&self, name: &str, base_url: &str, quirks: Option<Quirks>) {
        let entry = ProviderEntry {
            name: name.to_string(),
            base_url: base_url.to_string(),
            quirks: quirks.unwrap_or_default(),
        };
        let replaced = self.write().insert(name.to_string(), entry).is_some();
        debug!(provider = name, base_url, replaced, "Provider registered");
    }

    /// Copy `source`'s endpoint and quirks under `alias`, with `quirks`
    /// merged on top. The copy is independent of the source afterwards.
    pub fn register_alias(&self, alias: &str, source: &str, quirks: Option<Quirks>) -> Result<()> {
        let mut providers = self.write();
        let src = providers
            .get(source)
            .ok_or_else(|| ProbeError::configuration(format!("Unknown provider: {source}")))?;
        let merged = match &quirks {
            Some(overlay) => src.quirks.merged(overlay),
            None => src.quirks.clone(),
        };
        let entry = ProviderEntry {
            name: alias.to_string(),
            base_url: src.base_url.clone(),
            quirks: merged,
        };
        providers.insert(alias.to_string(), entry);
        info!(alias, source, "Provider alias registered");
        Ok(())
    }

    /// Patch one quirk on an already registered provider.
    pub fn set_quirk(&self, provider: &str, quirk: Quirk) -> Result<()> {
        let mut providers = self.write();
        let entry = providers
            .get_mut(provider)
            .ok_or_else(|| ProbeError::configuration(format!("Provider {provider} not registered")))?;
        debug!(provider, quirk = ?quirk, "Quirk set");
        entry.quirks.set(quirk);
        Ok(())
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.read().contains_key(provider)
    }

    /// Snapshot of a provider entry by provider name.
    pub fn get(&self, provider: &str) -> Option<ProviderEntry> {
        self.read().get(provider).cloned()
    }

    /// Snapshot of the quirks registered for `provider`.
    pub fn quirks(&self, provider: &str) -> Option<Quirks> {
        self.read().get(provider).map(|e| e.quirks.clone())
    }

    /// Entry for the provider named by a model identifier.
    pub fn resolve(&self, model: &str) -> Result<ProviderEntry> {
        let provider = provider_name(model);
        self.get(provider)
            .ok_or_else(|| ProbeError::configuration(format!("Unsupported provider: {provider}")))
    }

    pub fn base_url(&self, model: &str) -> Result<String> {
        self.resolve(model).map(|e| e.base_url)
    }

    pub fn api_key(&self, model: &str) -> Result<SecretString> {
        self.resolve(model).map(|e| e.api_key(model))
    }

    /// Registered provider names, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
