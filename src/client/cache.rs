//! Client cache, one backend per model identifier.
//!
//! A single mutex guards the check-and-insert. Endpoint and credential
//! resolution happen before the lock is taken; only construction and
//! insertion run under it, so racing first lookups build exactly one client.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{BackendFactory, BackendTarget, CompletionBackend};
use crate::error::Result;
use crate::provider::ProviderEntry;

pub struct ClientCache {
    factory: Arc<dyn BackendFactory>,
    clients: Mutex<HashMap<String, Arc<dyn CompletionBackend>>>,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, model: &str) -> Option<Arc<dyn CompletionBackend>> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(model)
            .cloned()
    }

    /// Backend for `model`, building it from `provider` on first use.
    pub fn get_or_build(
        &self,
        model: &str,
        provider: &ProviderEntry,
    ) -> Result<Arc<dyn CompletionBackend>> {
        if let Some(client) = self.cached(model) {
            return Ok(client);
        }

        let target = BackendTarget {
            model: model.to_string(),
            provider: provider.name.clone(),
            base_url: provider.base_url.clone(),
            api_key: provider.api_key(model),
        };

        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        match clients.entry(model.to_string()) {
            Entry::Occupied(slot) => Ok(slot.get().clone()),
            Entry::Vacant(slot) => {
                let client = self.factory.build(target)?;
                debug!(model, provider = %provider.name, "Client constructed");
                Ok(slot.insert(client).clone())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
