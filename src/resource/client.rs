//! Resource client capability
//!
//! One [`ResourceClient`] per (provider, service) pair, looked up through a
//! [`ClientSet`] instead of branching on names.

use crate::inventory::error::ProviderError;
use crate::inventory::query::FilterSpec;
use crate::inventory::table::ResourceRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Arguments of a single-region listing
#[derive(Debug, Clone)]
pub struct ListRequest<'a> {
    pub service: &'a str,
    pub region: &'a str,
    pub filter: &'a FilterSpec,
    pub running_only: bool,
}

#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List the resources of one region as full-width records, serial first
    async fn list(&self, request: &ListRequest<'_>) -> Result<Vec<ResourceRecord>, ProviderError>;
}

/// Live clients keyed by (provider, service)
#[derive(Clone, Default)]
pub struct ClientSet {
    clients: HashMap<(String, String), Arc<dyn ResourceClient>>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: &str, service: &str, client: Arc<dyn ResourceClient>) {
        self.clients
            .insert((provider.to_string(), service.to_string()), client);
    }

    #[must_use]
    pub fn with(mut self, provider: &str, service: &str, client: Arc<dyn ResourceClient>) -> Self {
        self.register(provider, service, client);
        self
    }

    pub fn get(&self, provider: &str, service: &str) -> Option<Arc<dyn ResourceClient>> {
        self.clients
            .get(&(provider.to_string(), service.to_string()))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ClientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self
            .clients
            .keys()
            .map(|(p, s)| format!("{}/{}", p, s))
            .collect();
        keys.sort();
        f.debug_struct("ClientSet").field("clients", &keys).finish()
    }
}
