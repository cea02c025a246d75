//! Schema Registry - Load resource definitions from JSON
//!
//! Every (provider, service) pair has one definition fixing its header, the
//! API method used to list it and the region set it fans out over. The
//! builtin registry is parsed once from embedded JSON and never mutated.

use crate::inventory::table::SERIAL_HEADER;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/regions.json"),
    include_str!("../resources/gcp.json"),
];

/// Column definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnDef {
    pub header: String,
    pub json_path: String,
}

/// Which column tells whether a resource is running
#[derive(Debug, Clone, Deserialize)]
pub struct RunningDef {
    pub column: String,
    pub values: Vec<String>,
}

/// How a service is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Listed per zone
    Zonal,
    /// Listed project-wide, then narrowed by a region field
    Regional,
    /// One project-wide listing
    Global,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub provider: String,
    pub service: String,
    /// Position when listing all services of a provider
    #[serde(default)]
    pub order: u32,
    pub display_name: String,
    pub caption: String,
    pub sdk_method: String,
    pub response_path: String,
    pub id_field: String,
    pub scope: Scope,
    pub region_set: String,
    /// Item field holding the region, for regional services
    #[serde(default)]
    pub region_field: Option<String>,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub running: Option<RunningDef>,
}

impl ResourceDef {
    /// Column labels, serial number first
    pub fn header(&self) -> Vec<String> {
        std::iter::once(SERIAL_HEADER.to_string())
            .chain(self.columns.iter().map(|c| c.header.clone()))
            .collect()
    }

    /// Header index of the running-state column
    pub fn running_column(&self) -> Option<usize> {
        let running = self.running.as_ref()?;
        self.header().iter().position(|h| h == &running.column)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize, Default)]
struct ResourceConfig {
    #[serde(default)]
    region_sets: HashMap<String, Vec<String>>,
    #[serde(default)]
    resources: Vec<ResourceDef>,
}

/// Immutable lookup from (provider, service) to its definition
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    region_sets: HashMap<String, Vec<String>>,
    resources: BTreeMap<(String, String), ResourceDef>,
}

static BUILTIN: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();

impl SchemaRegistry {
    /// The registry compiled into the binary
    pub fn builtin() -> Arc<SchemaRegistry> {
        BUILTIN
            .get_or_init(|| {
                let registry = SchemaRegistry::from_json_sources(RESOURCE_FILES)
                    .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
                Arc::new(registry)
            })
            .clone()
    }

    /// Merge several JSON documents into one registry
    pub fn from_json_sources(sources: &[&str]) -> Result<Self, serde_json::Error> {
        let mut registry = SchemaRegistry::default();
        for content in sources {
            let partial: ResourceConfig = serde_json::from_str(content)?;
            registry.region_sets.extend(partial.region_sets);
            for def in partial.resources {
                registry
                    .resources
                    .insert((def.provider.clone(), def.service.clone()), def);
            }
        }
        Ok(registry)
    }

    /// Get a resource definition
    pub fn get(&self, provider: &str, service: &str) -> Option<&ResourceDef> {
        self.resources
            .get(&(provider.to_string(), service.to_string()))
    }

    /// Header for a resource kind
    pub fn header(&self, provider: &str, service: &str) -> Option<Vec<String>> {
        self.get(provider, service).map(ResourceDef::header)
    }

    /// All services of a provider, in listing order
    pub fn services(&self, provider: &str) -> Vec<&ResourceDef> {
        let mut defs: Vec<&ResourceDef> = self
            .resources
            .values()
            .filter(|d| d.provider == provider)
            .collect();
        defs.sort_by_key(|d| (d.order, d.service.clone()));
        defs
    }

    /// Known providers, sorted
    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self.resources.keys().map(|(p, _)| p.as_str()).collect();
        providers.dedup();
        providers
    }

    /// Every definition, ordered by provider then listing order
    pub fn all(&self) -> Vec<&ResourceDef> {
        self.providers()
            .into_iter()
            .flat_map(|p| self.services(p))
            .collect()
    }

    /// Ordered regions of a named region set
    pub fn region_set(&self, name: &str) -> Option<&[String]> {
        self.region_sets.get(name).map(|v| v.as_slice())
    }
}
