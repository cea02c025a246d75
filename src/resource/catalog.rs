//! Region catalogs
//!
//! A catalog answers "which regions does this service live in", in the order
//! results must be merged.

use super::registry::SchemaRegistry;
use crate::inventory::error::InventoryError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait RegionCatalog: Send + Sync {
    /// Ordered region ids for a provider/service pair
    async fn regions(&self, provider: &str, service: &str) -> Result<Vec<String>, InventoryError>;
}

/// Catalog backed by the region sets of a [`SchemaRegistry`]
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    schemas: Arc<SchemaRegistry>,
}

impl StaticCatalog {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Self {
        Self { schemas }
    }
}

#[async_trait]
impl RegionCatalog for StaticCatalog {
    async fn regions(&self, provider: &str, service: &str) -> Result<Vec<String>, InventoryError> {
        let def = self.schemas.get(provider, service).ok_or_else(|| {
            InventoryError::InvalidQuery(format!("unknown service {}/{}", provider, service))
        })?;
        let regions = self.schemas.region_set(&def.region_set).ok_or_else(|| {
            InventoryError::InvalidQuery(format!(
                "{}/{} refers to unknown region set {}",
                provider, service, def.region_set
            ))
        })?;
        Ok(regions.to_vec())
    }
}
