//! Freshness dispatch
//!
//! A refresh query is served live and written back to the cache. Anything
//! else is served from the cache alone; a missing entry is an empty table.

use super::aggregator::{RegionAggregator, RegionFailure};
use super::error::InventoryError;
use super::key::CacheKey;
use super::query::{FilterSpec, RegionSpec, ResourceQuery};
use super::store::{CacheEntry, CacheStore};
use super::table::TableData;
use crate::render::Renderer;
use crate::resource::registry::Scope;
use crate::resource::ResourceDef;
use tracing::{debug, instrument};

/// Where the rendered data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Live,
    Cached,
}

/// Result of one dispatched query
#[derive(Debug, Clone)]
pub struct Outcome {
    pub key: CacheKey,
    pub data: TableData,
    pub source: DataSource,
    /// Per-region errors of this refresh
    pub failures: Vec<RegionFailure>,
    /// Regions absent from `data`, live or as recorded in the cache entry
    pub missing_regions: Vec<String>,
}

/// Top-level query policy, holding the handles it needs explicitly
pub struct InventoryDispatcher {
    aggregator: RegionAggregator,
    store: CacheStore,
}

impl InventoryDispatcher {
    pub fn new(aggregator: RegionAggregator, store: CacheStore) -> Self {
        Self { aggregator, store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Check provider, service, region and filter before any cache or network access
    pub async fn validate(&self, query: &ResourceQuery) -> Result<&ResourceDef, InventoryError> {
        let def = self
            .aggregator
            .schemas()
            .get(&query.provider, &query.service)
            .ok_or_else(|| {
                InventoryError::InvalidQuery(format!(
                    "unknown service {}/{}",
                    query.provider, query.service
                ))
            })?;

        if let RegionSpec::Region(id) = &query.region {
            let regions = self
                .aggregator
                .catalog()
                .regions(&query.provider, &query.service)
                .await?;
            if !regions.iter().any(|r| r == id) {
                return Err(InventoryError::InvalidQuery(format!(
                    "unknown region '{}' for {}/{}",
                    id, query.provider, query.service
                )));
            }
        }

        if let FilterSpec::Resource(id) = &query.filter {
            if id.is_empty() || id.contains('/') {
                return Err(InventoryError::InvalidQuery(format!(
                    "invalid resource filter '{}'",
                    id
                )));
            }
        }

        Ok(def)
    }

    /// Serve a query and hand the table to the renderer
    #[instrument(skip(self, query, renderer), fields(provider = %query.provider, service = %query.service, refresh = query.refresh))]
    pub async fn dispatch(
        &self,
        query: &ResourceQuery,
        renderer: &mut dyn Renderer,
    ) -> Result<Outcome, InventoryError> {
        let query = &query.normalized();
        let def = self.validate(query).await?;
        let key = CacheKey::build(&query.provider, &query.service, &query.region, &query.filter);

        let outcome = if query.refresh {
            let aggregation = self.aggregator.aggregate(query).await?;
            let missing_regions: Vec<String> =
                aggregation.failures.iter().map(|f| f.region.clone()).collect();
            self.store
                .write_with_failures(&key, &aggregation.data, &missing_regions)
                .await?;
            Outcome {
                key,
                data: aggregation.data,
                source: DataSource::Live,
                failures: aggregation.failures,
                missing_regions,
            }
        } else {
            let (mut data, missing_regions) = match self.store.read_entry(&key).await? {
                Some(entry) => (entry.data, entry.failed_regions),
                None => {
                    debug!("No cached data for {}, showing empty table", key);
                    (TableData::empty(def.header()), Vec::new())
                }
            };
            if query.running_only {
                if let Some(running) = def.running.as_ref() {
                    if let Some(column) = data.column(&running.column) {
                        data.retain_matching(column, &running.values);
                    }
                }
            }
            Outcome {
                key,
                data,
                source: DataSource::Cached,
                failures: Vec::new(),
                missing_regions,
            }
        };

        renderer
            .render(&outcome.data, &def.caption)
            .map_err(InventoryError::Output)?;
        Ok(outcome)
    }

    /// Services of a provider that can answer a listing of `region`, each with
    /// the region spec to query it with, in listing order
    ///
    /// A specific region keeps the services whose catalog contains it.
    /// Project-wide services that do not know the region are listed whole.
    pub async fn services_for_region(
        &self,
        provider: &str,
        region: &RegionSpec,
    ) -> Result<Vec<(String, RegionSpec)>, InventoryError> {
        let defs = self.aggregator.schemas().services(provider);
        if defs.is_empty() {
            return Err(InventoryError::InvalidQuery(format!("unknown provider {}", provider)));
        }

        let RegionSpec::Region(id) = region.clone().normalized() else {
            return Ok(defs
                .into_iter()
                .map(|d| (d.service.clone(), RegionSpec::All))
                .collect());
        };

        let mut plan = Vec::new();
        let mut matched = false;
        for def in defs {
            let regions = self.aggregator.catalog().regions(provider, &def.service).await?;
            if regions.iter().any(|r| r == &id) {
                matched = true;
                plan.push((def.service.clone(), RegionSpec::Region(id.clone())));
            } else if def.scope == Scope::Global {
                plan.push((def.service.clone(), RegionSpec::All));
            }
        }

        if !matched {
            return Err(InventoryError::InvalidQuery(format!(
                "unknown region '{}' for {}",
                id, provider
            )));
        }
        Ok(plan)
    }

    /// Every cached entry of a provider, optionally one service only
    pub async fn list_cached(
        &self,
        provider: &str,
        service: Option<&str>,
    ) -> Result<Vec<CacheEntry>, InventoryError> {
        let schemas = self.aggregator.schemas();
        if !schemas.providers().contains(&provider) {
            return Err(InventoryError::InvalidQuery(format!("unknown provider {}", provider)));
        }
        if let Some(service) = service {
            if schemas.get(provider, service).is_none() {
                return Err(InventoryError::InvalidQuery(format!(
                    "unknown service {}/{}",
                    provider, service
                )));
            }
        }
        self.store.read_all(provider, service).await
    }
}
