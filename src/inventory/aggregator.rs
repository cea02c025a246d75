//! Region fan-out
//!
//! Regions are queried one at a time in catalog order and their rows are
//! concatenated in that order. The serial column is renumbered over the
//! merged result.

use super::error::{InventoryError, ProviderError};
use super::query::{RegionSpec, ResourceQuery};
use super::table::{ResourceRecord, TableData, TableError};
use crate::resource::{ClientSet, ListRequest, RegionCatalog, ResourceClient, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// What to do when one region of a fan-out fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the whole aggregation on the first failing region
    #[default]
    FailFast,
    /// Keep the regions that succeeded and report the others
    Partial,
}

/// A region left out of a partial aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    pub region: String,
    pub error: ProviderError,
}

/// Merged table plus the regions that could not be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub data: TableData,
    pub failures: Vec<RegionFailure>,
}

impl Aggregation {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Executes live queries against the registered clients
#[derive(Clone)]
pub struct RegionAggregator {
    schemas: Arc<SchemaRegistry>,
    catalog: Arc<dyn RegionCatalog>,
    clients: ClientSet,
    policy: FailurePolicy,
    call_timeout: Option<Duration>,
}

impl RegionAggregator {
    pub fn new(schemas: Arc<SchemaRegistry>, catalog: Arc<dyn RegionCatalog>, clients: ClientSet) -> Self {
        Self {
            schemas,
            catalog,
            clients,
            policy: FailurePolicy::default(),
            call_timeout: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound every provider call; a region that overruns counts as failed
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.schemas
    }

    pub fn catalog(&self) -> &Arc<dyn RegionCatalog> {
        &self.catalog
    }

    /// Fetch live data for a query
    #[instrument(skip(self, query), fields(provider = %query.provider, service = %query.service, region = %query.region))]
    pub async fn aggregate(&self, query: &ResourceQuery) -> Result<Aggregation, InventoryError> {
        let query = &query.normalized();
        let header = self
            .schemas
            .header(&query.provider, &query.service)
            .ok_or_else(|| unknown_service(query))?;
        let client = self
            .clients
            .get(&query.provider, &query.service)
            .ok_or_else(|| {
                InventoryError::InvalidQuery(format!(
                    "no live client for {}/{}",
                    query.provider, query.service
                ))
            })?;

        let (regions, fan_out) = match &query.region {
            RegionSpec::All => (
                self.catalog.regions(&query.provider, &query.service).await?,
                true,
            ),
            RegionSpec::Region(id) => (vec![id.clone()], false),
        };

        let mut body: Vec<ResourceRecord> = Vec::new();
        let mut failures: Vec<RegionFailure> = Vec::new();

        for region in &regions {
            debug!("Listing {}/{} in {}", query.provider, query.service, region);
            match self.fetch_region(client.as_ref(), query, region).await {
                Ok(records) => {
                    if let Some(bad) = records.iter().find(|r| r.len() != header.len()) {
                        return Err(InventoryError::SchemaMismatch {
                            region: region.clone(),
                            expected: header.len(),
                            found: bad.len(),
                        });
                    }
                    body.extend(records);
                }
                Err(error) if fan_out && self.policy == FailurePolicy::Partial => {
                    warn!(region = %region, error = %error, "region listing failed, continuing");
                    failures.push(RegionFailure {
                        region: region.clone(),
                        error,
                    });
                }
                Err(error) => return Err(provider_error(query, region, error)),
            }
        }

        if !regions.is_empty() && failures.len() == regions.len() {
            let first = failures.remove(0);
            return Err(provider_error(query, &first.region, first.error));
        }

        let mut data = TableData::new(header, body).map_err(|e| match e {
            TableError::WidthMismatch {
                expected, found, ..
            } => InventoryError::SchemaMismatch {
                region: query.region.to_string(),
                expected,
                found,
            },
        })?;
        data.renumber();

        info!(
            rows = data.len(),
            regions = regions.len(),
            failed = failures.len(),
            "aggregation complete"
        );
        Ok(Aggregation { data, failures })
    }

    async fn fetch_region(
        &self,
        client: &dyn ResourceClient,
        query: &ResourceQuery,
        region: &str,
    ) -> Result<Vec<ResourceRecord>, ProviderError> {
        let request = ListRequest {
            service: &query.service,
            region,
            filter: &query.filter,
            running_only: query.running_only,
        };
        match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, client.list(&request))
                .await
                .map_err(|_| ProviderError::Timeout(limit))?,
            None => client.list(&request).await,
        }
    }
}

fn unknown_service(query: &ResourceQuery) -> InventoryError {
    InventoryError::InvalidQuery(format!(
        "unknown service {}/{}",
        query.provider, query.service
    ))
}

fn provider_error(query: &ResourceQuery, region: &str, source: ProviderError) -> InventoryError {
    InventoryError::ProviderApi {
        provider: query.provider.clone(),
        service: query.service.clone(),
        region: region.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::query::FilterSpec;
    use crate::resource::StaticCatalog;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const REGIONS: &str = r#"{"region_sets": {"lh": ["ap-beijing", "ap-guangzhou", "ap-shanghai"]}}"#;
    const SCHEMAS: &str = r#"{"resources": [{
        "provider": "tencent", "service": "lh", "display_name": "LH instances",
        "caption": "LH resources", "sdk_method": "DescribeInstances",
        "response_path": "InstanceSet", "id_field": "InstanceId",
        "scope": "zonal", "region_set": "lh",
        "columns": [
            {"header": "Instance ID", "json_path": "InstanceId"},
            {"header": "Region ID", "json_path": "Zone"}
        ]
    }]}"#;

    /// Client answering from a fixed per-region script
    struct ScriptedClient {
        script: HashMap<String, Result<Vec<ResourceRecord>, ProviderError>>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        fn new(entries: Vec<(&str, Result<Vec<ResourceRecord>, ProviderError>)>) -> Self {
            Self {
                script: entries
                    .into_iter()
                    .map(|(r, v)| (r.to_string(), v))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceClient for ScriptedClient {
        async fn list(&self, request: &ListRequest<'_>) -> Result<Vec<ResourceRecord>, ProviderError> {
            self.calls.lock().unwrap().push(request.region.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script
                .get(request.region)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn rows(region: &str, ids: &[&str]) -> Vec<ResourceRecord> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| vec![(i + 1).to_string(), id.to_string(), region.to_string()])
            .collect()
    }

    fn aggregator(client: Arc<ScriptedClient>) -> RegionAggregator {
        let schemas = Arc::new(SchemaRegistry::from_json_sources(&[REGIONS, SCHEMAS]).unwrap());
        let catalog = Arc::new(StaticCatalog::new(schemas.clone()));
        let clients = ClientSet::new().with("tencent", "lh", client);
        RegionAggregator::new(schemas, catalog, clients)
    }

    #[tokio::test]
    async fn test_fan_out_concatenates_in_catalog_order() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("ap-shanghai", Ok(rows("ap-shanghai", &["c1"]))),
            ("ap-beijing", Ok(rows("ap-beijing", &["a1", "a2"]))),
            ("ap-guangzhou", Ok(rows("ap-guangzhou", &["b1"]))),
        ]));
        let result = aggregator(client.clone())
            .aggregate(&ResourceQuery::new("tencent", "lh"))
            .await
            .unwrap();

        assert_eq!(client.calls(), vec!["ap-beijing", "ap-guangzhou", "ap-shanghai"]);
        let ids: Vec<&str> = result.data.body().iter().map(|r| r[1].as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1", "c1"]);
        let serials: Vec<&str> = result.data.body().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(serials, vec!["1", "2", "3", "4"]);
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_single_region_calls_once() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "ap-guangzhou",
            Ok(rows("ap-guangzhou", &["b1"])),
        )]));
        let query = ResourceQuery::new("tencent", "lh")
            .with_region(RegionSpec::Region("ap-guangzhou".into()))
            .with_filter(FilterSpec::Resource("b1".into()));
        let result = aggregator(client.clone()).aggregate(&query).await.unwrap();
        assert_eq!(client.calls(), vec!["ap-guangzhou"]);
        assert_eq!(result.data.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_error() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("ap-beijing", Ok(rows("ap-beijing", &["a1"]))),
            ("ap-guangzhou", Err(ProviderError::Status { status: 403 })),
        ]));
        let err = aggregator(client.clone())
            .aggregate(&ResourceQuery::new("tencent", "lh"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::ProviderApi { ref region, .. } if region == "ap-guangzhou"
        ));
        assert_eq!(client.calls(), vec!["ap-beijing", "ap-guangzhou"]);
    }

    #[tokio::test]
    async fn test_partial_policy_keeps_successful_regions() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("ap-beijing", Ok(rows("ap-beijing", &["a1"]))),
            ("ap-guangzhou", Err(ProviderError::Status { status: 429 })),
            ("ap-shanghai", Ok(rows("ap-shanghai", &["c1"]))),
        ]));
        let result = aggregator(client)
            .with_policy(FailurePolicy::Partial)
            .aggregate(&ResourceQuery::new("tencent", "lh"))
            .await
            .unwrap();
        assert_eq!(result.data.len(), 2);
        assert_eq!(result.data.body()[1][0], "2");
        assert_eq!(
            result.failures,
            vec![RegionFailure {
                region: "ap-guangzhou".into(),
                error: ProviderError::Status { status: 429 }
            }]
        );
    }

    #[tokio::test]
    async fn test_partial_policy_all_failed_is_error() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("ap-beijing", Err(ProviderError::Transport("reset".into()))),
            ("ap-guangzhou", Err(ProviderError::Transport("reset".into()))),
            ("ap-shanghai", Err(ProviderError::Transport("reset".into()))),
        ]));
        let err = aggregator(client)
            .with_policy(FailurePolicy::Partial)
            .aggregate(&ResourceQuery::new("tencent", "lh"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::ProviderApi { ref region, .. } if region == "ap-beijing"
        ));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let mut client = ScriptedClient::new(vec![("ap-beijing", Ok(rows("ap-beijing", &["a1"])))]);
        client.delay = Some(Duration::from_millis(200));
        let query = ResourceQuery::new("tencent", "lh")
            .with_region(RegionSpec::Region("ap-beijing".into()));
        let err = aggregator(Arc::new(client))
            .with_call_timeout(Some(Duration::from_millis(10)))
            .aggregate(&query)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::ProviderApi {
                source: ProviderError::Timeout(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_short_record_is_schema_mismatch() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "ap-beijing",
            Ok(vec![vec!["1".to_string(), "a1".to_string()]]),
        )]));
        let err = aggregator(client)
            .aggregate(&ResourceQuery::new("tencent", "lh"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::SchemaMismatch {
                expected: 3,
                found: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_client_is_invalid_query() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let err = aggregator(client)
            .aggregate(&ResourceQuery::new("tencent", "cvm"))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidQuery(_)));
    }
}
