//! Integration tests for the GCP listing clients using wiremock
//!
//! These tests verify URL construction, pagination, record shaping and
//! error classification against mocked endpoints.

use cloudinv::gcp::client::{Endpoints, GcpClient};
use cloudinv::inventory::{FilterSpec, ProviderError};
use cloudinv::resource::fetcher::MAX_PAGES;
use cloudinv::resource::{GcpResourceClient, ListRequest, ResourceClient, SchemaRegistry};
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "test-project";

fn gcp_client(server: &MockServer) -> GcpClient {
    let endpoints = Endpoints::rooted_at(&server.uri()).expect("mock server URI is valid");
    GcpClient::with_static_token(PROJECT, "test-token", endpoints).expect("client builds")
}

fn resource_client(server: &MockServer, service: &str) -> GcpResourceClient {
    let def = SchemaRegistry::builtin()
        .get("gcp", service)
        .expect("builtin service")
        .clone();
    GcpResourceClient::new(gcp_client(server), def)
}

fn request<'a>(service: &'a str, region: &'a str, filter: &'a FilterSpec, running_only: bool) -> ListRequest<'a> {
    ListRequest {
        service,
        region,
        filter,
        running_only,
    }
}

fn instance(name: &str, status: &str, zone: &str) -> serde_json::Value {
    json!({
        "name": name,
        "status": status,
        "zone": format!("https://www.googleapis.com/compute/v1/projects/{}/zones/{}", PROJECT, zone),
        "machineType": format!("projects/{}/zones/{}/machineTypes/e2-medium", PROJECT, zone),
        "networkInterfaces": [{
            "networkIP": "10.128.0.2",
            "accessConfigs": [{"natIP": "34.1.2.3"}]
        }]
    })
}

/// Test module for Compute Engine listings
mod compute_tests {
    use super::*;

    #[tokio::test]
    async fn test_instances_are_shaped_into_records() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/compute/v1/projects/{}/zones/us-east1-b/instances", PROJECT)))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    instance("vm-1", "RUNNING", "us-east1-b"),
                    instance("vm-2", "TERMINATED", "us-east1-b")
                ]
            })))
            .mount(&server)
            .await;

        let client = resource_client(&server, "compute");
        let records = client
            .list(&request("compute", "us-east1-b", &FilterSpec::All, false))
            .await
            .expect("listing succeeds");

        assert_eq!(
            records,
            vec![
                vec!["1", "vm-1", "RUNNING", "e2-medium", "10.128.0.2", "34.1.2.3", "us-east1-b"],
                vec!["2", "vm-2", "TERMINATED", "e2-medium", "10.128.0.2", "34.1.2.3", "us-east1-b"],
            ]
            .into_iter()
            .map(|r| r.into_iter().map(String::from).collect::<Vec<_>>())
            .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_running_only_and_id_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/compute/v1/projects/{}/zones/us-east1-b/instances", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    instance("vm-1", "TERMINATED", "us-east1-b"),
                    instance("vm-2", "RUNNING", "us-east1-b"),
                    instance("vm-3", "RUNNING", "us-east1-b")
                ]
            })))
            .mount(&server)
            .await;

        let client = resource_client(&server, "compute");

        let running = client
            .list(&request("compute", "us-east1-b", &FilterSpec::All, true))
            .await
            .unwrap();
        let names: Vec<(&str, &str)> = running.iter().map(|r| (r[0].as_str(), r[1].as_str())).collect();
        assert_eq!(names, vec![("1", "vm-2"), ("2", "vm-3")]);

        let one = FilterSpec::Resource("vm-3".into());
        let filtered = client
            .list(&request("compute", "us-east1-b", &one, false))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0][1], "vm-3");
    }

    #[tokio::test]
    async fn test_pagination_follows_tokens() {
        let server = MockServer::start().await;
        let instances_path = format!("/compute/v1/projects/{}/zones/us-west1-a/instances", PROJECT);

        Mock::given(method("GET"))
            .and(path(instances_path.clone()))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [instance("vm-b", "RUNNING", "us-west1-a")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(instances_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [instance("vm-a", "RUNNING", "us-west1-a")],
                "nextPageToken": "page-2"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let client = resource_client(&server, "compute");
        let records = client
            .list(&request("compute", "us-west1-a", &FilterSpec::All, false))
            .await
            .unwrap();
        let names: Vec<&str> = records.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(names, vec!["vm-a", "vm-b"]);
    }

    #[tokio::test]
    async fn test_endless_pagination_fails_instead_of_truncating() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/compute/v1/projects/{}/zones/us-east1-b/instances", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [instance("vm-loop", "RUNNING", "us-east1-b")],
                "nextPageToken": "again"
            })))
            .expect(MAX_PAGES as u64)
            .mount(&server)
            .await;

        let err = resource_client(&server, "compute")
            .list(&request("compute", "us-east1-b", &FilterSpec::All, false))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_empty_zone_has_no_items_field() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/compute/v1/projects/{}/zones/asia-east1-a/instances", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "compute#instanceList"
            })))
            .mount(&server)
            .await;

        let client = resource_client(&server, "compute");
        let records = client
            .list(&request("compute", "asia-east1-a", &FilterSpec::All, false))
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}

/// Test module for Cloud Storage and Cloud SQL listings
mod storage_and_sql_tests {
    use super::*;

    #[tokio::test]
    async fn test_buckets_listed_for_project() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/storage/v1/b"))
            .and(query_param("project", PROJECT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "name": "logs-bucket",
                    "location": "US",
                    "storageClass": "STANDARD",
                    "timeCreated": "2023-01-15T10:30:00.000Z"
                }]
            })))
            .mount(&server)
            .await;

        let client = resource_client(&server, "storage");
        let records = client
            .list(&request("storage", "global", &FilterSpec::All, false))
            .await
            .unwrap();
        assert_eq!(records, vec![vec!["1", "logs-bucket", "US", "STANDARD", "2023-01-15"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()]);
    }

    #[tokio::test]
    async fn test_sql_instances_narrowed_to_region() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/v1/projects/{}/instances", PROJECT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "db-east", "databaseVersion": "POSTGRES_15", "state": "RUNNABLE",
                     "settings": {"tier": "db-f1-micro"}, "region": "us-east1",
                     "ipAddresses": [{"ipAddress": "10.0.0.5"}]},
                    {"name": "db-west", "databaseVersion": "MYSQL_8_0", "state": "STOPPED",
                     "settings": {"tier": "db-g1-small"}, "region": "us-west1"}
                ]
            })))
            .mount(&server)
            .await;

        let client = resource_client(&server, "sql");
        let records = client
            .list(&request("sql", "us-west1", &FilterSpec::All, false))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0][1], "db-west");
        assert_eq!(records[0][5], "-", "missing IP renders as a dash");
    }
}

/// Test module for error classification
mod error_tests {
    use super::*;

    async fn status_error(status: u16) -> ProviderError {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"code": status, "message": "denied"}
            })))
            .mount(&server)
            .await;

        resource_client(&server, "compute")
            .list(&request("compute", "us-east1-b", &FilterSpec::All, false))
            .await
            .expect_err("non-success status must fail")
    }

    #[tokio::test]
    async fn test_403_is_status_error() {
        assert_eq!(status_error(403).await, ProviderError::Status { status: 403 });
    }

    #[tokio::test]
    async fn test_429_is_transient() {
        let err = status_error(429).await;
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = resource_client(&server, "storage")
            .list(&request("storage", "global", &FilterSpec::All, false))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let endpoints = Endpoints::rooted_at("http://127.0.0.1:9").unwrap();
        let client = GcpClient::with_static_token(PROJECT, "t", endpoints).unwrap();
        let def = SchemaRegistry::builtin().get("gcp", "storage").unwrap().clone();
        let err = GcpResourceClient::new(client, def)
            .list(&request("storage", "global", &FilterSpec::All, false))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}

/// Test module for fan-out over a mocked API
mod aggregation_tests {
    use super::*;
    use cloudinv::inventory::{FailurePolicy, RegionAggregator, RegionSpec, ResourceQuery};
    use cloudinv::resource::{ClientSet, StaticCatalog};
    use std::sync::Arc;

    const TWO_ZONES: &str = r#"{"region_sets": {"gcp-zones": ["us-east1-b", "us-west1-a"]}}"#;

    fn aggregator(server: &MockServer, policy: FailurePolicy) -> RegionAggregator {
        let schemas = Arc::new(
            SchemaRegistry::from_json_sources(&[TWO_ZONES, include_str!("../src/resources/gcp.json")])
                .unwrap(),
        );
        let def = schemas.get("gcp", "compute").unwrap().clone();
        let clients = ClientSet::new().with(
            "gcp",
            "compute",
            Arc::new(GcpResourceClient::new(gcp_client(server), def)),
        );
        let catalog = Arc::new(StaticCatalog::new(schemas.clone()));
        RegionAggregator::new(schemas, catalog, clients).with_policy(policy)
    }

    async fn mount_zone(server: &MockServer, zone: &str, names: &[&str]) {
        let items: Vec<_> = names.iter().map(|n| instance(n, "RUNNING", zone)).collect();
        Mock::given(method("GET"))
            .and(path(format!("/compute/v1/projects/{}/zones/{}/instances", PROJECT, zone)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_all_zones_merged_in_catalog_order() {
        let server = MockServer::start().await;
        mount_zone(&server, "us-east1-b", &["east-1", "east-2"]).await;
        mount_zone(&server, "us-west1-a", &["west-1"]).await;

        let query = ResourceQuery::new("gcp", "compute").with_region(RegionSpec::All);
        let result = aggregator(&server, FailurePolicy::FailFast)
            .aggregate(&query)
            .await
            .unwrap();

        let rows: Vec<(&str, &str)> = result
            .data
            .body()
            .iter()
            .map(|r| (r[0].as_str(), r[1].as_str()))
            .collect();
        assert_eq!(rows, vec![("1", "east-1"), ("2", "east-2"), ("3", "west-1")]);
        assert!(!result.is_partial());
    }

    #[tokio::test]
    async fn test_partial_policy_skips_failing_zone() {
        let server = MockServer::start().await;
        mount_zone(&server, "us-east1-b", &["east-1"]).await;
        Mock::given(method("GET"))
            .and(path(format!("/compute/v1/projects/{}/zones/us-west1-a/instances", PROJECT)))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let query = ResourceQuery::new("gcp", "compute");
        let result = aggregator(&server, FailurePolicy::Partial)
            .aggregate(&query)
            .await
            .unwrap();

        assert_eq!(result.data.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].region, "us-west1-a");
        assert_eq!(result.failures[0].error, ProviderError::Status { status: 503 });
    }
}
