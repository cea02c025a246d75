//! SDK Dispatch
//!
//! Maps the abstract list methods of resource definitions to GCP REST calls.

use super::registry::ResourceDef;
use crate::gcp::client::GcpClient;
use crate::inventory::error::ProviderError;
use serde_json::{Map, Value};

/// Invoke the list method of a resource definition for one location
pub async fn invoke_list(
    def: &ResourceDef,
    client: &GcpClient,
    location: &str,
    params: &Value,
) -> Result<Value, ProviderError> {
    tracing::debug!(
        "invoke_list: service={}, method={}, location={}",
        def.service,
        def.sdk_method,
        location
    );

    match def.service.as_str() {
        "compute" => invoke_compute(&def.sdk_method, client, location, params).await,
        "storage" => invoke_storage(&def.sdk_method, client, params).await,
        "sql" => invoke_sql(&def.sdk_method, client, params).await,
        other => Err(ProviderError::Malformed(format!("unknown service: {}", other))),
    }
}

// =============================================================================
// Compute Engine
// =============================================================================

async fn invoke_compute(
    method: &str,
    client: &GcpClient,
    zone: &str,
    params: &Value,
) -> Result<Value, ProviderError> {
    match method {
        "list_instances" => {
            let url = client.compute_zonal_url(zone, "instances");
            client.get(&add_query_params(&url, params)).await
        }
        _ => Err(unknown_method("compute", method)),
    }
}

// =============================================================================
// Cloud Storage
// =============================================================================

async fn invoke_storage(method: &str, client: &GcpClient, params: &Value) -> Result<Value, ProviderError> {
    match method {
        "list_buckets" => {
            let url = format!(
                "{}?project={}",
                client.storage_url("b"),
                urlencoding::encode(&client.project_id)
            );
            client.get(&add_query_params(&url, params)).await
        }
        _ => Err(unknown_method("storage", method)),
    }
}

// =============================================================================
// Cloud SQL
// =============================================================================

async fn invoke_sql(method: &str, client: &GcpClient, params: &Value) -> Result<Value, ProviderError> {
    match method {
        "list_instances" => {
            let url = client.sqladmin_url("instances");
            client.get(&add_query_params(&url, params)).await
        }
        _ => Err(unknown_method("sql", method)),
    }
}

fn unknown_method(service: &str, method: &str) -> ProviderError {
    ProviderError::Malformed(format!("unknown {} method: {}", service, method))
}

/// Build list parameters for one page
pub fn page_params(page_token: Option<&str>) -> Value {
    let mut map = Map::new();
    if let Some(token) = page_token {
        map.insert("pageToken".to_string(), Value::String(token.to_string()));
    }
    Value::Object(map)
}

fn add_query_params(url: &str, params: &Value) -> String {
    let Value::Object(map) = params else {
        return url.to_string();
    };

    let mut query_parts: Vec<String> = Vec::new();

    for (key, value) in map {
        match value {
            Value::String(s) => {
                query_parts.push(format!("{}={}", key, urlencoding::encode(s)));
            }
            Value::Array(arr) => {
                for item in arr {
                    if let Value::String(s) = item {
                        query_parts.push(format!("{}={}", key, urlencoding::encode(s)));
                    }
                }
            }
            _ => {}
        }
    }

    if query_parts.is_empty() {
        return url.to_string();
    }

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query_parts.join("&"))
}
