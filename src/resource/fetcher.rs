//! Resource Fetcher
//!
//! GCP implementation of [`ResourceClient`]: pages through a list method,
//! shapes each item into a record following the definition's columns.

use super::client::{ListRequest, ResourceClient};
use super::registry::{ResourceDef, Scope};
use super::sdk_dispatch;
use crate::gcp::client::GcpClient;
use crate::inventory::error::ProviderError;
use crate::inventory::table::ResourceRecord;
use async_trait::async_trait;
use serde_json::Value;

/// Upper bound on pages per listing, in case an API keeps returning tokens.
/// A listing that hits it fails rather than returning a partial table.
pub const MAX_PAGES: usize = 100;

/// Result of paginated fetch
pub struct PaginatedResult {
    pub items: Vec<Value>,
    pub next_token: Option<String>,
}

/// Lists one GCP service
#[derive(Clone)]
pub struct GcpResourceClient {
    client: GcpClient,
    def: ResourceDef,
}

impl GcpResourceClient {
    pub fn new(client: GcpClient, def: ResourceDef) -> Self {
        Self { client, def }
    }

    /// Fetch all raw items of one location (auto-paginate)
    pub async fn fetch_items(&self, location: &str) -> Result<Vec<Value>, ProviderError> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let result = self.fetch_page(location, page_token.as_deref()).await?;
            all_items.extend(result.items);

            if result.next_token.is_none() {
                return Ok(all_items);
            }
            page_token = result.next_token;
        }

        tracing::warn!(
            "{}/{} in {} still paginating after {} pages",
            self.def.provider,
            self.def.service,
            location,
            MAX_PAGES
        );
        Err(ProviderError::Malformed(format!(
            "listing did not finish within {} pages",
            MAX_PAGES
        )))
    }

    /// Fetch one page of items
    pub async fn fetch_page(
        &self,
        location: &str,
        page_token: Option<&str>,
    ) -> Result<PaginatedResult, ProviderError> {
        let params = sdk_dispatch::page_params(page_token);
        let response = sdk_dispatch::invoke_list(&self.def, &self.client, location, &params).await?;

        let items = extract_items(&response, &self.def.response_path)?
            .into_iter()
            .map(post_process_item)
            .collect();

        let next_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        Ok(PaginatedResult { items, next_token })
    }

    /// Shape one item into a record with an empty serial field
    fn to_record(&self, item: &Value) -> ResourceRecord {
        std::iter::once(String::new())
            .chain(
                self.def
                    .columns
                    .iter()
                    .map(|c| extract_json_value(item, &c.json_path)),
            )
            .collect()
    }

    fn in_region(&self, item: &Value, region: &str) -> bool {
        match (self.def.scope, self.def.region_field.as_deref()) {
            (Scope::Regional, Some(field)) => extract_json_value(item, field) == region,
            _ => true,
        }
    }

    fn is_running(&self, record: &ResourceRecord) -> bool {
        let (Some(running), Some(column)) = (self.def.running.as_ref(), self.def.running_column())
        else {
            return true;
        };
        running
            .values
            .iter()
            .any(|v| v.eq_ignore_ascii_case(&record[column]))
    }
}

#[async_trait]
impl ResourceClient for GcpResourceClient {
    async fn list(&self, request: &ListRequest<'_>) -> Result<Vec<ResourceRecord>, ProviderError> {
        tracing::debug!(
            "Looking for {} in the {} region",
            self.def.display_name,
            request.region
        );
        let items = self.fetch_items(request.region).await?;

        let mut records: Vec<ResourceRecord> = items
            .iter()
            .filter(|item| self.in_region(item, request.region))
            .filter(|item| request.filter.matches(&extract_json_value(item, &self.def.id_field)))
            .map(|item| self.to_record(item))
            .filter(|record| !request.running_only || self.is_running(record))
            .collect();
        for (i, record) in records.iter_mut().enumerate() {
            record[0] = (i + 1).to_string();
        }

        if !records.is_empty() {
            tracing::debug!(
                "Found {} {} in {} region",
                records.len(),
                self.def.display_name,
                request.region
            );
        }
        Ok(records)
    }
}

/// Extract items from response using the response_path
fn extract_items(response: &Value, path: &str) -> Result<Vec<Value>, ProviderError> {
    if path.is_empty() {
        return match response {
            Value::Array(arr) => Ok(arr.clone()),
            Value::Null => Ok(Vec::new()),
            _ => Err(ProviderError::Malformed("expected a JSON array".to_string())),
        };
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            // GCP omits the list field entirely when there is nothing to list
            None => return Ok(Vec::new()),
        };
    }

    match current {
        Value::Array(arr) => Ok(arr.clone()),
        _ => Err(ProviderError::Malformed(format!("'{}' is not an array", path))),
    }
}

/// Post-process an item to add computed/derived fields
fn post_process_item(mut item: Value) -> Value {
    if let Value::Object(ref mut map) = item {
        for field in ["zone", "region", "machineType"] {
            if let Some(url) = map.get(field).and_then(|v| v.as_str()) {
                let short = extract_short_name(url);
                map.insert(format!("{}_short", field), Value::String(short));
            }
        }

        if let Some(created) = map.get("timeCreated").and_then(|v| v.as_str()) {
            let short = format_timestamp_short(created);
            map.insert("timeCreated_short".to_string(), Value::String(short));
        }
    }

    item
}

/// Extract short name from GCP resource URL
/// e.g., "https://www.googleapis.com/compute/v1/projects/my-project/zones/us-central1-a" -> "us-central1-a"
fn extract_short_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Format timestamp to short form
fn format_timestamp_short(timestamp: &str) -> String {
    // RFC3339 format: 2023-01-15T10:30:00.000Z
    match chrono::DateTime::parse_from_rfc3339(timestamp) {
        Ok(parsed) => parsed.format("%Y-%m-%d").to_string(),
        Err(_) => timestamp.chars().take(10).collect(),
    }
}

/// Extract a value from JSON using a dot-notation path
pub fn extract_json_value(item: &Value, path: &str) -> String {
    let mut current = item;

    for part in path.split('.') {
        let next = match part.parse::<usize>() {
            Ok(idx) => current.get(idx),
            Err(_) => current.get(part),
        };
        current = match next {
            Some(v) => v,
            None => return "-".to_string(),
        };
    }

    match current {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(_) => "[object]".to_string(),
    }
}
