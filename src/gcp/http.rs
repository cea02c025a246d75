//! HTTP utilities for GCP REST API calls

use crate::inventory::error::ProviderError;
use reqwest::Client;
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and strip control characters before logging it
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("cloudinv/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, ProviderError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(format!("failed to parse response JSON: {}", e)))
    }
}

/// Turn a provider failure into a message fit for the terminal
/// Security: generic messages avoid echoing raw API payloads
pub fn format_api_error(error: &ProviderError) -> String {
    match error {
        ProviderError::Status { status: 400 } => "Invalid request. Check your parameters.".to_string(),
        ProviderError::Status { status: 401 } => {
            "Authentication failed. Run 'gcloud auth application-default login'.".to_string()
        }
        ProviderError::Status { status: 403 } => {
            "Permission denied. Check your GCP IAM permissions.".to_string()
        }
        ProviderError::Status { status: 404 } => "Resource not found.".to_string(),
        ProviderError::Status { status: 429 } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        ProviderError::Status { status } if *status >= 500 => {
            "GCP service temporarily unavailable. Please try again.".to_string()
        }
        ProviderError::Status { status } => format!("Request failed with status {}.", status),
        ProviderError::Transport(_) => {
            "Request failed. Check your network connection and try again.".to_string()
        }
        ProviderError::Timeout(after) => format!("No response within {}s.", after.as_secs()),
        ProviderError::Auth(_) => {
            "Could not obtain GCP credentials. Run 'gcloud auth application-default login'."
                .to_string()
        }
        ProviderError::Malformed(detail) => {
            let sanitized: String = detail
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(80)
                .collect();
            format!("Unexpected response: {}", sanitized)
        }
    }
}
