//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::{validate_project_id, GcpCredentials};
use super::http::GcpHttpClient;
use crate::inventory::error::ProviderError;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Base URLs of the APIs the inventory talks to
#[derive(Debug, Clone)]
pub struct Endpoints {
    compute: Url,
    storage: Url,
    sqladmin: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: Url::parse("https://compute.googleapis.com/compute/v1/")
                .expect("static URL is valid"),
            storage: Url::parse("https://storage.googleapis.com/storage/v1/")
                .expect("static URL is valid"),
            sqladmin: Url::parse("https://sqladmin.googleapis.com/v1/")
                .expect("static URL is valid"),
        }
    }
}

impl Endpoints {
    /// Serve every API from one host, keeping the public path layout
    pub fn rooted_at(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("Invalid endpoint base: {}", base))?;
        Ok(Self {
            compute: base.join("compute/v1/")?,
            storage: base.join("storage/v1/")?,
            sqladmin: base.join("v1/")?,
        })
    }
}

#[derive(Clone)]
enum Credentials {
    Adc(GcpCredentials),
    Static(String),
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    credentials: Credentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    endpoints: Endpoints,
}

impl GcpClient {
    /// Create a client authenticated with Application Default Credentials
    pub async fn new(project_id: &str) -> Result<Self> {
        check_project_id(project_id)?;
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials: Credentials::Adc(credentials),
            http,
            project_id: project_id.to_string(),
            endpoints: Endpoints::default(),
        })
    }

    /// Create a client with a fixed bearer token and custom endpoints
    pub fn with_static_token(project_id: &str, token: &str, endpoints: Endpoints) -> Result<Self> {
        check_project_id(project_id)?;
        Ok(Self {
            credentials: Credentials::Static(token.to_string()),
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            endpoints,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String, ProviderError> {
        match &self.credentials {
            Credentials::Adc(credentials) => credentials
                .get_token()
                .await
                .map_err(|e| ProviderError::Auth(format!("{:#}", e))),
            Credentials::Static(token) => Ok(token.clone()),
        }
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value, ProviderError> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!("{}projects/{}/{}", self.endpoints.compute, self.project_id, path)
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, zone: &str, resource: &str) -> String {
        self.compute_url(&format!("zones/{}/{}", zone, resource))
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.storage, path)
    }

    // =========================================================================
    // Cloud SQL Admin API helpers
    // =========================================================================

    /// Build Cloud SQL Admin API URL
    pub fn sqladmin_url(&self, path: &str) -> String {
        format!("{}projects/{}/{}", self.endpoints.sqladmin, self.project_id, path)
    }
}

/// The project id ends up in every request path
fn check_project_id(project_id: &str) -> Result<()> {
    if !validate_project_id(project_id) {
        anyhow::bail!("Invalid project ID: {:?}", project_id);
    }
    Ok(())
}
