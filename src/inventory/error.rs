//! Error types for inventory queries

use std::time::Duration;
use thiserror::Error;

/// Failure of a single provider listing call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The API answered with a non-success status
    #[error("API request failed: {status}")]
    Status { status: u16 },

    /// The request never produced a response (DNS, TLS, connection reset...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials could not be obtained
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The call exceeded its deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response could not be turned into records
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Rate limiting and server-side failures are worth retrying by hand
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Status { status } => *status == 429 || *status >= 500,
            ProviderError::Transport(_) | ProviderError::Timeout(_) => true,
            ProviderError::Auth(_) | ProviderError::Malformed(_) => false,
        }
    }
}

/// Errors surfaced by the inventory subsystem
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Unknown provider, service, region or filter. Raised before any I/O.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A live fetch failed for one region
    #[error("{provider}/{service} listing failed in region {region}: {source}")]
    ProviderApi {
        provider: String,
        service: String,
        region: String,
        #[source]
        source: ProviderError,
    },

    /// A client returned a record that does not line up with the header
    #[error("record from region {region} has {found} fields, header has {expected}")]
    SchemaMismatch {
        region: String,
        expected: usize,
        found: usize,
    },

    /// A stored entry exists but cannot be trusted
    #[error("cache entry {key} is corrupt: {reason}")]
    CacheCorrupt { key: String, reason: String },

    /// The rendered table could not be written out
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),

    /// The cache directory could not be read or written
    #[error("cache I/O error on {path}: {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl InventoryError {
    pub(crate) fn cache_io(path: &std::path::Path, source: std::io::Error) -> Self {
        InventoryError::CacheIo {
            path: path.display().to_string(),
            source,
        }
    }

    /// Check if this error came from a live provider call
    #[must_use]
    pub fn is_provider_error(&self) -> bool {
        matches!(self, InventoryError::ProviderApi { .. })
    }

    /// Check if this error means the local cache needs to be refreshed
    #[must_use]
    pub fn is_cache_corrupt(&self) -> bool {
        matches!(self, InventoryError::CacheCorrupt { .. })
    }
}
