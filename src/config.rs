//! Configuration Management
//!
//! Handles persistent configuration storage for cloudinv.

use crate::inventory::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-region deadline applied when the config does not set one
pub const DEFAULT_REGION_TIMEOUT_SECS: u64 = 30;

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Project queried when no --project flag is given
    #[serde(default)]
    pub project_id: Option<String>,
    /// Where cache entries are stored
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Per-region call deadline in seconds, 0 disables it
    #[serde(default)]
    pub region_timeout_secs: Option<u64>,
    /// Behaviour when one region of a fan-out fails
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudinv").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self) -> Option<String> {
        self.project_id
            .clone()
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Cache root (config > platform cache dir > ~/.cloudinv/cache)
    pub fn cache_root(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("cloudinv");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".cloudinv").join("cache");
        }
        PathBuf::from(".cloudinv-cache")
    }

    /// Per-region deadline, `None` when disabled
    pub fn region_timeout(&self) -> Option<Duration> {
        match self.region_timeout_secs.unwrap_or(DEFAULT_REGION_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy.unwrap_or_default()
    }
}
