//! On-disk cache of resource tables
//!
//! Each entry is one JSON file at `<root>/<key>.json`. Writes go to a
//! temporary sibling first and are renamed into place, so a reader sees either
//! the previous entry or the new one.

use super::error::InventoryError;
use super::key::CacheKey;
use super::table::TableData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const TEMP_SUFFIX: &str = ".tmp";

/// A stored table and when it was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub written_at: DateTime<Utc>,
    pub data: TableData,
    /// Regions skipped by a partial refresh; empty when the table is complete
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_regions: Vec<String>,
}

impl CacheEntry {
    pub fn is_complete(&self) -> bool {
        self.failed_regions.is_empty()
    }
}

/// Handle on the cache directory, opened once per invocation
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open (and create if needed) the cache directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, InventoryError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| InventoryError::cache_io(&root, e))?;
        tracing::debug!("Cache opened at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing a key
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Store `data` under `key`, replacing any previous entry
    pub async fn write(&self, key: &CacheKey, data: &TableData) -> Result<CacheEntry, InventoryError> {
        self.write_with_failures(key, data, &[]).await
    }

    /// Store a table that is missing the listed regions
    pub async fn write_with_failures(
        &self,
        key: &CacheKey,
        data: &TableData,
        failed_regions: &[String],
    ) -> Result<CacheEntry, InventoryError> {
        let entry = CacheEntry {
            key: key.as_str().to_string(),
            written_at: Utc::now(),
            data: data.clone(),
            failed_regions: failed_regions.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&entry).map_err(|e| InventoryError::CacheCorrupt {
            key: key.to_string(),
            reason: format!("failed to serialize entry: {}", e),
        })?;

        let path = self.path_for(key);
        let Some(parent) = path.parent() else {
            return Err(InventoryError::cache_io(
                &path,
                std::io::Error::new(ErrorKind::InvalidInput, "entry path has no parent"),
            ));
        };
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| InventoryError::cache_io(parent, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(".{}.{}{}", file_name, Uuid::new_v4(), TEMP_SUFFIX));

        if let Err(e) = write_synced(&temp_path, &content).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(InventoryError::cache_io(&temp_path, e));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(InventoryError::cache_io(&path, e));
        }

        tracing::debug!("Cached {} rows under {}", data.len(), key);
        Ok(entry)
    }

    /// Most recent table for `key`, or `None` if nothing was ever written
    pub async fn read(&self, key: &CacheKey) -> Result<Option<TableData>, InventoryError> {
        Ok(self.read_entry(key).await?.map(|entry| entry.data))
    }

    /// Like [`CacheStore::read`] but keeps the entry metadata
    pub async fn read_entry(&self, key: &CacheKey) -> Result<Option<CacheEntry>, InventoryError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Cache miss for {}", key);
                return Ok(None);
            }
            Err(e) => return Err(InventoryError::cache_io(&path, e)),
        };

        let entry: CacheEntry =
            serde_json::from_slice(&content).map_err(|e| InventoryError::CacheCorrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if entry.key != key.as_str() {
            return Err(InventoryError::CacheCorrupt {
                key: key.to_string(),
                reason: format!("entry is stamped with key {}", entry.key),
            });
        }

        tracing::debug!("Cache hit for {} ({} rows)", key, entry.data.len());
        Ok(Some(entry))
    }

    /// Every entry of a provider, optionally narrowed to one service, ordered by key
    pub async fn read_all(
        &self,
        provider: &str,
        service: Option<&str>,
    ) -> Result<Vec<CacheEntry>, InventoryError> {
        let mut keys: Vec<CacheKey> = self
            .entry_files()
            .await?
            .iter()
            .filter_map(|rel| CacheKey::from_relative_path(rel))
            .filter(|key| key.in_scope(provider, service))
            .collect();
        keys.sort();

        let mut entries = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(entry) = self.read_entry(key).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Paths of all entry files, relative to the root
    async fn entry_files(&self) -> Result<Vec<PathBuf>, InventoryError> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| InventoryError::cache_io(&dir, e))?;
            while let Some(item) = read_dir
                .next_entry()
                .await
                .map_err(|e| InventoryError::cache_io(&dir, e))?
            {
                let path = item.path();
                let file_type = item
                    .file_type()
                    .await
                    .map_err(|e| InventoryError::cache_io(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let is_temp = path
                    .file_name()
                    .map(|n| is_temp_name(&n.to_string_lossy()))
                    .unwrap_or(true);
                if is_temp {
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(&self.root) {
                    files.push(rel.to_path_buf());
                }
            }
        }

        Ok(files)
    }
}

/// Names produced by [`CacheStore::write`] before the rename
fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    Ok(())
}
