//! JSON file cache provider

use super::traits::CacheProvider;
use crate::domain::{ConfigraphError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const CACHE_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    items: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Default)]
struct CacheData {
    items: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

/// Persists cached items to a JSON file between processes
///
/// The file is read on `load` and rewritten on `save` only when an item changed.
#[derive(Debug)]
pub struct FileCacheProvider {
    path: PathBuf,
    data: RwLock<CacheData>,
}

impl FileCacheProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(CacheData::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the item was last written, if cached
    pub async fn updated_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.data
            .read()
            .await
            .items
            .get(key)
            .map(|entry| entry.updated_at)
    }
}

#[async_trait]
impl CacheProvider for FileCacheProvider {
    fn provider_name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Result<()> {
        let mut data = self.data.write().await;
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "Cache file not found, starting empty");
            *data = CacheData::default();
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ConfigraphError::Cache(format!(
                "Failed to read cache file {}: {e}",
                self.path.display()
            ))
        })?;
        let file: CacheFile = serde_json::from_str(&contents).map_err(|e| {
            ConfigraphError::Cache(format!(
                "Cache file {} is corrupt: {e}",
                self.path.display()
            ))
        })?;
        if file.version != CACHE_FILE_VERSION {
            return Err(ConfigraphError::Cache(format!(
                "Unsupported cache file version {} (expected {CACHE_FILE_VERSION})",
                file.version
            )));
        }

        tracing::debug!(
            path = %self.path.display(),
            items = file.items.len(),
            "Loaded cache file"
        );
        *data = CacheData {
            items: file.items,
            dirty: false,
        };
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let mut data = self.data.write().await;
        if !data.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            items: data.items.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        // Write to a sibling temp file, then rename over the target
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            ConfigraphError::Cache(format!(
                "Failed to write cache file {}: {e}",
                tmp_path.display()
            ))
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        data.dirty = false;
        tracing::debug!(path = %self.path.display(), items = file.items.len(), "Saved cache file");
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .data
            .read()
            .await
            .items
            .get(key)
            .map(|entry| entry.value.clone()))
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self.data.write().await;
        data.items.insert(
            key.to_string(),
            CacheEntry {
                value,
                updated_at: Utc::now(),
            },
        );
        data.dirty = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_items_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = FileCacheProvider::new(&path);
        cache.load().await.unwrap();
        cache.set_item("token", json!({"v": 1})).await.unwrap();
        assert!(cache.updated_at("token").await.is_some());
        cache.save().await.unwrap();
        assert!(path.exists());

        let reopened = FileCacheProvider::new(&path);
        reopened.load().await.unwrap();
        assert_eq!(
            reopened.get_item("token").await.unwrap(),
            Some(json!({"v": 1}))
        );
    }

    #[tokio::test]
    async fn test_save_without_changes_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let cache = FileCacheProvider::new(&path);
        cache.load().await.unwrap();
        cache.save().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileCacheProvider::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ConfigraphError::Cache(_)));
    }
}
