//! In-memory cache provider

use super::traits::CacheProvider;
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps cached items for the lifetime of the provider
///
/// Items survive across passes of the same graph but not across processes.
#[derive(Debug, Default)]
pub struct MemoryCacheProvider {
    items: RwLock<HashMap<String, Value>>,
}

impl MemoryCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached items
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    fn provider_name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        self.items.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCacheProvider::new();
        assert!(cache.is_empty().await);

        cache.set_item("token", json!("abc")).await.unwrap();
        assert_eq!(cache.get_item("token").await.unwrap(), Some(json!("abc")));
        assert_eq!(cache.get_item("missing").await.unwrap(), None);
        assert_eq!(cache.len().await, 1);
    }
}
