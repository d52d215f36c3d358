//! Cache provider that stores nothing

use super::traits::CacheProvider;
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Every lookup misses and every write is discarded
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheProvider;

#[async_trait]
impl CacheProvider for NoopCacheProvider {
    fn provider_name(&self) -> &str {
        "none"
    }

    async fn load(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        Ok(())
    }

    async fn get_item(&self, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn set_item(&self, _key: &str, _value: Value) -> Result<()> {
        Ok(())
    }
}
