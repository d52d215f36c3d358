//! Cache provider factory

use super::{CacheProvider, FileCacheProvider, MemoryCacheProvider, NoopCacheProvider};
use crate::config::{CacheConfig, CacheProviderKind};
use crate::domain::{ConfigraphError, Result};
use std::sync::Arc;

/// Create a cache provider from settings
///
/// # Errors
///
/// Returns a configuration error if the file provider is selected without a path.
pub fn create_cache_provider(config: &CacheConfig) -> Result<Arc<dyn CacheProvider>> {
    match config.provider {
        CacheProviderKind::Memory => {
            tracing::debug!("Creating in-memory cache provider");
            Ok(Arc::new(MemoryCacheProvider::new()))
        }
        CacheProviderKind::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                ConfigraphError::Configuration(
                    "cache.path is required when cache.provider = 'file'".to_string(),
                )
            })?;
            tracing::debug!(path = %path, "Creating file cache provider");
            Ok(Arc::new(FileCacheProvider::new(path)))
        }
        CacheProviderKind::None => Ok(Arc::new(NoopCacheProvider)),
    }
}
