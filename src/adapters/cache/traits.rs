//! Caching provider abstraction
//!
//! Resolvers persist expensive values (tokens fetched from a secret store,
//! generated keys) through a caching provider. One provider instance is shared by
//! a whole graph; providers do their own locking.

use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Key/value persistence used by `get_or_set_cache_item`
///
/// The engine calls [`load`](Self::load) exactly once before any node resolves and
/// [`save`](Self::save) exactly once after every node has settled.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Provider name for logs and summaries
    fn provider_name(&self) -> &str;

    /// Prepare the provider for a pass (read persisted state, open handles)
    ///
    /// # Errors
    ///
    /// A failure here aborts `resolve_config` before any node resolves.
    async fn load(&self) -> Result<()>;

    /// Persist pending changes
    ///
    /// # Errors
    ///
    /// A failure here is returned from `resolve_config` after nodes have settled.
    async fn save(&self) -> Result<()>;

    async fn get_item(&self, key: &str) -> Result<Option<Value>>;

    async fn set_item(&self, key: &str, value: Value) -> Result<()>;
}
