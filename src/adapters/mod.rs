//! Integrations at the edge of the graph
//!
//! - [`cache`] - caching providers backing `get_or_set_cache_item`
//! - [`env`] - environment snapshots feeding env overrides

pub mod cache;
pub mod env;

pub use cache::{create_cache_provider, CacheProvider};
pub use env::EnvSnapshot;
