//! Caching providers
//!
//! - [`MemoryCacheProvider`] keeps items for the lifetime of the graph
//! - [`FileCacheProvider`] persists items to a JSON file
//! - [`NoopCacheProvider`] stores nothing
//!
//! Custom providers implement [`CacheProvider`] and are passed to
//! [`Configraph::with_cache_provider`](crate::core::Configraph::with_cache_provider).

pub mod factory;
pub mod file;
pub mod memory;
pub mod noop;
pub mod traits;

pub use factory::create_cache_provider;
pub use file::FileCacheProvider;
pub use memory::MemoryCacheProvider;
pub use noop::NoopCacheProvider;
pub use traits::CacheProvider;
