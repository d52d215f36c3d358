//! Integration tests for the caching provider lifecycle and per-pass dedupe

use async_trait::async_trait;
use configraph::adapters::cache::{CacheProvider, FileCacheProvider, MemoryCacheProvider};
use configraph::adapters::env::EnvSnapshot;
use configraph::config::CacheMode;
use configraph::core::{Configraph, Entity, ItemDef, Resolver};
use configraph::domain::{ConfigraphError, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every provider call on top of an in-memory store
#[derive(Default)]
struct RecordingProvider {
    inner: MemoryCacheProvider,
    calls: Mutex<Vec<String>>,
    fail_load: bool,
}

impl RecordingProvider {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl CacheProvider for RecordingProvider {
    fn provider_name(&self) -> &str {
        "recording"
    }

    async fn load(&self) -> Result<()> {
        self.record("load");
        if self.fail_load {
            return Err(ConfigraphError::Io("disk on fire".to_string()));
        }
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        self.record("save");
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        self.record("get");
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<()> {
        self.record("set");
        self.inner.set_item(key, value).await
    }
}

/// A resolver that caches under `key`, counting how often the value is computed
fn cached(key: &'static str, computed: &Arc<AtomicUsize>) -> Resolver {
    let computed = Arc::clone(computed);
    Resolver::from_fn(move |ctx| {
        let computed = Arc::clone(&computed);
        async move {
            ctx.get_or_set_cache_item(key, move || async move {
                let n = computed.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok::<_, anyhow::Error>(json!(format!("{key}-{n}")))
            })
            .await
        }
    })
}

fn entity(computed: &Arc<AtomicUsize>) -> Entity {
    Entity::new("app")
        .with_item("FIRST", ItemDef::new().resolver(cached("token", computed)))
        .with_item("SECOND", ItemDef::new().resolver(cached("token", computed)))
        .with_item("OTHER", ItemDef::new().resolver(cached("other", computed)))
}

fn graph_with(provider: Arc<dyn CacheProvider>) -> Configraph {
    Configraph::new()
        .with_env(EnvSnapshot::empty())
        .with_cache_provider(provider)
}

#[tokio::test]
async fn test_same_key_computed_once_per_pass() {
    let provider = Arc::new(RecordingProvider::default());
    let computed = Arc::new(AtomicUsize::new(0));

    let mut graph = graph_with(provider.clone());
    graph.add_entity(entity(&computed)).unwrap();
    let summary = graph.resolve_config().await.unwrap();

    assert!(summary.is_successful());
    assert_eq!(summary.cache_provider, "recording");
    assert_eq!(computed.load(Ordering::SeqCst), 2);
    assert_eq!(
        graph.resolved_value("app!FIRST").unwrap(),
        graph.resolved_value("app!SECOND").unwrap()
    );
    assert_ne!(
        graph.resolved_value("app!FIRST").unwrap(),
        graph.resolved_value("app!OTHER").unwrap()
    );
    assert_eq!(provider.count("get"), 2);
    assert_eq!(provider.count("set"), 2);
}

#[tokio::test]
async fn test_load_before_items_and_save_after() {
    let provider = Arc::new(RecordingProvider::default());
    let computed = Arc::new(AtomicUsize::new(0));

    let mut graph = graph_with(provider.clone());
    graph.add_entity(entity(&computed)).unwrap();
    graph.resolve_config().await.unwrap();

    let calls = provider.calls();
    assert_eq!(calls.first().map(String::as_str), Some("load"));
    assert_eq!(calls.last().map(String::as_str), Some("save"));
    assert_eq!(provider.count("load"), 1);
    assert_eq!(provider.count("save"), 1);
}

#[tokio::test]
async fn test_cached_items_reused_across_passes() {
    let provider = Arc::new(RecordingProvider::default());
    let computed = Arc::new(AtomicUsize::new(0));

    let mut graph = graph_with(provider.clone());
    graph.add_entity(entity(&computed)).unwrap();
    graph.resolve_config().await.unwrap();
    let first = graph.resolved_value("app!FIRST").unwrap().cloned();

    graph.resolve_config().await.unwrap();

    assert_eq!(computed.load(Ordering::SeqCst), 2);
    assert_eq!(graph.resolved_value("app!FIRST").unwrap().cloned(), first);
    assert_eq!(provider.count("load"), 2);
    assert_eq!(provider.count("save"), 2);
}

#[tokio::test]
async fn test_clear_mode_recomputes_and_overwrites() {
    let provider = Arc::new(RecordingProvider::default());
    let computed = Arc::new(AtomicUsize::new(0));

    let mut graph = graph_with(provider.clone());
    graph.add_entity(entity(&computed)).unwrap();
    graph.resolve_config().await.unwrap();
    let stale = graph.resolved_value("app!FIRST").unwrap().cloned();

    let mut graph = graph_with(provider.clone()).with_cache_mode(CacheMode::Clear);
    graph.add_entity(entity(&computed)).unwrap();
    graph.resolve_config().await.unwrap();
    let fresh = graph.resolved_value("app!FIRST").unwrap().cloned();

    assert_eq!(computed.load(Ordering::SeqCst), 4);
    assert_eq!(provider.count("get"), 2);
    assert_eq!(provider.count("set"), 4);
    assert_ne!(fresh, stale);
    assert_eq!(provider.inner.get_item("token").await.unwrap(), fresh);
}

#[tokio::test]
async fn test_skip_mode_bypasses_items_but_keeps_lifecycle() {
    let provider = Arc::new(RecordingProvider::default());
    let computed = Arc::new(AtomicUsize::new(0));

    let mut graph = graph_with(provider.clone()).with_cache_mode(CacheMode::Skip);
    graph.add_entity(entity(&computed)).unwrap();
    graph.resolve_config().await.unwrap();

    assert_eq!(computed.load(Ordering::SeqCst), 2);
    assert_eq!(provider.calls(), vec!["load", "save"]);
}

#[tokio::test]
async fn test_load_failure_aborts_pass() {
    let provider = Arc::new(RecordingProvider {
        fail_load: true,
        ..Default::default()
    });
    let computed = Arc::new(AtomicUsize::new(0));

    let mut graph = graph_with(provider.clone());
    graph.add_entity(entity(&computed)).unwrap();
    let err = graph.resolve_config().await.unwrap_err();

    assert!(matches!(err, ConfigraphError::Cache(_)));
    assert_eq!(computed.load(Ordering::SeqCst), 0);
    assert_eq!(provider.calls(), vec!["load"]);
}

#[tokio::test]
async fn test_file_provider_persists_between_graphs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    let computed = Arc::new(AtomicUsize::new(0));

    let mut graph = graph_with(Arc::new(FileCacheProvider::new(&path)));
    graph.add_entity(entity(&computed)).unwrap();
    graph.resolve_config().await.unwrap();
    let persisted = graph.resolved_value("app!OTHER").unwrap().cloned();
    assert!(path.exists());

    let mut graph = graph_with(Arc::new(FileCacheProvider::new(&path)));
    graph.add_entity(entity(&computed)).unwrap();
    graph.resolve_config().await.unwrap();

    assert_eq!(computed.load(Ordering::SeqCst), 2);
    assert_eq!(graph.resolved_value("app!OTHER").unwrap().cloned(), persisted);
}
