//! The configuration graph
//!
//! [`Configraph`] owns every entity and the caching provider, runs resolution
//! passes and answers lookups by path.
//!
//! # Example
//!
//! ```rust
//! use configraph::core::{Configraph, Entity, ItemDef, Resolver};
//! use serde_json::json;
//!
//! # async fn example() -> configraph::domain::Result<()> {
//! let app = Entity::new("app")
//!     .with_item(
//!         "c",
//!         ItemDef::new().resolver(Resolver::from_fn(|ctx| async move {
//!             let a = ctx.get("a").await?.as_i64().unwrap_or(0);
//!             let b = ctx.get("b").await?.as_i64().unwrap_or(0);
//!             Ok::<_, anyhow::Error>(json!(a + b))
//!         })),
//!     )
//!     .with_item("a", ItemDef::new().value(2))
//!     .with_item("b", ItemDef::new().value(3));
//!
//! let mut graph = Configraph::new();
//! graph.add_entity(app)?;
//! graph.resolve_config().await?;
//! assert_eq!(graph.resolved_value("app!c")?, Some(&json!(5)));
//! # Ok(())
//! # }
//! ```

pub(crate) mod pass;
pub mod summary;

pub use summary::{NodeSnapshot, ResolutionSummary};

use crate::adapters::cache::{create_cache_provider, CacheProvider, MemoryCacheProvider};
use crate::adapters::env::EnvSnapshot;
use crate::config::{CacheMode, ConfigraphSettings, ResolutionConfig, SensitiveValue};
use crate::core::entity::Entity;
use crate::core::node::{ConfigNode, NodeState};
use crate::domain::{ConfigraphError, NodeError, NodePath, Result};
use chrono::Utc;
use pass::PassState;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Owns entities and drives resolution passes
pub struct Configraph {
    entities: Vec<Entity>,
    cache: Arc<dyn CacheProvider>,
    cache_mode: CacheMode,
    resolution: ResolutionConfig,
    env: Option<EnvSnapshot>,
    last_summary: Option<ResolutionSummary>,
}

impl Default for Configraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Configraph {
    /// An empty graph with an in-memory cache and default settings
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            cache: Arc::new(MemoryCacheProvider::new()),
            cache_mode: CacheMode::Default,
            resolution: ResolutionConfig::default(),
            env: None,
            last_summary: None,
        }
    }

    /// Builds a graph configured from engine settings
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the cache provider cannot
    /// be created.
    pub fn from_settings(settings: &ConfigraphSettings) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| ConfigraphError::Configuration(format!("Invalid settings: {e}")))?;

        Ok(Self {
            cache: create_cache_provider(&settings.cache)?,
            cache_mode: settings.cache.mode,
            resolution: settings.resolution.clone(),
            ..Self::new()
        })
    }

    pub fn with_cache_provider(mut self, provider: Arc<dyn CacheProvider>) -> Self {
        self.cache = provider;
        self
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Stops waiting for unsettled nodes after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.resolution.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Uses a fixed environment instead of capturing the process environment per pass
    pub fn with_env(mut self, env: EnvSnapshot) -> Self {
        self.env = Some(env);
        self
    }

    /// Gives every top-level node an implicit env override named `prefix + key`
    pub fn with_env_overrides(mut self, prefix: Option<&str>) -> Self {
        self.resolution.env_overrides = true;
        self.resolution.env_prefix = prefix.map(str::to_string);
        self
    }

    pub fn cache_provider(&self) -> &Arc<dyn CacheProvider> {
        &self.cache
    }

    /// Registers an entity
    ///
    /// # Errors
    ///
    /// Returns a schema error if an entity with the same name exists or the name
    /// is not a valid key.
    pub fn add_entity(&mut self, entity: Entity) -> Result<()> {
        crate::domain::paths::validate_key(entity.name()).map_err(ConfigraphError::Schema)?;
        if self.entity(entity.name()).is_some() {
            return Err(ConfigraphError::Schema(format!(
                "Entity '{}' is already registered",
                entity.name()
            )));
        }
        tracing::debug!(
            entity = %entity.name(),
            items = entity.nodes().len(),
            picks = entity.picks().len(),
            "Registered entity"
        );
        self.entities.push(entity);
        Ok(())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name() == name)
    }

    /// Top-level node at `entity!key`
    pub fn node(&self, path: &str) -> Option<&ConfigNode> {
        let path = NodePath::new(path).ok()?;
        self.entity(path.entity()?)?.node(path.key())
    }

    /// State of any node, composite children included
    ///
    /// # Errors
    ///
    /// Returns a schema error if the path is malformed, not entity-qualified or
    /// does not exist.
    pub fn get_node(&self, path: &str) -> Result<&NodeState> {
        let parsed = NodePath::new(path).map_err(ConfigraphError::Schema)?;
        let entity_name = parsed.entity().ok_or_else(|| {
            ConfigraphError::Schema(format!("Path '{path}' must be qualified as entity!key"))
        })?;
        let entity = self
            .entity(entity_name)
            .ok_or_else(|| ConfigraphError::Schema(format!("Entity '{entity_name}' does not exist")))?;
        entity
            .node(parsed.key())
            .and_then(|node| node.find(parsed.child_segments()))
            .ok_or_else(|| ConfigraphError::Schema(format!("Node '{path}' does not exist")))
    }

    /// Resolved value of any node (`None` when empty)
    pub fn resolved_value(&self, path: &str) -> Result<Option<&Value>> {
        Ok(self.get_node(path)?.resolved_value.as_ref())
    }

    /// True when every entity and node is valid
    pub fn is_valid(&self) -> bool {
        self.entities.iter().all(Entity::is_valid)
    }

    /// Summary of the most recent pass
    pub fn summary(&self) -> Option<&ResolutionSummary> {
        self.last_summary.as_ref()
    }

    /// Snapshots of every top-level node in registration order
    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        self.entities
            .iter()
            .flat_map(|entity| {
                entity
                    .nodes()
                    .iter()
                    .map(|node| NodeSnapshot::from_state(entity.name(), node.state()))
            })
            .collect()
    }

    /// `{ "entity!key": value }` for every valid, non-empty top-level node
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.entities
            .iter()
            .flat_map(|entity| entity.nodes())
            .filter(|node| node.is_valid())
            .filter_map(|node| {
                node.resolved_value()
                    .filter(|v| !v.is_null())
                    .map(|v| (node.full_path(), v.clone()))
            })
            .collect()
    }

    /// Resolved values of sensitive nodes, wrapped for the redaction layer
    ///
    /// Sensitive children of non-sensitive composites are reported individually.
    pub fn sensitive_values(&self) -> Vec<SensitiveValue> {
        fn collect(entity: &str, state: &NodeState, domains: &[String], out: &mut Vec<SensitiveValue>) {
            if state.sensitive {
                if let Some(value) = state.resolved_value.as_ref().filter(|v| !v.is_null()) {
                    out.push(SensitiveValue::new(
                        format!("{entity}!{}", state.path),
                        domains.to_vec(),
                        value,
                    ));
                }
                return;
            }
            for child in &state.children {
                collect(entity, child, &[], out);
            }
        }

        let mut values = Vec::new();
        for entity in &self.entities {
            for node in entity.nodes() {
                collect(entity.name(), node.state(), node.allowed_domains(), &mut values);
            }
        }
        values
    }

    /// Creates picked nodes from their sources, replacing those of earlier passes
    fn materialize_picks(&mut self) {
        let mut planned = Vec::with_capacity(self.entities.len());

        for entity in &self.entities {
            let mut picked: Vec<ConfigNode> = Vec::new();
            let mut errors = Vec::new();

            if let Some(parent) = entity.parent() {
                if self.entity(parent).is_none() {
                    errors.push(NodeError::schema(format!(
                        "Parent entity '{parent}' does not exist"
                    )));
                }
            }

            for pick in entity.picks() {
                let Some(source_entity) = pick.source_entity.as_deref().or(entity.parent()) else {
                    errors.push(NodeError::schema(format!(
                        "Pick of '{}' names no source entity and entity '{}' has no parent",
                        pick.source_key,
                        entity.name()
                    )));
                    continue;
                };
                let Some(source) = self
                    .entity(source_entity)
                    .and_then(|e| e.own_node(&pick.source_key))
                else {
                    errors.push(NodeError::schema(format!(
                        "Pick source '{source_entity}!{}' does not exist",
                        pick.source_key
                    )));
                    continue;
                };

                let target = pick.target_key();
                if entity.own_node(target).is_some() || picked.iter().any(|n| n.key() == target) {
                    errors.push(NodeError::schema(format!(
                        "Pick of '{source_entity}!{}' as '{target}' collides with an existing item",
                        pick.source_key
                    )));
                    continue;
                }

                picked.push(pick.materialize(entity.name(), source_entity, source));
            }

            planned.push((picked, errors));
        }

        for (entity, (picked, errors)) in self.entities.iter_mut().zip(planned) {
            entity.nodes.retain(|node| !node.is_picked());
            entity.nodes.extend(picked);
            entity.pick_errors = errors;
        }
    }

    /// Resolves every node of every entity
    ///
    /// Node-level failures are recorded on the nodes; inspect them afterwards with
    /// [`get_node`](Self::get_node) or [`snapshots`](Self::snapshots).
    ///
    /// # Errors
    ///
    /// Only caching provider failures (`load`, `save`) and an unreadable `.env`
    /// file are returned.
    pub async fn resolve_config(&mut self) -> Result<ResolutionSummary> {
        let started = Instant::now();
        let started_at = Utc::now();
        let pass_id = Uuid::new_v4();

        self.materialize_picks();

        let env = match &self.env {
            Some(env) => env.clone(),
            None => EnvSnapshot::capture(&self.resolution.dotenv_files)?,
        };

        let roots: Vec<_> = self
            .entities
            .iter()
            .flat_map(|entity| entity.nodes().iter().map(|node| Arc::clone(&node.spec)))
            .collect();
        crate::log_pass_start!(pass_id, self.entities.len(), roots.len());

        let provider_name = self.cache.provider_name().to_string();
        self.cache.load().await.map_err(|e| {
            ConfigraphError::Cache(format!("Cache provider '{provider_name}' failed to load: {e}"))
        })?;

        let entity_names: HashSet<String> =
            self.entities.iter().map(|e| e.name().to_string()).collect();
        let implicit_env_prefix = self
            .resolution
            .env_overrides
            .then(|| self.resolution.env_prefix.clone().unwrap_or_default());
        let pass = Arc::new(PassState::new(
            roots,
            entity_names,
            Arc::clone(&self.cache),
            self.cache_mode,
            env,
            implicit_env_prefix,
        ));

        let timed_out = match self.resolution.timeout() {
            Some(limit) => tokio::time::timeout(limit, pass.resolve_all()).await.is_err(),
            None => {
                pass.resolve_all().await;
                false
            }
        };
        if timed_out {
            tracing::warn!(
                pass_id = %pass_id,
                timeout_ms = self.resolution.timeout_ms,
                "Resolution pass timed out; unsettled nodes marked invalid"
            );
        }

        for entity in &mut self.entities {
            for node in &mut entity.nodes {
                if let Some(state) = pass.take_state(&node.full_path()) {
                    node.state = state;
                }
            }
        }
        pass.finish();

        let save_result = self.cache.save().await;

        let summary = self.build_summary(pass_id, started_at, started.elapsed(), timed_out);
        summary.log_summary();
        self.last_summary = Some(summary.clone());

        save_result.map_err(|e| {
            ConfigraphError::Cache(format!("Cache provider '{provider_name}' failed to save: {e}"))
        })?;
        Ok(summary)
    }

    fn build_summary(
        &self,
        pass_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        duration: Duration,
        timed_out: bool,
    ) -> ResolutionSummary {
        let nodes: Vec<&ConfigNode> = self.entities.iter().flat_map(|e| e.nodes()).collect();
        let invalid_paths: Vec<String> = nodes
            .iter()
            .filter(|node| !node.is_valid())
            .map(|node| node.full_path())
            .collect();
        let entity_errors = self
            .entities
            .iter()
            .flat_map(|entity| {
                entity
                    .schema_errors()
                    .into_iter()
                    .map(move |err| format!("{}: {err}", entity.name()))
            })
            .collect();

        ResolutionSummary {
            pass_id,
            started_at,
            duration,
            entity_count: self.entities.len(),
            node_count: nodes.len(),
            valid_count: nodes.len() - invalid_paths.len(),
            invalid_count: invalid_paths.len(),
            invalid_paths,
            entity_errors,
            timed_out,
            cache_provider: self.cache.provider_name().to_string(),
        }
    }
}

impl std::fmt::Debug for Configraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configraph")
            .field("entities", &self.entities.iter().map(Entity::name).collect::<Vec<_>>())
            .field("cache", &self.cache.provider_name())
            .field("cache_mode", &self.cache_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::PickSpec;
    use crate::core::node::ItemDef;
    use serde_json::json;

    #[test]
    fn test_duplicate_entity_rejected() {
        let mut graph = Configraph::new();
        graph.add_entity(Entity::new("app")).unwrap();
        assert!(matches!(
            graph.add_entity(Entity::new("app")),
            Err(ConfigraphError::Schema(_))
        ));
    }

    #[test]
    fn test_get_node_requires_qualified_path() {
        let mut graph = Configraph::new();
        graph
            .add_entity(Entity::new("app").with_item("A", ItemDef::new()))
            .unwrap();
        assert!(graph.get_node("A").is_err());
        assert!(graph.get_node("app!A").is_ok());
        assert!(graph.get_node("app!B").is_err());
        assert!(graph.get_node("other!A").is_err());
    }

    #[test]
    fn test_pick_collisions_and_missing_sources() {
        let mut graph = Configraph::new();
        graph
            .add_entity(Entity::new("shared").with_item("TOKEN", ItemDef::new()))
            .unwrap();
        graph
            .add_entity(
                Entity::new("app")
                    .with_parent("shared")
                    .with_item("TOKEN", ItemDef::new())
                    .with_pick(PickSpec::new("TOKEN"))
                    .with_pick(PickSpec::new("TOKEN").rename("API_TOKEN"))
                    .with_pick(PickSpec::new("MISSING")),
            )
            .unwrap();
        graph
            .add_entity(Entity::new("orphan").with_pick(PickSpec::new("TOKEN")))
            .unwrap();

        graph.materialize_picks();
        graph.materialize_picks();

        let app = graph.entity("app").unwrap();
        assert_eq!(app.nodes().len(), 2);
        assert!(app.node("API_TOKEN").unwrap().is_picked());
        assert_eq!(app.schema_errors().len(), 2);
        assert_eq!(graph.entity("orphan").unwrap().schema_errors().len(), 1);
    }

    #[tokio::test]
    async fn test_to_json_map_skips_invalid_and_empty() {
        let mut graph = Configraph::new().with_env(EnvSnapshot::empty());
        graph
            .add_entity(
                Entity::new("app")
                    .with_item("A", ItemDef::new().value(1))
                    .with_item("B", ItemDef::new())
                    .with_item("C", ItemDef::new().required()),
            )
            .unwrap();
        graph.resolve_config().await.unwrap();

        let map = graph.to_json_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map["app!A"], json!(1));
        assert!(!graph.is_valid());
    }
}
