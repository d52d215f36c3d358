//! Entities: named collections of configuration nodes

use crate::core::node::{ConfigNode, ItemDef};
use crate::core::resolver::{PickResolver, Resolver, TransformFn};
use crate::core::types::DataType;
use crate::domain::paths::validate_key;
use crate::domain::{ConfigraphError, NodeError, NodePath, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Copies a node from another entity into this one
///
/// # Examples
///
/// ```
/// use configraph::core::entity::PickSpec;
///
/// let pick = PickSpec::new("DATABASE_URL")
///     .from_entity("shared")
///     .rename("DB_URL");
/// assert_eq!(pick.target_key(), "DB_URL");
/// ```
#[derive(Clone)]
pub struct PickSpec {
    pub source_entity: Option<String>,
    pub source_key: String,
    pub rename_key: Option<String>,
    pub transform: Option<TransformFn>,
    /// Type of the picked node; defaults to the source node's type
    pub data_type: Option<Arc<DataType>>,
}

impl PickSpec {
    /// Picks `source_key` from the entity's parent unless [`from_entity`](Self::from_entity) is set
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_entity: None,
            source_key: source_key.into(),
            rename_key: None,
            transform: None,
            data_type: None,
        }
    }

    pub fn from_entity(mut self, entity: impl Into<String>) -> Self {
        self.source_entity = Some(entity.into());
        self
    }

    pub fn rename(mut self, key: impl Into<String>) -> Self {
        self.rename_key = Some(key.into());
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn with_type(mut self, data_type: Arc<DataType>) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Key the picked node gets in the picking entity
    pub fn target_key(&self) -> &str {
        self.rename_key.as_deref().unwrap_or(&self.source_key)
    }

    /// Builds the picked node from its source
    pub(crate) fn materialize(
        &self,
        entity: &str,
        source_entity: &str,
        source: &ConfigNode,
    ) -> ConfigNode {
        let resolver = Resolver::structured(PickResolver {
            source: NodePath::qualified(source_entity, source.key()),
            transform: self.transform.clone(),
        });

        let item = ItemDef {
            data_type: Some(
                self.data_type
                    .clone()
                    .unwrap_or_else(|| Arc::clone(source.data_type())),
            ),
            value: Some(resolver),
            sensitive: Some(source.is_sensitive()),
            allowed_domains: source.allowed_domains().to_vec(),
            dynamic: source.is_dynamic(),
            description: source.description().map(str::to_string),
            ..ItemDef::new()
        };

        let mut node = ConfigNode::new(entity, self.target_key(), item);
        node.picked = true;
        node
    }
}

impl fmt::Debug for PickSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickSpec")
            .field("source_entity", &self.source_entity)
            .field("source_key", &self.source_key)
            .field("rename_key", &self.rename_key)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// A named collection of configuration nodes
#[derive(Debug, Clone)]
pub struct Entity {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) picks: Vec<PickSpec>,
    pub(crate) nodes: Vec<ConfigNode>,
    pub(crate) schema_errors: Vec<NodeError>,
    pub(crate) pick_errors: Vec<NodeError>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            picks: Vec::new(),
            nodes: Vec::new(),
            schema_errors: Vec::new(),
            pick_errors: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds an item, recording an invalid or duplicate key as an entity schema error
    pub fn with_item(mut self, key: impl Into<String>, item: ItemDef) -> Self {
        let key = key.into();
        if let Err(err) = self.add_item(&key, item) {
            self.schema_errors.push(NodeError::schema(err.to_string()));
        }
        self
    }

    pub fn with_pick(mut self, pick: PickSpec) -> Self {
        self.picks.push(pick);
        self
    }

    /// Adds an item
    ///
    /// # Errors
    ///
    /// Returns a schema error if the key is invalid or already used.
    pub fn add_item(&mut self, key: &str, item: ItemDef) -> Result<()> {
        validate_key(key).map_err(ConfigraphError::Schema)?;
        if self.nodes.iter().any(|n| n.key() == key) {
            return Err(ConfigraphError::Schema(format!(
                "Entity '{}' already has an item '{key}'",
                self.name
            )));
        }
        self.nodes.push(ConfigNode::new(&self.name, key, item));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn picks(&self) -> &[PickSpec] {
        &self.picks
    }

    /// All nodes, declared items first, then picked nodes
    pub fn nodes(&self) -> &[ConfigNode] {
        &self.nodes
    }

    pub fn node(&self, key: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.key() == key)
    }

    /// A declared (not picked) node
    pub(crate) fn own_node(&self, key: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| !n.is_picked() && n.key() == key)
    }

    /// Structural problems with the entity itself (keys, parent, picks)
    pub fn schema_errors(&self) -> Vec<&NodeError> {
        self.schema_errors.iter().chain(&self.pick_errors).collect()
    }

    pub fn is_schema_valid(&self) -> bool {
        self.schema_errors.is_empty() && self.pick_errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.is_schema_valid() && self.nodes.iter().all(ConfigNode::is_valid)
    }
}
