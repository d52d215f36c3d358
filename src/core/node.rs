//! Configuration nodes
//!
//! An [`ItemDef`] is what a schema author writes for one key: a type, a value or
//! resolver, overrides and flags. Registering it in an [`Entity`](crate::core::Entity)
//! materializes a [`ConfigNode`], and every resolution pass replaces the node's
//! [`NodeState`].

use crate::core::resolver::Resolver;
use crate::core::types::{builtins, DataType, TypeKind};
use crate::domain::paths::{NodePath, PATH_SEPARATOR};
use crate::domain::NodeError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Origin kind of an override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// Process environment variable
    Env,
    /// Literal value declared next to the schema
    Literal,
    /// Value produced by a plugin resolver (e.g. a secret backend)
    Plugin,
}

impl OverrideKind {
    /// Precedence used when an override is created without an explicit rank
    ///
    /// Lower ranks are consulted first.
    pub fn default_rank(self) -> i32 {
        match self {
            OverrideKind::Env => 100,
            OverrideKind::Literal => 200,
            OverrideKind::Plugin => 300,
        }
    }
}

/// Where an override takes its value from
#[derive(Clone)]
pub enum OverrideSource {
    Env { var: String },
    Literal(Value),
    Resolver(Resolver),
}

impl fmt::Debug for OverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideSource::Env { var } => write!(f, "Env({var})"),
            OverrideSource::Literal(_) => f.write_str("Literal(..)"),
            OverrideSource::Resolver(r) => write!(f, "Resolver({})", r.label()),
        }
    }
}

/// An alternate, ranked value source for a node
#[derive(Debug, Clone)]
pub struct Override {
    pub kind: OverrideKind,
    pub source: OverrideSource,
    pub rank: i32,
}

impl Override {
    /// Reads the named variable from the pass environment snapshot
    pub fn env(var: impl Into<String>) -> Self {
        Self {
            kind: OverrideKind::Env,
            source: OverrideSource::Env { var: var.into() },
            rank: OverrideKind::Env.default_rank(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self {
            kind: OverrideKind::Literal,
            source: OverrideSource::Literal(value.into()),
            rank: OverrideKind::Literal.default_rank(),
        }
    }

    /// A plugin-sourced value, typically from a secret backend
    pub fn plugin(resolver: Resolver) -> Self {
        Self {
            kind: OverrideKind::Plugin,
            source: OverrideSource::Resolver(resolver),
            rank: OverrideKind::Plugin.default_rank(),
        }
    }

    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    /// Short description used in logs and [`ValueSource`]
    pub fn describe(&self) -> String {
        match &self.source {
            OverrideSource::Env { var } => var.clone(),
            OverrideSource::Literal(_) => "literal".to_string(),
            OverrideSource::Resolver(r) => r.label(),
        }
    }
}

/// Schema declaration for one configuration item
///
/// # Examples
///
/// ```
/// use configraph::core::node::{ItemDef, Override};
/// use configraph::core::types::builtins;
///
/// let item = ItemDef::new()
///     .extends(builtins::port())
///     .value(3000)
///     .with_override(Override::env("PORT"))
///     .required();
/// assert!(item.is_required());
/// ```
#[derive(Clone, Default)]
pub struct ItemDef {
    pub(crate) data_type: Option<Arc<DataType>>,
    pub(crate) value: Option<Resolver>,
    pub(crate) overrides: Vec<Override>,
    pub(crate) required: bool,
    pub(crate) sensitive: Option<bool>,
    pub(crate) allowed_domains: Vec<String>,
    pub(crate) dynamic: bool,
    pub(crate) description: Option<String>,
    pub(crate) schema_errors: Vec<NodeError>,
}

impl ItemDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extends(mut self, data_type: Arc<DataType>) -> Self {
        self.data_type = Some(data_type);
        self
    }

    /// Sets a literal value
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(Resolver::Literal(value.into()));
        self
    }

    pub fn resolver(mut self, resolver: Resolver) -> Self {
        self.value = Some(resolver);
        self
    }

    pub fn with_override(mut self, item_override: Override) -> Self {
        self.overrides.push(item_override);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = Some(sensitive);
        self
    }

    /// Marks the item sensitive and lists domains it may be sent to
    pub fn sensitive_for_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive = Some(true);
        self.allowed_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Records a structural problem found while building the schema
    pub fn with_schema_error(mut self, error: NodeError) -> Self {
        self.schema_errors.push(error);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The declared type, or `any` when none was given
    pub fn data_type(&self) -> Arc<DataType> {
        self.data_type.clone().unwrap_or_else(builtins::any)
    }

    /// Overrides in the order they are consulted
    ///
    /// `implicit_env` adds an env override for that variable unless one is
    /// already declared. Equal ranks keep declaration order.
    pub(crate) fn ranked_overrides(&self, implicit_env: Option<String>) -> Vec<Override> {
        let mut ranked = self.overrides.clone();
        if let Some(var) = implicit_env {
            let declared = ranked
                .iter()
                .any(|o| matches!(&o.source, OverrideSource::Env { var: v } if *v == var));
            if !declared {
                ranked.push(Override::env(var));
            }
        }
        ranked.sort_by_key(|o| o.rank);
        ranked
    }
}

impl fmt::Debug for ItemDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemDef")
            .field("data_type", &self.data_type.as_ref().map(|t| t.name()))
            .field("value", &self.value.as_ref().map(Resolver::label))
            .field("overrides", &self.overrides)
            .field("required", &self.required)
            .field("sensitive", &self.sensitive)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

/// Immutable definition of a node, shared with resolution passes
#[derive(Debug)]
pub(crate) struct NodeSpec {
    pub entity: String,
    /// Dot path within the entity
    pub path: String,
    pub key: String,
    pub item: ItemDef,
    pub data_type: Arc<DataType>,
    pub sensitive: bool,
    pub schema_errors: Vec<NodeError>,
    pub children: Vec<Arc<NodeSpec>>,
}

impl NodeSpec {
    pub fn new(entity: &str, path: String, key: String, item: ItemDef) -> Self {
        let data_type = item.data_type();
        let sensitive = item.sensitive.unwrap_or_else(|| data_type.is_sensitive());
        let schema_errors = item.schema_errors.clone();

        let children = match data_type.kind() {
            TypeKind::Object(children) => children
                .iter()
                .map(|(child_key, child_item)| {
                    Arc::new(NodeSpec::new(
                        entity,
                        format!("{path}{PATH_SEPARATOR}{child_key}"),
                        child_key.clone(),
                        child_item.clone(),
                    ))
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            entity: entity.to_string(),
            path,
            key,
            item,
            data_type,
            sensitive,
            schema_errors,
            children,
        }
    }

    /// A node created on the fly for one element of an array or dictionary
    pub fn element(parent: &NodeSpec, key: String, data_type: Arc<DataType>) -> Self {
        let item = ItemDef {
            sensitive: Some(parent.sensitive),
            dynamic: parent.item.dynamic,
            ..ItemDef::new().extends(data_type)
        };
        Self::new(
            &parent.entity,
            format!("{}{PATH_SEPARATOR}{key}", parent.path),
            key,
            item,
        )
    }

    pub fn full_path(&self) -> String {
        NodePath::qualified(self.entity.clone(), &self.path).to_string()
    }
}

/// Which source supplied a node's raw value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueSource {
    Override { kind: OverrideKind, detail: String },
    /// The value declared in the schema (literal or resolver)
    Schema,
    /// Supplied by the enclosing object or array value
    Parent,
    /// The data type's default value
    Default,
    /// Nothing supplied a value
    Empty,
}

/// Resolution outcome of a node (and, recursively, its children)
#[derive(Debug, Clone, Serialize)]
pub struct NodeState {
    pub path: String,
    pub key: String,
    pub raw_value: Option<Value>,
    pub resolved_value: Option<Value>,
    pub source: ValueSource,
    pub schema_errors: Vec<NodeError>,
    pub coercion_error: Option<NodeError>,
    pub validation_errors: Vec<NodeError>,
    pub resolution_error: Option<NodeError>,
    pub required_error: Option<NodeError>,
    pub sensitive: bool,
    pub dynamic: bool,
    pub children: Vec<NodeState>,
}

impl NodeState {
    /// A state with no value and no errors, used before the first pass
    pub(crate) fn unresolved(spec: &NodeSpec) -> Self {
        Self {
            path: spec.path.clone(),
            key: spec.key.clone(),
            raw_value: None,
            resolved_value: None,
            source: ValueSource::Empty,
            schema_errors: spec.schema_errors.clone(),
            coercion_error: None,
            validation_errors: Vec::new(),
            resolution_error: None,
            required_error: None,
            sensitive: spec.sensitive,
            dynamic: spec.item.dynamic,
            children: spec
                .children
                .iter()
                .map(|c| NodeState::unresolved(c))
                .collect(),
        }
    }

    pub fn is_schema_valid(&self) -> bool {
        self.schema_errors.is_empty()
    }

    /// No blocking error on this node or any of its children
    pub fn is_valid(&self) -> bool {
        self.is_schema_valid()
            && self.coercion_error.is_none()
            && self.resolution_error.is_none()
            && self.required_error.is_none()
            && self.validation_errors.iter().all(|e| !e.is_blocking())
            && self.children.iter().all(NodeState::is_valid)
    }

    /// Every error recorded on this node (children excluded), in pipeline order
    pub fn errors(&self) -> Vec<&NodeError> {
        self.schema_errors
            .iter()
            .chain(self.resolution_error.iter())
            .chain(self.coercion_error.iter())
            .chain(self.validation_errors.iter())
            .chain(self.required_error.iter())
            .collect()
    }

    pub fn child(&self, key: &str) -> Option<&NodeState> {
        self.children.iter().find(|c| c.key == key)
    }

    /// Walks down through children by key
    pub fn descend(&self, segments: &[String]) -> Option<&NodeState> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// True when the resolved value is undefined or null
    pub fn is_empty(&self) -> bool {
        is_empty_value(self.resolved_value.as_ref())
    }
}

/// A registered configuration item and its latest resolution state
#[derive(Debug, Clone)]
pub struct ConfigNode {
    pub(crate) spec: Arc<NodeSpec>,
    pub(crate) state: NodeState,
    pub(crate) picked: bool,
}

impl ConfigNode {
    pub(crate) fn new(entity: &str, key: &str, item: ItemDef) -> Self {
        let spec = Arc::new(NodeSpec::new(
            entity,
            key.to_string(),
            key.to_string(),
            item,
        ));
        let state = NodeState::unresolved(&spec);
        Self {
            spec,
            state,
            picked: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.spec.key
    }

    pub fn entity_name(&self) -> &str {
        &self.spec.entity
    }

    /// Globally addressable path (`entity!key`)
    pub fn full_path(&self) -> String {
        self.spec.full_path()
    }

    pub fn data_type(&self) -> &Arc<DataType> {
        &self.spec.data_type
    }

    pub fn description(&self) -> Option<&str> {
        self.spec
            .item
            .description
            .as_deref()
            .or_else(|| self.spec.data_type.description())
    }

    pub fn is_required(&self) -> bool {
        self.spec.item.required
    }

    pub fn is_sensitive(&self) -> bool {
        self.spec.sensitive
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.spec.item.allowed_domains
    }

    pub fn is_dynamic(&self) -> bool {
        self.spec.item.dynamic
    }

    /// True if this node was created by a pick from another entity
    pub fn is_picked(&self) -> bool {
        self.picked
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn resolved_value(&self) -> Option<&Value> {
        self.state.resolved_value.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }

    pub fn is_schema_valid(&self) -> bool {
        self.state.is_schema_valid()
    }

    /// Looks up this node or a descendant by the segments below the key
    pub fn find(&self, child_segments: &[String]) -> Option<&NodeState> {
        self.state.descend(child_segments)
    }
}

pub(crate) fn is_empty_value(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overrides_ranked_by_precedence() {
        let item = ItemDef::new()
            .with_override(Override::literal("declared"))
            .with_override(Override::env("API_URL"))
            .with_override(Override::literal("first").with_rank(1));

        let ranked = item.ranked_overrides(None);
        let described: Vec<String> = ranked.iter().map(|o| o.describe()).collect();
        assert_eq!(described, vec!["literal", "API_URL", "literal"]);
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn test_implicit_env_override_added_once() {
        let item = ItemDef::new().with_override(Override::literal("declared"));
        let described: Vec<String> = item
            .ranked_overrides(Some("APP_PORT".to_string()))
            .iter()
            .map(|o| o.describe())
            .collect();
        assert_eq!(described, vec!["APP_PORT", "literal"]);

        let item = ItemDef::new().with_override(Override::env("APP_PORT").with_rank(500));
        let ranked = item.ranked_overrides(Some("APP_PORT".to_string()));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rank, 500);
    }

    #[test]
    fn test_sensitivity_inherited_from_type() {
        let secret = DataType::builder("secret").sensitive(true).build();
        let node = ConfigNode::new("app", "TOKEN", ItemDef::new().extends(secret.clone()));
        assert!(node.is_sensitive());

        let node = ConfigNode::new(
            "app",
            "TOKEN",
            ItemDef::new().extends(secret).sensitive(false),
        );
        assert!(!node.is_sensitive());
    }

    #[test]
    fn test_object_children_materialized_at_registration() {
        let db = builtins::object(vec![
            ("host".to_string(), ItemDef::new().value("localhost")),
            ("port".to_string(), ItemDef::new().extends(builtins::port())),
        ]);
        let node = ConfigNode::new("app", "db", ItemDef::new().extends(db));

        assert_eq!(node.state().children.len(), 2);
        let port = node.find(&["port".to_string()]).unwrap();
        assert_eq!(port.path, "db.port");
        assert_eq!(node.full_path(), "app!db");
    }

    #[test]
    fn test_state_validity_includes_children_and_ignores_warnings() {
        let node = ConfigNode::new("app", "x", ItemDef::new());
        let mut state = node.state().clone();
        state.validation_errors.push(NodeError::warning("soft"));
        assert!(state.is_valid());

        let mut child = state.clone();
        child.key = "inner".to_string();
        child.coercion_error = Some(NodeError::coercion("bad"));
        state.children.push(child);
        assert!(!state.is_valid());
        assert!(!state.child("inner").unwrap().is_valid());
    }

    #[test]
    fn test_sensitive_for_domains() {
        let item = ItemDef::new().sensitive_for_domains(["api.stripe.com"]);
        let node = ConfigNode::new("app", "STRIPE_KEY", item);
        assert!(node.is_sensitive());
        assert_eq!(node.allowed_domains(), ["api.stripe.com".to_string()]);
        assert!(is_empty_value(Some(&json!(null))));
    }
}
