//! Value resolvers and the resolution context
//!
//! A [`Resolver`] produces the raw value of a node. Resolvers only see the graph
//! through the [`ResolverContext`] handed to them for each call:
//!
//! ```rust
//! use configraph::core::resolver::Resolver;
//! use serde_json::json;
//!
//! let sum = Resolver::from_fn(|ctx| async move {
//!     let a = ctx.get("a").await?;
//!     let b = ctx.get("b").await?;
//!     Ok::<_, anyhow::Error>(json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0)))
//! });
//! assert_eq!(sum.label(), "fn");
//! ```

pub mod switch;

pub use switch::{switch_by, SwitchBy};

use crate::core::graph::pass::PassState;
use crate::core::node::NodeState;
use crate::domain::{NodeError, NodePath};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Boxed future returned by function resolvers
pub type ResolverFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// Function resolver signature
pub type ResolverFn = Arc<dyn Fn(ResolverContext) -> ResolverFuture + Send + Sync>;

/// Value transform applied to picked values
pub type TransformFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// A resolver with its own label, typically provided by a plugin
///
/// Returning `Value::Null` means the resolver has no value to offer.
#[async_trait]
pub trait ValueResolver: Send + Sync {
    /// Short name used in logs and error messages
    fn label(&self) -> String;

    /// Produces the raw value
    ///
    /// # Errors
    ///
    /// Returning a [`NodeError`] (wrapped in `anyhow`) records it as-is on the node;
    /// any other error becomes an unexpected resolution error.
    async fn resolve(&self, ctx: &ResolverContext) -> anyhow::Result<Value>;
}

/// How a node obtains its raw value
#[derive(Clone)]
pub enum Resolver {
    Literal(Value),
    Function(ResolverFn),
    Structured(Arc<dyn ValueResolver>),
}

impl Resolver {
    /// Wraps an async closure
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolverContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Resolver::Function(Arc::new(move |ctx| f(ctx).boxed()))
    }

    pub fn structured(resolver: impl ValueResolver + 'static) -> Self {
        Resolver::Structured(Arc::new(resolver))
    }

    /// Resolves to the value of another node
    pub fn reference(path: impl Into<String>) -> Self {
        Resolver::structured(Reference { path: path.into() })
    }

    pub fn label(&self) -> String {
        match self {
            Resolver::Literal(_) => "literal".to_string(),
            Resolver::Function(_) => "fn".to_string(),
            Resolver::Structured(r) => r.label(),
        }
    }

    pub(crate) async fn run(&self, ctx: ResolverContext) -> anyhow::Result<Value> {
        match self {
            Resolver::Literal(value) => Ok(value.clone()),
            Resolver::Function(f) => f(ctx).await,
            Resolver::Structured(r) => r.resolve(&ctx).await,
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolver({})", self.label())
    }
}

impl From<Value> for Resolver {
    fn from(value: Value) -> Self {
        Resolver::Literal(value)
    }
}

/// Reads another node's value unchanged
struct Reference {
    path: String,
}

#[async_trait]
impl ValueResolver for Reference {
    fn label(&self) -> String {
        format!("ref({})", self.path)
    }

    async fn resolve(&self, ctx: &ResolverContext) -> anyhow::Result<Value> {
        ctx.get(&self.path).await
    }
}

/// Reads a node from another entity and optionally transforms it
pub(crate) struct PickResolver {
    pub source: NodePath,
    pub transform: Option<TransformFn>,
}

#[async_trait]
impl ValueResolver for PickResolver {
    fn label(&self) -> String {
        format!("pick({})", self.source)
    }

    async fn resolve(&self, ctx: &ResolverContext) -> anyhow::Result<Value> {
        let value = ctx.get(&self.source.to_string()).await?;
        match &self.transform {
            Some(transform) if !value.is_null() => transform(value),
            _ => Ok(value),
        }
    }
}

/// Handle given to a resolver for one invocation
///
/// Cloning is cheap; every clone refers to the same pass.
#[derive(Clone)]
pub struct ResolverContext {
    pass: Arc<PassState>,
    entity: String,
    node_path: String,
    waiter: String,
}

impl ResolverContext {
    pub(crate) fn new(pass: Arc<PassState>, entity: &str, node_path: String, waiter: String) -> Self {
        Self {
            pass,
            entity: entity.to_string(),
            node_path,
            waiter,
        }
    }

    /// Full path of the node being resolved
    pub fn node_path(&self) -> &str {
        &self.node_path
    }

    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    /// Waits for another node and returns its resolved value
    ///
    /// Paths without an entity prefix are relative to the caller's entity. The value
    /// is returned even if the node ended up invalid; an empty node yields
    /// `Value::Null`.
    ///
    /// # Errors
    ///
    /// A schema error if the node does not exist, a resolution error if waiting
    /// would form a dependency cycle.
    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let state = self.get_node(path).await?;
        Ok(state.resolved_value.unwrap_or(Value::Null))
    }

    /// Waits for another node and returns its full state
    pub async fn get_node(&self, path: &str) -> anyhow::Result<NodeState> {
        let target = NodePath::new(path)
            .map_err(NodeError::schema)?
            .qualify(&self.entity);
        let state = self.pass.lookup(&self.waiter, &target).await?;
        Ok(state)
    }

    /// Like [`get`](Self::get) but fails when the node is invalid
    pub async fn get_valid(&self, path: &str) -> anyhow::Result<Value> {
        let state = self.get_node(path).await?;
        if !state.is_valid() {
            return Err(NodeError::resolution(format!("Node '{path}' is invalid")).into());
        }
        Ok(state.resolved_value.unwrap_or(Value::Null))
    }

    /// Returns the cached value for `key`, computing and storing it if missing
    ///
    /// Within one pass every caller asking for the same key shares a single
    /// computation.
    pub async fn get_or_set_cache_item<F, Fut>(&self, key: &str, compute: F) -> anyhow::Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let value = self
            .pass
            .cached(&self.waiter, key, move || compute().boxed())
            .await?;
        Ok(value)
    }

    /// Reads a variable from the environment snapshot taken for this pass
    pub fn env_var(&self, name: &str) -> Option<String> {
        self.pass.env().get(name).map(str::to_string)
    }
}

impl fmt::Debug for ResolverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverContext")
            .field("entity", &self.entity)
            .field("node_path", &self.node_path)
            .finish()
    }
}
