//! State of a single resolution pass
//!
//! Every node is resolved at most once per pass. Resolution is split in two
//! memoized futures per addressable node:
//!
//! - the *value* future picks the raw value (override, parent, schema, default)
//!   and runs the type chain;
//! - the *node* future waits for the value, settles composite children and
//!   assembles the final [`NodeState`].
//!
//! Declared object children depend on their parent's value future only, so
//! siblings can reference each other. Whenever one future waits on another an
//! edge is added to a wait-for graph; an edge that would close a loop is refused
//! and reported as a dependency cycle.

use crate::adapters::cache::CacheProvider;
use crate::adapters::env::EnvSnapshot;
use crate::config::CacheMode;
use crate::core::node::{
    is_empty_value, NodeSpec, NodeState, Override, OverrideSource, ValueSource,
};
use crate::core::resolver::ResolverContext;
use crate::core::types::{builtins, TypeKind, TypeOutcome};
use crate::domain::errors::classify_resolver_error;
use crate::domain::paths::PATH_SEPARATOR;
use crate::domain::{NodeError, NodePath};
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const VALUE_SUFFIX: &str = "@value";

type NodeFuture = Shared<BoxFuture<'static, NodeState>>;
type ValueFuture = Shared<BoxFuture<'static, SettledValue>>;
type CacheFuture = Shared<BoxFuture<'static, Result<Value, NodeError>>>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of the value phase of one node
#[derive(Debug, Clone)]
pub(crate) struct SettledValue {
    raw_value: Option<Value>,
    source: ValueSource,
    error: Option<NodeError>,
    outcome: Option<TypeOutcome>,
}

impl SettledValue {
    fn empty() -> Self {
        Self {
            raw_value: None,
            source: ValueSource::Empty,
            error: None,
            outcome: None,
        }
    }

    fn failed(error: NodeError, source: ValueSource) -> Self {
        Self {
            error: Some(error),
            source,
            ..Self::empty()
        }
    }

    fn from_raw(spec: &NodeSpec, raw: Value, source: ValueSource) -> Self {
        let outcome = spec.data_type.apply(raw.clone());
        Self {
            raw_value: Some(raw),
            source,
            error: None,
            outcome: Some(outcome),
        }
    }

    /// The typed value, or the attempted value when coercion failed
    fn value(&self) -> Option<&Value> {
        self.outcome.as_ref().map(|o| &o.value)
    }
}

/// Where a node may inherit a value from when it has no override
enum Inherited {
    None,
    /// A declared object child reads its field from the parent's value phase
    Parent(String),
    /// An array/dictionary element or an element's child gets its value handed down
    Supplied(Option<Value>),
}

struct IndexedNode {
    spec: Arc<NodeSpec>,
    parent: Option<String>,
}

struct InflightCacheItem {
    future: CacheFuture,
    owner: String,
}

/// Wait-for graph between in-flight futures
#[derive(Debug, Default)]
struct WaitGraph {
    edges: HashMap<String, Vec<String>>,
}

impl WaitGraph {
    /// Records that `from` waits on `to`, unless that closes a cycle
    fn add(&mut self, from: &str, to: &str) -> Result<(), Vec<String>> {
        if let Some(path) = self.path(to, from) {
            let mut cycle = vec![from.to_string()];
            cycle.extend(path);
            return Err(cycle);
        }
        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        Ok(())
    }

    fn remove(&mut self, from: &str, to: &str) {
        if let Some(targets) = self.edges.get_mut(from) {
            if let Some(pos) = targets.iter().position(|t| t == to) {
                targets.swap_remove(pos);
            }
            if targets.is_empty() {
                self.edges.remove(from);
            }
        }
    }

    /// Path from `start` to `goal` along wait edges, both ends included
    fn path(&self, start: &str, goal: &str) -> Option<Vec<String>> {
        let mut stack = vec![vec![start.to_string()]];
        let mut visited = HashSet::new();
        while let Some(path) = stack.pop() {
            let last = path.last()?;
            if last == goal {
                return Some(path);
            }
            if !visited.insert(last.clone()) {
                continue;
            }
            for next in self.edges.get(last).into_iter().flatten() {
                let mut extended = path.clone();
                extended.push(next.clone());
                stack.push(extended);
            }
        }
        None
    }
}

/// Human readable form of a cycle, without internal phase labels
fn describe_cycle(cycle: &[String]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for label in cycle {
        let name = label.strip_suffix(VALUE_SUFFIX).unwrap_or(label);
        if names.last() != Some(&name) {
            names.push(name);
        }
    }
    names.join(" -> ")
}

struct WaitGuard<'a> {
    pass: &'a PassState,
    from: String,
    to: String,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        locked(&self.pass.waits).remove(&self.from, &self.to);
    }
}

fn timed_out() -> NodeError {
    NodeError::Resolution {
        message: "Resolution timed out".to_string(),
        expected: false,
        cause: None,
    }
}

fn field(value: Option<&Value>, key: &str) -> Option<Value> {
    match value {
        Some(Value::Object(map)) => map.get(key).cloned(),
        _ => None,
    }
}

pub(crate) struct PassState {
    index: HashMap<String, IndexedNode>,
    roots: Vec<String>,
    entities: HashSet<String>,
    nodes: Mutex<HashMap<String, NodeFuture>>,
    values: Mutex<HashMap<String, ValueFuture>>,
    cache_items: Mutex<HashMap<String, InflightCacheItem>>,
    waits: Mutex<WaitGraph>,
    /// Cycle error of every node found on a dependency cycle
    cycles: Mutex<HashMap<String, NodeError>>,
    cache: Arc<dyn CacheProvider>,
    cache_mode: CacheMode,
    env: EnvSnapshot,
    implicit_env_prefix: Option<String>,
}

impl PassState {
    /// Indexes every top-level node and its declared object children
    ///
    /// `implicit_env_prefix` enables an env override named `prefix + key` on every
    /// top-level node.
    pub(crate) fn new(
        roots: Vec<Arc<NodeSpec>>,
        entities: HashSet<String>,
        cache: Arc<dyn CacheProvider>,
        cache_mode: CacheMode,
        env: EnvSnapshot,
        implicit_env_prefix: Option<String>,
    ) -> Self {
        fn index_spec(
            index: &mut HashMap<String, IndexedNode>,
            spec: &Arc<NodeSpec>,
            parent: Option<String>,
        ) {
            let path = spec.full_path();
            for child in &spec.children {
                index_spec(index, child, Some(path.clone()));
            }
            index.insert(
                path,
                IndexedNode {
                    spec: Arc::clone(spec),
                    parent,
                },
            );
        }

        let mut index = HashMap::new();
        let mut root_paths = Vec::with_capacity(roots.len());
        for spec in &roots {
            root_paths.push(spec.full_path());
            index_spec(&mut index, spec, None);
        }

        Self {
            index,
            roots: root_paths,
            entities,
            nodes: Mutex::new(HashMap::new()),
            values: Mutex::new(HashMap::new()),
            cache_items: Mutex::new(HashMap::new()),
            waits: Mutex::new(WaitGraph::default()),
            cycles: Mutex::new(HashMap::new()),
            cache,
            cache_mode,
            env,
            implicit_env_prefix,
        }
    }

    pub(crate) fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    /// Starts every top-level node and waits until all have settled
    pub(crate) async fn resolve_all(self: &Arc<Self>) {
        let futures: Vec<NodeFuture> = self
            .roots
            .iter()
            .filter_map(|path| self.node_future(path))
            .collect();
        join_all(futures).await;
    }

    /// Final state of an indexed node; nodes that never settled are marked timed out
    pub(crate) fn take_state(&self, path: &str) -> Option<NodeState> {
        let indexed = self.index.get(path)?;
        let settled = locked(&self.nodes)
            .get(path)
            .and_then(|future| future.peek().cloned());
        Some(settled.unwrap_or_else(|| {
            let mut state = NodeState::unresolved(&indexed.spec);
            state.resolution_error = Some(timed_out());
            state.children = indexed
                .spec
                .children
                .iter()
                .map(|child| {
                    self.take_state(&child.full_path())
                        .unwrap_or_else(|| NodeState::unresolved(child))
                })
                .collect();
            state
        }))
    }

    /// Drops every memoized future
    ///
    /// In-flight futures hold a reference to the pass, so this must run once the
    /// pass is over.
    pub(crate) fn finish(&self) {
        locked(&self.nodes).clear();
        locked(&self.values).clear();
        locked(&self.cache_items).clear();
    }

    fn begin_wait(&self, from: &str, to: &str) -> Result<WaitGuard<'_>, NodeError> {
        locked(&self.waits).add(from, to).map_err(|cycle| {
            let description = describe_cycle(&cycle);
            tracing::warn!(cycle = %description, "Dependency cycle detected");
            let err = NodeError::resolution(format!("Dependency cycle detected: {description}"));

            // Members are all still waiting, so each picks this up when it completes
            let mut cycles = locked(&self.cycles);
            for label in &cycle {
                let member = label.strip_suffix(VALUE_SUFFIX).unwrap_or(label);
                if self.index.contains_key(member) {
                    cycles
                        .entry(member.to_string())
                        .or_insert_with(|| err.clone());
                }
            }
            err
        })?;
        Ok(WaitGuard {
            pass: self,
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    fn node_future(self: &Arc<Self>, path: &str) -> Option<NodeFuture> {
        let indexed = self.index.get(path)?;
        let mut nodes = locked(&self.nodes);
        if let Some(future) = nodes.get(path) {
            return Some(future.clone());
        }

        let pass = Arc::clone(self);
        let spec = Arc::clone(&indexed.spec);
        let owned_path = path.to_string();
        let future = async move { pass.settle_static(spec, owned_path).await }
            .boxed()
            .shared();
        nodes.insert(path.to_string(), future.clone());
        Some(future)
    }

    fn value_future(self: &Arc<Self>, path: &str) -> Option<ValueFuture> {
        let indexed = self.index.get(path)?;
        let mut values = locked(&self.values);
        if let Some(future) = values.get(path) {
            return Some(future.clone());
        }

        let pass = Arc::clone(self);
        let spec = Arc::clone(&indexed.spec);
        let inherited = match &indexed.parent {
            Some(parent) => Inherited::Parent(parent.clone()),
            None => Inherited::None,
        };
        let owned_path = path.to_string();
        let future = async move { pass.determine(&spec, &owned_path, inherited).await }
            .boxed()
            .shared();
        values.insert(path.to_string(), future.clone());
        Some(future)
    }

    async fn await_node(self: &Arc<Self>, waiter: &str, path: &str) -> Result<NodeState, NodeError> {
        let future = self
            .node_future(path)
            .ok_or_else(|| NodeError::schema(format!("Node '{path}' does not exist")))?;
        if let Some(state) = future.peek() {
            return Ok(state.clone());
        }
        let _guard = self.begin_wait(waiter, path)?;
        Ok(future.await)
    }

    async fn await_value(
        self: &Arc<Self>,
        waiter: &str,
        path: &str,
    ) -> Result<SettledValue, NodeError> {
        let future = self
            .value_future(path)
            .ok_or_else(|| NodeError::schema(format!("Node '{path}' does not exist")))?;
        if let Some(settled) = future.peek() {
            return Ok(settled.clone());
        }
        let label = format!("{path}{VALUE_SUFFIX}");
        let _guard = self.begin_wait(waiter, &label)?;
        Ok(future.await)
    }

    /// Resolves a qualified path on behalf of `waiter`
    ///
    /// The deepest indexed node along the path is awaited, then the remaining
    /// segments are looked up in its settled children.
    pub(crate) async fn lookup(
        self: &Arc<Self>,
        waiter: &str,
        target: &NodePath,
    ) -> Result<NodeState, NodeError> {
        let entity = target.entity().unwrap_or_default();
        if !self.entities.contains(entity) {
            return Err(NodeError::schema(format!("Entity '{entity}' does not exist")));
        }

        let segments = target.segments();
        for depth in (1..=segments.len()).rev() {
            let candidate =
                NodePath::qualified(entity, &segments[..depth].join(".")).to_string();
            if !self.index.contains_key(&candidate) {
                continue;
            }
            let state = self.await_node(waiter, &candidate).await?;
            return state
                .descend(&segments[depth..])
                .cloned()
                .ok_or_else(|| NodeError::schema(format!("Node '{target}' does not exist")));
        }

        Err(NodeError::schema(format!("Node '{target}' does not exist")))
    }

    /// Overrides in the order they are consulted, including the implicit env override
    fn effective_overrides(&self, spec: &NodeSpec) -> Vec<Override> {
        let is_top_level = !spec.path.contains(PATH_SEPARATOR);
        let implicit_env = self
            .implicit_env_prefix
            .as_deref()
            .filter(|_| is_top_level)
            .map(|prefix| format!("{prefix}{}", spec.key));
        spec.item.ranked_overrides(implicit_env)
    }

    async fn override_value(
        &self,
        item_override: &Override,
        ctx: &ResolverContext,
    ) -> Result<Option<Value>, NodeError> {
        match &item_override.source {
            OverrideSource::Env { var } => Ok(self.env.get(var).map(|v| Value::String(v.to_string()))),
            OverrideSource::Literal(value) => Ok(Some(value.clone()).filter(|v| !v.is_null())),
            OverrideSource::Resolver(resolver) => match resolver.run(ctx.clone()).await {
                Ok(value) => Ok(Some(value).filter(|v| !v.is_null())),
                Err(err) => Err(classify_resolver_error(err)),
            },
        }
    }

    /// Picks the raw value of a node and runs its type chain
    async fn determine(
        self: &Arc<Self>,
        spec: &Arc<NodeSpec>,
        path: &str,
        inherited: Inherited,
    ) -> SettledValue {
        if !spec.schema_errors.is_empty() {
            return SettledValue::empty();
        }

        let waiter = format!("{path}{VALUE_SUFFIX}");
        let ctx = ResolverContext::new(
            Arc::clone(self),
            &spec.entity,
            path.to_string(),
            waiter.clone(),
        );

        for item_override in self.effective_overrides(spec) {
            let source = ValueSource::Override {
                kind: item_override.kind,
                detail: item_override.describe(),
            };
            match self.override_value(&item_override, &ctx).await {
                Ok(Some(raw)) => return SettledValue::from_raw(spec, raw, source),
                Ok(None) => {}
                Err(err) => {
                    self.report_resolver_failure(path, &err);
                    return SettledValue::failed(err, source);
                }
            }
        }

        let parent_value = match inherited {
            Inherited::None => None,
            Inherited::Parent(parent) => match self.await_value(&waiter, &parent).await {
                Ok(parent) => field(parent.value(), &spec.key),
                Err(err) => return SettledValue::failed(err, ValueSource::Parent),
            },
            Inherited::Supplied(value) => value,
        };
        if let Some(raw) = parent_value.filter(|v| !v.is_null()) {
            return SettledValue::from_raw(spec, raw, ValueSource::Parent);
        }

        if let Some(resolver) = &spec.item.value {
            match resolver.run(ctx).await {
                Ok(raw) if !raw.is_null() => {
                    return SettledValue::from_raw(spec, raw, ValueSource::Schema)
                }
                Ok(_) => {}
                Err(err) => {
                    let err = classify_resolver_error(err);
                    self.report_resolver_failure(path, &err);
                    return SettledValue::failed(err, ValueSource::Schema);
                }
            }
        }

        match spec.data_type.default_value() {
            Some(default) => SettledValue::from_raw(spec, default.clone(), ValueSource::Default),
            None => SettledValue::empty(),
        }
    }

    fn report_resolver_failure(&self, path: &str, err: &NodeError) {
        if err.is_unexpected() {
            crate::log_node_failure!(path, err);
        }
    }

    async fn settle_static(self: &Arc<Self>, spec: Arc<NodeSpec>, path: String) -> NodeState {
        let settled = match self.await_value(&path, &path).await {
            Ok(settled) => settled,
            Err(err) => SettledValue::failed(err, ValueSource::Empty),
        };
        self.complete(&spec, &path, settled).await
    }

    /// Resolves a node that is not memoized (array and dictionary elements)
    fn settle_inline(
        self: &Arc<Self>,
        spec: Arc<NodeSpec>,
        supplied: Option<Value>,
    ) -> BoxFuture<'static, NodeState> {
        let pass = Arc::clone(self);
        async move {
            let path = spec.full_path();
            let settled = pass
                .determine(&spec, &path, Inherited::Supplied(supplied))
                .await;
            pass.complete(&spec, &path, settled).await
        }
        .boxed()
    }

    /// Settles children and assembles the final state of a node
    async fn complete(
        self: &Arc<Self>,
        spec: &Arc<NodeSpec>,
        path: &str,
        settled: SettledValue,
    ) -> NodeState {
        let mut state = NodeState::unresolved(spec);
        state.raw_value = settled.raw_value;
        state.source = settled.source;
        match settled.error {
            Some(err @ NodeError::Schema { .. }) => state.schema_errors.push(err),
            Some(err) => state.resolution_error = Some(err),
            None => {}
        }

        let mut value = None;
        if let Some(outcome) = settled.outcome {
            state.coercion_error = outcome.coercion_error;
            state.validation_errors = outcome.validation_errors;
            value = Some(outcome.value);
        }
        let coerced = state.coercion_error.is_none();

        match spec.data_type.kind() {
            TypeKind::Object(_) => {
                let children = join_all(spec.children.iter().map(|child| {
                    self.settle_child(path, child, field(value.as_ref(), &child.key))
                }))
                .await;

                if coerced {
                    let mut assembled = match &value {
                        Some(Value::Object(map)) => Some(map.clone()),
                        _ => None,
                    };
                    for child in &children {
                        if let Some(child_value) = &child.resolved_value {
                            assembled
                                .get_or_insert_with(Map::new)
                                .insert(child.key.clone(), child_value.clone());
                        }
                    }
                    value = assembled.map(Value::Object);
                }
                state.children = children;
            }
            TypeKind::Array(item_type) if coerced => {
                if let Some(Value::Array(items)) = &value {
                    let item_type = item_type.clone().unwrap_or_else(builtins::any);
                    let elements = items.iter().enumerate().map(|(idx, item)| {
                        let element =
                            NodeSpec::element(spec, idx.to_string(), Arc::clone(&item_type));
                        self.settle_inline(Arc::new(element), Some(item.clone()))
                    });
                    let children = join_all(elements).await;
                    value = Some(Value::Array(
                        children
                            .iter()
                            .map(|c| c.resolved_value.clone().unwrap_or(Value::Null))
                            .collect(),
                    ));
                    state.children = children;
                }
            }
            TypeKind::Dictionary(value_type) if coerced => {
                if let Some(Value::Object(entries)) = &value {
                    let value_type = value_type.clone().unwrap_or_else(builtins::any);
                    let elements = entries.iter().map(|(key, entry)| {
                        let element = NodeSpec::element(spec, key.clone(), Arc::clone(&value_type));
                        self.settle_inline(Arc::new(element), Some(entry.clone()))
                    });
                    let children = join_all(elements).await;
                    value = Some(Value::Object(
                        children
                            .iter()
                            .map(|c| {
                                (
                                    c.key.clone(),
                                    c.resolved_value.clone().unwrap_or(Value::Null),
                                )
                            })
                            .collect(),
                    ));
                    state.children = children;
                }
            }
            _ => {}
        }

        state.resolved_value = value;
        if state.resolution_error.is_none() {
            state.resolution_error = locked(&self.cycles).get(path).cloned();
        }
        if spec.item.required && is_empty_value(state.resolved_value.as_ref()) {
            state.required_error = Some(NodeError::Required);
        }

        if state.is_valid() {
            tracing::debug!(
                path = %path,
                source = ?state.source,
                sensitive = state.sensitive,
                "Node resolved"
            );
        } else if let Some(err) = state.errors().first() {
            tracing::debug!(path = %path, error = %err, "Node resolved with errors");
        } else {
            tracing::debug!(path = %path, "Node resolved with invalid children");
        }

        state
    }

    async fn settle_child(
        self: &Arc<Self>,
        parent_path: &str,
        child: &Arc<NodeSpec>,
        supplied: Option<Value>,
    ) -> NodeState {
        let child_path = child.full_path();
        if !self.index.contains_key(&child_path) {
            return self.settle_inline(Arc::clone(child), supplied).await;
        }
        match self.await_node(parent_path, &child_path).await {
            Ok(state) => state,
            Err(err) => {
                let mut state = NodeState::unresolved(child);
                state.resolution_error = Some(err);
                state
            }
        }
    }

    /// Shared per-pass computation of a cache item
    pub(crate) async fn cached<F>(
        self: &Arc<Self>,
        waiter: &str,
        key: &str,
        compute: F,
    ) -> Result<Value, NodeError>
    where
        F: FnOnce() -> BoxFuture<'static, anyhow::Result<Value>>,
    {
        let (future, owner) = {
            let mut items = locked(&self.cache_items);
            match items.get(key) {
                Some(item) => (item.future.clone(), item.owner.clone()),
                None => {
                    let future = self.cache_future(key.to_string(), compute());
                    items.insert(
                        key.to_string(),
                        InflightCacheItem {
                            future: future.clone(),
                            owner: waiter.to_string(),
                        },
                    );
                    (future, waiter.to_string())
                }
            }
        };

        if future.peek().is_none() && owner != waiter {
            let _guard = self.begin_wait(waiter, &owner)?;
            return future.await;
        }
        future.await
    }

    fn cache_future(
        &self,
        key: String,
        compute: BoxFuture<'static, anyhow::Result<Value>>,
    ) -> CacheFuture {
        let provider = Arc::clone(&self.cache);
        let mode = self.cache_mode;
        async move {
            if mode.reads() {
                match provider.get_item(&key).await {
                    Ok(Some(value)) => {
                        tracing::trace!(key = %key, "Cache hit");
                        return Ok(value);
                    }
                    Ok(None) => {}
                    Err(err) => return Err(NodeError::unexpected(&anyhow::Error::new(err))),
                }
            }

            let value = compute.await.map_err(classify_resolver_error)?;
            if mode.writes() {
                provider
                    .set_item(&key, value.clone())
                    .await
                    .map_err(|err| NodeError::unexpected(&anyhow::Error::new(err)))?;
            }
            tracing::trace!(key = %key, "Cache item computed");
            Ok(value)
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_graph_detects_cycle() {
        let mut graph = WaitGraph::default();
        graph.add("a", "b").unwrap();
        graph.add("b", "c").unwrap();
        let cycle = graph.add("c", "a").unwrap_err();
        assert_eq!(cycle, vec!["c", "a", "b", "c"]);
    }

    #[test]
    fn test_wait_graph_self_edge_is_cycle() {
        let mut graph = WaitGraph::default();
        assert!(graph.add("a", "a").is_err());
    }

    #[test]
    fn test_wait_graph_edges_removed() {
        let mut graph = WaitGraph::default();
        graph.add("a", "b").unwrap();
        graph.remove("a", "b");
        assert!(graph.add("b", "a").is_ok());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut graph = WaitGraph::default();
        graph.add("top", "left").unwrap();
        graph.add("top", "right").unwrap();
        graph.add("left", "bottom").unwrap();
        assert!(graph.add("right", "bottom").is_ok());
    }

    #[test]
    fn test_describe_cycle_hides_phase_labels() {
        let cycle = vec![
            "app!b@value".to_string(),
            "app!a".to_string(),
            "app!a@value".to_string(),
            "app!b".to_string(),
            "app!b@value".to_string(),
        ];
        assert_eq!(describe_cycle(&cycle), "app!b -> app!a -> app!b");
    }
}
