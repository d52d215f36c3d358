//! Branch selection on another node's value

use super::{Resolver, ResolverContext, ValueResolver};
use crate::domain::NodeError;
use async_trait::async_trait;
use serde_json::Value;

/// Branch key used when no other branch matches
pub const DEFAULT_BRANCH: &str = "_default";

/// Picks a resolver based on the value of a switch node
///
/// # Examples
///
/// ```rust
/// use configraph::core::resolver::{switch_by, Resolver};
/// use serde_json::json;
///
/// let api_url = switch_by("APP_ENV")
///     .case("production", json!("https://api.example.com"))
///     .case("staging", json!("https://staging.example.com"))
///     .default_case(json!("http://localhost:4000"))
///     .into_resolver();
/// assert_eq!(api_url.label(), "switchBy(APP_ENV)");
/// ```
#[derive(Debug, Clone)]
pub struct SwitchBy {
    switch_path: String,
    branches: Vec<(String, Resolver)>,
}

/// Starts a [`SwitchBy`] keyed on the node at `path`
pub fn switch_by(path: impl Into<String>) -> SwitchBy {
    SwitchBy {
        switch_path: path.into(),
        branches: Vec::new(),
    }
}

impl SwitchBy {
    pub fn case(mut self, key: impl Into<String>, resolver: impl Into<Resolver>) -> Self {
        self.branches.push((key.into(), resolver.into()));
        self
    }

    pub fn default_case(self, resolver: impl Into<Resolver>) -> Self {
        self.case(DEFAULT_BRANCH, resolver)
    }

    pub fn into_resolver(self) -> Resolver {
        Resolver::structured(self)
    }

    fn branch(&self, key: &str) -> Option<&Resolver> {
        self.branches
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, resolver)| resolver)
    }
}

/// Text a switch value is matched on
fn branch_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ValueResolver for SwitchBy {
    fn label(&self) -> String {
        format!("switchBy({})", self.switch_path)
    }

    async fn resolve(&self, ctx: &ResolverContext) -> anyhow::Result<Value> {
        let switch_node = ctx.get_node(&self.switch_path).await?;
        if !switch_node.is_valid() {
            return Err(NodeError::schema(format!(
                "Switch node '{}' is invalid",
                self.switch_path
            ))
            .into());
        }

        let key = branch_key(switch_node.resolved_value.as_ref().unwrap_or(&Value::Null));
        let resolver = self
            .branch(&key)
            .or_else(|| self.branch(DEFAULT_BRANCH))
            .ok_or_else(|| {
                NodeError::resolution(format!(
                    "No branch matches '{key}' and there is no {DEFAULT_BRANCH} branch"
                ))
            })?;

        tracing::trace!(switch = %self.switch_path, branch = %key, "Selected switch branch");
        resolver.run(ctx.clone()).await
    }
}
