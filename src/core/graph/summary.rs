//! Pass summaries and node snapshots

use crate::core::node::{NodeState, ValueSource};
use crate::domain::NodeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Serializable read surface of one node, for downstream consumers
///
/// Values of sensitive nodes are included as-is; redaction is the consumer's job.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    /// Full path (`entity!key.child`)
    pub path: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<Value>,
    pub is_valid: bool,
    pub sensitive: bool,
    pub dynamic: bool,
    pub source: ValueSource,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<NodeError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub(crate) fn from_state(entity: &str, state: &NodeState) -> Self {
        Self {
            path: format!("{entity}!{}", state.path),
            key: state.key.clone(),
            resolved_value: state.resolved_value.clone(),
            is_valid: state.is_valid(),
            sensitive: state.sensitive,
            dynamic: state.dynamic,
            source: state.source.clone(),
            errors: state.errors().into_iter().cloned().collect(),
            children: state
                .children
                .iter()
                .map(|child| NodeSnapshot::from_state(entity, child))
                .collect(),
        }
    }
}

/// Outcome of one `resolve_config` pass
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionSummary {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub entity_count: usize,
    /// Top-level nodes, picked nodes included
    pub node_count: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    /// Full paths of invalid top-level nodes
    pub invalid_paths: Vec<String>,
    /// Entity-level schema errors as `entity: message`
    pub entity_errors: Vec<String>,
    pub timed_out: bool,
    pub cache_provider: String,
}

impl ResolutionSummary {
    /// True when every node and entity is valid
    pub fn is_successful(&self) -> bool {
        self.invalid_count == 0 && self.entity_errors.is_empty() && !self.timed_out
    }

    pub fn log_summary(&self) {
        crate::log_pass_complete!(
            self.pass_id,
            self.node_count,
            self.invalid_count,
            self.duration
        );

        if !self.entity_errors.is_empty() {
            tracing::warn!(
                error_count = self.entity_errors.len(),
                "Entities have schema errors"
            );
            for error in &self.entity_errors {
                tracing::warn!(error = %error, "Entity schema error");
            }
        }
        for path in &self.invalid_paths {
            tracing::info!(path = %path, "Invalid node");
        }
    }
}
