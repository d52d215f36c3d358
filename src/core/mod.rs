//! Core engine of Configraph.
//!
//! # Modules
//!
//! - [`types`] - Data types with coercion/validation chains and the built-in library
//! - [`node`] - Item declarations, overrides, node state
//! - [`resolver`] - Value resolvers and the per-call resolver context
//! - [`entity`] - Entities and picks
//! - [`graph`] - The graph and its resolution passes
//! - [`schema`] - Declarative (TOML/JSON) schemas and the type registry
//!
//! # Resolution Workflow
//!
//! 1. **Register** entities, in code or from a [`GraphSchema`]
//! 2. **Materialize picks** from their source entities
//! 3. **Resolve** every node concurrently; a node waiting on another is memoized
//!    and checked for dependency cycles
//! 4. **Inspect** node states, snapshots and the pass summary
//!
//! # Example
//!
//! ```rust
//! use configraph::core::{Configraph, Entity, ItemDef, Override};
//! use configraph::core::types::builtins;
//! use configraph::adapters::env::EnvSnapshot;
//!
//! # async fn example() -> configraph::domain::Result<()> {
//! let mut graph = Configraph::new().with_env(EnvSnapshot::from_vars([("PORT", "9090")]));
//! graph.add_entity(
//!     Entity::new("api").with_item(
//!         "PORT",
//!         ItemDef::new()
//!             .extends(builtins::port())
//!             .value(8080)
//!             .with_override(Override::env("PORT")),
//!     ),
//! )?;
//!
//! let summary = graph.resolve_config().await?;
//! assert!(summary.is_successful());
//! assert_eq!(graph.resolved_value("api!PORT")?, Some(&serde_json::json!(9090)));
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod graph;
pub mod node;
pub mod resolver;
pub mod schema;
pub mod types;

pub use entity::{Entity, PickSpec};
pub use graph::{Configraph, NodeSnapshot, ResolutionSummary};
pub use node::{ConfigNode, ItemDef, NodeState, Override, OverrideKind, ValueSource};
pub use resolver::{switch_by, Resolver, ResolverContext, SwitchBy, ValueResolver};
pub use schema::{GraphSchema, TypeRegistry};
pub use types::{DataType, TypeKind};
