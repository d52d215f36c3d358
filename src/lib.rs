// Configraph - Typed configuration graph resolver
// Copyright (c) 2025 Configraph Contributors
// Licensed under the MIT License

//! # Configraph - Typed Configuration Graph
//!
//! Configraph resolves configuration described as a graph of typed nodes. Nodes
//! can depend on each other, take values from the environment or a secret backend,
//! and are coerced and validated by their data type chain.
//!
//! ## Overview
//!
//! This library provides:
//! - **Declaring** entities of configuration items, in code or TOML/JSON
//! - **Resolving** every item concurrently with memoization and cycle detection
//! - **Typing** values through extendable coercion/validation chains
//! - **Caching** expensive resolver results across passes
//! - **Reporting** per-node errors, snapshots and pass summaries
//!
//! ## Architecture
//!
//! - [`core`] - Types, nodes, resolvers, entities, the graph and schemas
//! - [`adapters`] - Cache providers and environment snapshots
//! - [`domain`] - Errors and node paths
//! - [`config`] - Engine settings and sensitive value wrappers
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust
//! use configraph::core::{Configraph, Entity, ItemDef, Resolver};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Entity::new("app")
//!         .with_item("a", ItemDef::new().value(2))
//!         .with_item("b", ItemDef::new().value(3))
//!         .with_item(
//!             "c",
//!             ItemDef::new().resolver(Resolver::from_fn(|ctx| async move {
//!                 let a = ctx.get("a").await?.as_i64().unwrap_or_default();
//!                 let b = ctx.get("b").await?.as_i64().unwrap_or_default();
//!                 Ok::<_, anyhow::Error>(json!(a + b))
//!             })),
//!         );
//!
//!     let mut graph = Configraph::new();
//!     graph.add_entity(app)?;
//!     graph.resolve_config().await?;
//!
//!     assert_eq!(graph.resolved_value("app!c")?, Some(&json!(5)));
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Node-level problems never abort a pass. They are recorded on the node as a
//! [`domain::NodeError`] and make the node (and its ancestors) invalid. Only engine
//! contract violations, such as a cache provider failing to load, are returned as
//! [`domain::ConfigraphError`].
//!
//! ## Logging
//!
//! The engine logs through `tracing`; see [`logging::init_logging`] for a ready
//! made subscriber. Values of sensitive nodes are never logged.

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
