//! Domain types shared across Configraph.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Error types** ([`ConfigraphError`], [`NodeError`])
//! - **Node addressing** ([`NodePath`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! Library calls return [`Result<T, ConfigraphError>`]. Problems with a single
//! configuration item are recorded as [`NodeError`]s on that item instead:
//!
//! ```rust
//! use configraph::domain::{NodeError, Result};
//!
//! fn example() -> Result<()> {
//!     let err = NodeError::warning("value is close to the limit");
//!     assert!(!err.is_blocking());
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod paths;
pub mod result;

pub use errors::{ConfigraphError, NodeError};
pub use paths::NodePath;
pub use result::Result;
