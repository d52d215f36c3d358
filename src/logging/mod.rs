//! Logging and observability
//!
//! Configraph logs through `tracing`. Applications embedding the library may
//! install their own subscriber; [`init_logging`] is a convenience that sets up
//! console output and optional rotating JSON files.
//!
//! # Example
//!
//! ```no_run
//! use configraph::config::LoggingConfig;
//! use configraph::logging::init_logging;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("debug", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard, LOG_FILE_NAME};

/// Log the start of a resolution pass
///
/// # Example
///
/// ```no_run
/// use configraph::log_pass_start;
/// use uuid::Uuid;
///
/// log_pass_start!(Uuid::new_v4(), 2, 14);
/// ```
#[macro_export]
macro_rules! log_pass_start {
    ($pass_id:expr, $entity_count:expr, $node_count:expr) => {
        tracing::info!(
            pass_id = %$pass_id,
            entity_count = $entity_count,
            node_count = $node_count,
            "Starting resolution pass"
        );
    };
}

/// Log the completion of a resolution pass
///
/// # Example
///
/// ```no_run
/// use configraph::log_pass_complete;
/// use std::time::Duration;
/// use uuid::Uuid;
///
/// log_pass_complete!(Uuid::new_v4(), 14, 0, Duration::from_millis(12));
/// ```
#[macro_export]
macro_rules! log_pass_complete {
    ($pass_id:expr, $node_count:expr, $invalid_count:expr, $duration:expr) => {
        tracing::info!(
            pass_id = %$pass_id,
            node_count = $node_count,
            invalid_count = $invalid_count,
            duration_ms = $duration.as_millis(),
            "Resolution pass completed"
        );
    };
}

/// Log a resolver failure that was not a deliberate node error
///
/// # Example
///
/// ```no_run
/// use configraph::domain::NodeError;
/// use configraph::log_node_failure;
///
/// let err = NodeError::resolution("backend unreachable");
/// log_node_failure!("app!API_KEY", &err);
/// ```
#[macro_export]
macro_rules! log_node_failure {
    ($path:expr, $error:expr) => {
        tracing::error!(
            path = %$path,
            error = %$error,
            "Resolver failed unexpectedly"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::NodeError;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_macros_expand_without_subscriber() {
        log_pass_start!(Uuid::new_v4(), 1usize, 3usize);
        log_pass_complete!(Uuid::new_v4(), 3usize, 1usize, Duration::from_millis(4));
        log_node_failure!("app!A", &NodeError::resolution("boom"));
    }
}
