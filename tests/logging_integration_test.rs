//! Integration tests for logging functionality

use configraph::config::{ConfigraphSettings, LoggingConfig};
use configraph::logging::{init_logging, LOG_FILE_NAME};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_log_file_name() {
    assert_eq!(LOG_FILE_NAME, "configraph.log");
}

#[test]
fn test_logging_directory_not_created_for_invalid_level() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "daily".to_string(),
    };

    assert!(init_logging("chatty", &config).is_err());
    assert!(!log_path.exists());
}

#[test]
fn test_logging_rotation_validation() {
    for (rotation, valid) in [("daily", true), ("hourly", true), ("never", true), ("size", false)] {
        let mut settings = ConfigraphSettings::default();
        settings.logging.local_rotation = rotation.to_string();
        assert_eq!(settings.validate().is_ok(), valid, "rotation {rotation}");
    }
}

#[test]
fn test_logging_macros_usage() {
    // Without a subscriber installed the macros are no-ops, but they must expand
    configraph::log_pass_start!("pass-1", 2, 10);
    configraph::log_node_failure!("app!PORT", "Value out of range");
    configraph::log_pass_complete!("pass-1", 10, 1, Duration::from_millis(12));
}
