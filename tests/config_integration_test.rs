//! Integration tests for engine settings loading

use configraph::config::{load_settings, load_settings_from_str, CacheMode, CacheProviderKind};
use configraph::core::Configraph;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

// Serializes tests that touch CONFIGRAPH_* variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for name in [
        "CONFIGRAPH_LOG_LEVEL",
        "CONFIGRAPH_RESOLUTION_TIMEOUT_MS",
        "CONFIGRAPH_RESOLUTION_ENV_OVERRIDES",
        "CONFIGRAPH_RESOLUTION_ENV_PREFIX",
        "CONFIGRAPH_CACHE_PROVIDER",
        "CONFIGRAPH_CACHE_PATH",
        "CONFIGRAPH_CACHE_MODE",
        "CONFIGRAPH_LOGGING_LOCAL_ENABLED",
        "CONFIGRAPH_LOGGING_LOCAL_PATH",
        "CONFIGRAPH_IT_CACHE_DIR",
    ] {
        std::env::remove_var(name);
    }
}

#[test]
fn test_load_complete_settings() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
log_level = "debug"

[resolution]
timeout_ms = 2500
env_overrides = true
env_prefix = "APP_"
dotenv_files = [".env", ".env.local"]

[cache]
provider = "file"
path = "/tmp/configraph/cache.json"
mode = "clear"

[logging]
local_enabled = true
local_path = "/tmp/configraph/logs"
local_rotation = "hourly"
"#
    )
    .unwrap();

    let settings = load_settings(file.path()).unwrap();

    assert_eq!(settings.log_level, "debug");
    assert_eq!(settings.resolution.timeout(), Some(Duration::from_millis(2500)));
    assert!(settings.resolution.env_overrides);
    assert_eq!(settings.resolution.env_prefix.as_deref(), Some("APP_"));
    assert_eq!(settings.resolution.dotenv_files, vec![".env", ".env.local"]);
    assert_eq!(settings.cache.provider, CacheProviderKind::File);
    assert_eq!(settings.cache.path.as_deref(), Some("/tmp/configraph/cache.json"));
    assert_eq!(settings.cache.mode, CacheMode::Clear);
    assert!(settings.logging.local_enabled);
    assert_eq!(settings.logging.local_rotation, "hourly");
}

#[test]
fn test_load_minimal_settings_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let settings = load_settings_from_str("").unwrap();

    assert_eq!(settings.log_level, "info");
    assert_eq!(settings.resolution.timeout(), None);
    assert!(!settings.resolution.env_overrides);
    assert!(settings.resolution.dotenv_files.is_empty());
    assert_eq!(settings.cache.provider, CacheProviderKind::Memory);
    assert_eq!(settings.cache.mode, CacheMode::Default);
    assert!(!settings.logging.local_enabled);
    assert_eq!(settings.logging.local_path, "./logs");
}

#[test]
fn test_missing_settings_file() {
    let err = load_settings("/nonexistent/configraph.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CONFIGRAPH_IT_CACHE_DIR", "/var/cache/app");

    let settings = load_settings_from_str(
        r#"
# path = "${CONFIGRAPH_IT_UNSET}" stays commented out
[cache]
provider = "file"
path = "${CONFIGRAPH_IT_CACHE_DIR}/cache.json"
"#,
    )
    .unwrap();

    assert_eq!(settings.cache.path.as_deref(), Some("/var/cache/app/cache.json"));
    cleanup_env_vars();
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CONFIGRAPH_LOG_LEVEL", "warn");
    std::env::set_var("CONFIGRAPH_RESOLUTION_TIMEOUT_MS", "750");
    std::env::set_var("CONFIGRAPH_RESOLUTION_ENV_OVERRIDES", "true");
    std::env::set_var("CONFIGRAPH_CACHE_PROVIDER", "none");
    std::env::set_var("CONFIGRAPH_CACHE_MODE", "Skip");

    let settings = load_settings_from_str(
        r#"
log_level = "info"

[cache]
provider = "memory"
"#,
    )
    .unwrap();
    cleanup_env_vars();

    assert_eq!(settings.log_level, "warn");
    assert_eq!(settings.resolution.timeout_ms, Some(750));
    assert!(settings.resolution.env_overrides);
    assert_eq!(settings.cache.provider, CacheProviderKind::None);
    assert_eq!(settings.cache.mode, CacheMode::Skip);
}

#[test]
fn test_invalid_env_override_value() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CONFIGRAPH_RESOLUTION_TIMEOUT_MS", "soon");

    let result = load_settings_from_str("");
    cleanup_env_vars();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("CONFIGRAPH_RESOLUTION_TIMEOUT_MS"));
}

#[test]
fn test_invalid_local_logging_override() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CONFIGRAPH_LOGGING_LOCAL_ENABLED", "enabled");

    let result = load_settings_from_str("[logging]\nlocal_enabled = false");
    cleanup_env_vars();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("CONFIGRAPH_LOGGING_LOCAL_ENABLED"));
}

#[test]
fn test_invalid_settings_validation() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    for contents in [
        "log_level = \"loud\"",
        "[cache]\nprovider = \"file\"",
        "[logging]\nlocal_rotation = \"weekly\"",
        "[resolution]\ntimeout_ms = 0",
        "[resolution]\nenv_prefix = \"APP-\"",
    ] {
        assert!(
            load_settings_from_str(contents).is_err(),
            "expected validation failure for {contents:?}"
        );
    }
}

#[test]
fn test_unknown_cache_provider_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    assert!(load_settings_from_str("[cache]\nprovider = \"redis\"").is_err());
}

#[tokio::test]
async fn test_graph_from_loaded_settings() {
    let settings = {
        let _lock = ENV_MUTEX.lock().unwrap();
        cleanup_env_vars();
        load_settings_from_str("[cache]\nprovider = \"none\"").unwrap()
    };

    let mut graph = Configraph::from_settings(&settings).unwrap();
    let summary = graph.resolve_config().await.unwrap();

    assert_eq!(summary.node_count, 0);
    assert!(summary.is_successful());
}
