//! Settings loader with TOML parsing and environment variable overrides

use super::schema::{CacheMode, CacheProviderKind, ConfigraphSettings};
use crate::domain::errors::ConfigraphError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads engine settings from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`ConfigraphSettings`]
/// 4. Applies environment variable overrides (`CONFIGRAPH_*` prefix)
/// 5. Validates the result
///
/// # Errors
///
/// Returns a configuration error if the file is missing or unreadable, a
/// referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use configraph::config::load_settings;
///
/// let settings = load_settings("configraph.toml").expect("Failed to load settings");
/// ```
pub fn load_settings(path: impl AsRef<Path>) -> Result<ConfigraphSettings> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigraphError::Configuration(format!(
            "Settings file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ConfigraphError::Configuration(format!(
            "Failed to read settings file {}: {e}",
            path.display()
        ))
    })?;

    load_settings_from_str(&contents)
}

/// Same as [`load_settings`] for TOML text already in memory
pub fn load_settings_from_str(contents: &str) -> Result<ConfigraphSettings> {
    let contents = substitute_env_vars(contents)?;

    let mut settings: ConfigraphSettings = toml::from_str(&contents)
        .map_err(|e| ConfigraphError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut settings)?;

    settings.validate().map_err(|e| {
        ConfigraphError::Configuration(format!("Settings validation failed: {e}"))
    })?;

    Ok(settings)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ConfigraphError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ConfigraphError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigraphError::Configuration(format!("Invalid value '{value}' for {name}"))
    })
}

/// Applies `CONFIGRAPH_<SECTION>_<KEY>` overrides
fn apply_env_overrides(settings: &mut ConfigraphSettings) -> Result<()> {
    if let Ok(val) = std::env::var("CONFIGRAPH_LOG_LEVEL") {
        settings.log_level = val;
    }

    // Resolution overrides
    if let Ok(val) = std::env::var("CONFIGRAPH_RESOLUTION_TIMEOUT_MS") {
        settings.resolution.timeout_ms = Some(parse_env("CONFIGRAPH_RESOLUTION_TIMEOUT_MS", &val)?);
    }
    if let Ok(val) = std::env::var("CONFIGRAPH_RESOLUTION_ENV_OVERRIDES") {
        settings.resolution.env_overrides = parse_env("CONFIGRAPH_RESOLUTION_ENV_OVERRIDES", &val)?;
    }
    if let Ok(val) = std::env::var("CONFIGRAPH_RESOLUTION_ENV_PREFIX") {
        settings.resolution.env_prefix = Some(val);
    }

    // Cache overrides
    if let Ok(val) = std::env::var("CONFIGRAPH_CACHE_PROVIDER") {
        settings.cache.provider = match val.to_lowercase().as_str() {
            "memory" => CacheProviderKind::Memory,
            "file" => CacheProviderKind::File,
            "none" => CacheProviderKind::None,
            other => {
                return Err(ConfigraphError::Configuration(format!(
                    "Invalid value '{other}' for CONFIGRAPH_CACHE_PROVIDER"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("CONFIGRAPH_CACHE_PATH") {
        settings.cache.path = Some(val);
    }
    if let Ok(val) = std::env::var("CONFIGRAPH_CACHE_MODE") {
        settings.cache.mode = match val.to_lowercase().as_str() {
            "default" => CacheMode::Default,
            "skip" => CacheMode::Skip,
            "clear" => CacheMode::Clear,
            other => {
                return Err(ConfigraphError::Configuration(format!(
                    "Invalid value '{other}' for CONFIGRAPH_CACHE_MODE"
                )))
            }
        };
    }

    // Logging overrides
    if let Ok(val) = std::env::var("CONFIGRAPH_LOGGING_LOCAL_ENABLED") {
        settings.logging.local_enabled = parse_env("CONFIGRAPH_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Ok(val) = std::env::var("CONFIGRAPH_LOGGING_LOCAL_PATH") {
        settings.logging.local_path = val;
    }

    Ok(())
}
