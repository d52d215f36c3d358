//! Engine settings for Configraph.
//!
//! Settings are read from an optional TOML file and tune the engine: the caching
//! provider, the pass timeout, implicit environment overrides and logging. They
//! have nothing to do with the configuration schema being resolved.
//!
//! # Overview
//!
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CONFIGRAPH_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting; [`ConfigraphSettings::default`] is valid
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use configraph::config::load_settings;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = load_settings("configraph.toml")?;
//! println!("Cache provider: {:?}", settings.cache.provider);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Settings File
//!
//! ```toml
//! log_level = "info"
//!
//! [resolution]
//! timeout_ms = 5000
//! env_overrides = true
//! env_prefix = "APP_"
//! dotenv_files = [".env", ".env.local"]
//!
//! [cache]
//! provider = "file"
//! path = "${HOME}/.configraph/cache.json"
//! mode = "default"
//!
//! [logging]
//! local_enabled = true
//! local_path = "./logs"
//! local_rotation = "daily"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_settings, load_settings_from_str};
pub use schema::{
    CacheConfig, CacheMode, CacheProviderKind, ConfigraphSettings, LoggingConfig,
    ResolutionConfig,
};
pub use secret::{secret_string, SecretString, SecretValue, SensitiveValue};
