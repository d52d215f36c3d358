//! Environment snapshot used for env overrides
//!
//! The environment is captured once per pass so every node sees the same values,
//! and so tests can run against an injected environment instead of the process one.

use crate::domain::{ConfigraphError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Immutable view of environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// An empty environment
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot from explicit pairs
    ///
    /// ```
    /// use configraph::adapters::env::EnvSnapshot;
    ///
    /// let env = EnvSnapshot::from_vars([("PORT", "8080")]);
    /// assert_eq!(env.get("PORT"), Some("8080"));
    /// assert_eq!(env.get("HOST"), None);
    /// ```
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Captures the process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Captures the process environment layered over `.env` files
    ///
    /// Later files override earlier ones and the process environment overrides all
    /// files. Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a file exists but cannot be parsed.
    pub fn capture<P: AsRef<Path>>(dotenv_files: &[P]) -> Result<Self> {
        let mut snapshot = Self::empty();
        for path in dotenv_files {
            snapshot.layer_dotenv(path.as_ref())?;
        }
        snapshot.vars.extend(std::env::vars());
        Ok(snapshot)
    }

    /// Adds the variables of one `.env` file on top of this snapshot
    pub fn layer_dotenv(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Skipping missing dotenv file");
            return Ok(());
        }

        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            ConfigraphError::Configuration(format!(
                "Failed to read dotenv file {}: {e}",
                path.display()
            ))
        })?;

        let mut count = 0usize;
        for item in iter {
            let (key, value) = item.map_err(|e| {
                ConfigraphError::Configuration(format!(
                    "Failed to parse dotenv file {}: {e}",
                    path.display()
                ))
            })?;
            self.vars.insert(key, value);
            count += 1;
        }

        tracing::debug!(path = %path.display(), vars = count, "Loaded dotenv file");
        Ok(())
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_dotenv_layering_order() {
        let mut base = NamedTempFile::new().unwrap();
        writeln!(base, "HOST=base.local\nPORT=1000").unwrap();
        let mut local = NamedTempFile::new().unwrap();
        writeln!(local, "PORT=2000").unwrap();

        let mut env = EnvSnapshot::empty();
        env.layer_dotenv(base.path()).unwrap();
        env.layer_dotenv(local.path()).unwrap();

        assert_eq!(env.get("HOST"), Some("base.local"));
        assert_eq!(env.get("PORT"), Some("2000"));
    }

    #[test]
    fn test_missing_dotenv_is_skipped() {
        let mut env = EnvSnapshot::empty();
        env.layer_dotenv(Path::new("/no/such/.env")).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_process_env_overrides_dotenv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "CONFIGRAPH_DOTENV_ONLY=yes\nCARGO_MANIFEST_DIR=from-file").unwrap();

        let env = EnvSnapshot::capture(&[file.path()]).unwrap();
        assert_eq!(env.get("CONFIGRAPH_DOTENV_ONLY"), Some("yes"));
        if let Ok(expected) = std::env::var("CARGO_MANIFEST_DIR") {
            assert_eq!(env.get("CARGO_MANIFEST_DIR"), Some(expected.as_str()));
        }
    }

    #[test]
    fn test_with_var() {
        let env = EnvSnapshot::empty().with_var("A", "1");
        assert_eq!(env.get("A"), Some("1"));
    }
}
