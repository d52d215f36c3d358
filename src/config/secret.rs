//! Protected handling of sensitive resolved values
//!
//! Sensitive nodes are resolved like any other node. When their values are handed
//! to a downstream consumer (a redaction layer, a process launcher) they are
//! wrapped in [`secrecy::Secret`] so they are zeroized on drop and never show up
//! in `Debug` output.
//!
//! # Example
//!
//! ```rust
//! use configraph::config::{secret_string, SecretValue};
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("sk_live_123".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "sk_live_123");
//! assert!(!format!("{token:?}").contains("sk_live_123"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use zeroize::Zeroize;

/// String wrapper that satisfies the bounds `Secret` needs
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl From<SecretValue> for String {
    fn from(mut s: SecretValue) -> Self {
        std::mem::take(&mut s.0)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Text form of a resolved value: strings as-is, everything else as JSON
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => SecretValue(s.clone()),
            other => SecretValue(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in bytes, useful for redaction without exposing the value
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A secret string that is zeroized on drop and redacted in `Debug`
pub type SecretString = Secret<SecretValue>;

#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// A resolved sensitive node, ready for a downstream redaction layer
#[derive(Debug, Clone)]
pub struct SensitiveValue {
    /// Full node path (`entity!path`)
    pub path: String,
    /// Domains the value may be sent to; empty means unrestricted
    pub allowed_domains: Vec<String>,
    pub value: SecretString,
}

impl SensitiveValue {
    pub fn new(path: impl Into<String>, allowed_domains: Vec<String>, value: &Value) -> Self {
        Self {
            path: path.into(),
            allowed_domains,
            value: Secret::new(SecretValue::from_json(value)),
        }
    }

    /// Whether the value may be sent to `domain`
    pub fn is_allowed_for(&self, domain: &str) -> bool {
        self.allowed_domains.is_empty()
            || self.allowed_domains.iter().any(|allowed| {
                domain == allowed
                    || allowed
                        .strip_prefix("*.")
                        .is_some_and(|suffix| domain.ends_with(&format!(".{suffix}")))
            })
    }
}
