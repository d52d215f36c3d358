//! Node path newtype with parsing and validation
//!
//! Nodes are addressed as `entity!key.child.child`. The entity part is optional
//! when a path is resolved relative to the entity that owns the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the entity name and the node path
pub const ENTITY_SEPARATOR: char = '!';

/// Separator between path segments
pub const PATH_SEPARATOR: char = '.';

/// Address of a node, optionally qualified by its entity
///
/// # Examples
///
/// ```
/// use configraph::domain::paths::NodePath;
/// use std::str::FromStr;
///
/// let path = NodePath::from_str("api!database.port").unwrap();
/// assert_eq!(path.entity(), Some("api"));
/// assert_eq!(path.key(), "database");
/// assert_eq!(path.local_path(), "database.port");
/// assert_eq!(path.to_string(), "api!database.port");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath {
    entity: Option<String>,
    segments: Vec<String>,
}

impl NodePath {
    /// Parses a path of the form `[entity!]segment(.segment)*`
    pub fn new(path: impl AsRef<str>) -> Result<Self, String> {
        let path = path.as_ref().trim();
        if path.is_empty() {
            return Err("Node path cannot be empty".to_string());
        }

        let (entity, local) = match path.split_once(ENTITY_SEPARATOR) {
            Some((entity, local)) => {
                if entity.is_empty() {
                    return Err(format!("Node path '{path}' has an empty entity name"));
                }
                (Some(entity.to_string()), local)
            }
            None => (None, path),
        };

        let segments: Vec<String> = local.split(PATH_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty() || s.contains(ENTITY_SEPARATOR)) {
            return Err(format!("Node path '{path}' contains an empty or invalid segment"));
        }

        Ok(Self { entity, segments })
    }

    /// Builds a fully qualified path from parts that are already valid
    pub fn qualified(entity: impl Into<String>, local_path: &str) -> Self {
        Self {
            entity: Some(entity.into()),
            segments: local_path
                .split(PATH_SEPARATOR)
                .map(str::to_string)
                .collect(),
        }
    }

    /// Fills in the entity when the path was written relative to one
    pub fn qualify(mut self, default_entity: &str) -> Self {
        if self.entity.is_none() {
            self.entity = Some(default_entity.to_string());
        }
        self
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// The top-level key within the entity
    pub fn key(&self) -> &str {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments below the top-level key
    pub fn child_segments(&self) -> &[String] {
        &self.segments[1..]
    }

    /// The dot path within the entity
    pub fn local_path(&self) -> String {
        self.segments.join(".")
    }

    /// The qualified path of the top-level node this path lives under
    pub fn top_level(&self) -> NodePath {
        Self {
            entity: self.entity.clone(),
            segments: vec![self.segments[0].clone()],
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{entity}{ENTITY_SEPARATOR}{}", self.local_path()),
            None => write!(f, "{}", self.local_path()),
        }
    }
}

impl FromStr for NodePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Checks that a string can be used as a single item key
pub fn validate_key(key: &str) -> Result<(), String> {
    if key.trim().is_empty() {
        return Err("Item key cannot be empty".to_string());
    }
    if key.contains(PATH_SEPARATOR) || key.contains(ENTITY_SEPARATOR) {
        return Err(format!(
            "Item key '{key}' cannot contain '{PATH_SEPARATOR}' or '{ENTITY_SEPARATOR}'"
        ));
    }
    Ok(())
}
