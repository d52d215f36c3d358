//! Declarative schemas
//!
//! Entities can be declared in TOML or JSON instead of code. Type names in
//! `extends` are looked up in a [`TypeRegistry`], which knows the built-ins plus
//! any `[types.*]` definitions from the same document.
//!
//! ```toml
//! [types.service_port]
//! extends = "port"
//! default = 8080
//!
//! [[entities]]
//! name = "api"
//!
//! [entities.items.APP_ENV]
//! value = "staging"
//!
//! [entities.items.PORT]
//! extends = "service_port"
//! env = "API_PORT"
//!
//! [entities.items.BASE_URL]
//! switch_by = "APP_ENV"
//! branches = { production = "https://api.example.com", _default = "http://localhost" }
//! ```
//!
//! Problems inside an item (unknown type, conflicting value sources) are recorded
//! on that item and surface after resolution. Problems with type definitions or the
//! document itself are returned as errors.

pub mod model;
pub mod registry;

pub use model::{EntitySchema, GraphSchema, ItemSchema, PickSchema, TypeSchema};
pub use registry::TypeRegistry;

use crate::core::entity::Entity;
use crate::core::graph::Configraph;
use crate::domain::{ConfigraphError, Result};
use std::path::Path;

impl GraphSchema {
    /// Parses a TOML document
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the document is not valid TOML or does
    /// not have the schema's shape.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Parses a JSON document
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Reads a schema file; `.json` files are parsed as JSON, anything else as TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigraphError::Io(format!("Failed to read schema file {}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    /// Registers the document's types in `registry` and builds its entities
    pub fn build(&self, registry: &mut TypeRegistry) -> Result<Vec<Entity>> {
        registry.register_schemas(&self.types)?;
        Ok(self
            .entities
            .iter()
            .map(|entity| entity.to_entity(registry))
            .collect())
    }
}

impl Configraph {
    /// Adds every entity declared in `schema`, with the built-in type registry
    ///
    /// # Errors
    ///
    /// Returns a schema error for invalid type definitions or duplicate entities.
    pub fn load_schema(&mut self, schema: &GraphSchema) -> Result<()> {
        self.load_schema_with(schema, &mut TypeRegistry::new())
    }

    /// Like [`load_schema`](Self::load_schema) with a caller-provided registry
    pub fn load_schema_with(
        &mut self,
        schema: &GraphSchema,
        registry: &mut TypeRegistry,
    ) -> Result<()> {
        let entities = schema.build(registry)?;
        tracing::debug!(
            types = schema.types.len(),
            entities = entities.len(),
            "Loaded declarative schema"
        );
        for entity in entities {
            self.add_entity(entity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    const SCHEMA: &str = r#"
[types.service_port]
extends = "port"
default = 8080

[[entities]]
name = "api"

[entities.items.PORT]
extends = "service_port"

[entities.items.db]
children = { host = { value = "localhost" }, port = { extends = "port", value = 5432 } }
"#;

    #[test]
    fn test_parse_toml() {
        let schema = GraphSchema::from_toml_str(SCHEMA).unwrap();
        assert_eq!(schema.types.len(), 1);
        assert_eq!(schema.entities[0].items.len(), 2);
        assert_eq!(schema.entities[0].items["db"].children.len(), 2);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = GraphSchema::from_toml_str("[[entities]]\nname = \"a\"\nbogus = 1\n").unwrap_err();
        assert!(matches!(err, ConfigraphError::Configuration(_)));
    }

    #[test]
    fn test_json_file() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"entities": [{{"name": "web", "items": {{"HOST": {{"value": "example.com"}}}}}}]}}"#
        )
        .unwrap();

        let schema = GraphSchema::from_file(file.path()).unwrap();
        assert_eq!(schema.entities[0].name, "web");
    }

    #[test]
    fn test_build_registers_types() {
        let schema = GraphSchema::from_toml_str(SCHEMA).unwrap();
        let mut registry = TypeRegistry::new();
        let entities = schema.build(&mut registry).unwrap();
        assert!(registry.contains("service_port"));
        assert_eq!(
            entities[0].node("PORT").unwrap().data_type().name(),
            "service_port"
        );
    }

    #[test]
    fn test_load_schema_rejects_duplicate_entities() {
        let schema = GraphSchema::from_toml_str(
            "[[entities]]\nname = \"a\"\n\n[[entities]]\nname = \"a\"\n",
        )
        .unwrap();
        let mut graph = Configraph::new();
        assert!(graph.load_schema(&schema).is_err());
    }
}
