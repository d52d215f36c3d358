//! Named data types for declarative schemas

use super::model::TypeSchema;
use crate::core::types::builtins::{self, NumberSettings};
use crate::core::types::{value_type_name, DataType, ValidationIssue};
use crate::domain::{ConfigraphError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Lookup table from type name to [`DataType`]
///
/// A new registry already knows every built-in type:
///
/// ```
/// use configraph::core::schema::TypeRegistry;
///
/// let registry = TypeRegistry::new();
/// assert!(registry.get("port").is_some());
/// assert!(registry.get("integer").is_some());
/// assert!(registry.get("semver").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<DataType>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let integer = DataType::builder("integer")
            .extends(&builtins::number(NumberSettings {
                is_int: true,
                ..Default::default()
            }))
            .build();

        let types = [
            builtins::any(),
            builtins::string(Default::default()),
            builtins::number(Default::default()),
            integer,
            builtins::boolean(),
            builtins::email(),
            builtins::url(Default::default()),
            builtins::ip_address(None),
            builtins::port(),
            builtins::uuid(),
            builtins::iso_date(),
            builtins::object(Vec::new()),
            builtins::array(Default::default()),
            builtins::dictionary(None),
        ]
        .into_iter()
        .map(|t| (t.name().to_string(), t))
        .collect();

        Self { types }
    }

    pub fn get(&self, name: &str) -> Option<Arc<DataType>> {
        self.types.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Adds a type under its own name
    ///
    /// # Errors
    ///
    /// Returns a schema error if the name is taken.
    pub fn register(&mut self, data_type: Arc<DataType>) -> Result<()> {
        let name = data_type.name().to_string();
        if self.types.contains_key(&name) {
            return Err(ConfigraphError::Schema(format!(
                "Type '{name}' is already registered"
            )));
        }
        self.types.insert(name, data_type);
        Ok(())
    }

    /// Registers declarative type definitions, in any order
    ///
    /// A definition may extend a built-in or another definition.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown parents, extension cycles, name clashes
    /// and invalid `matches` patterns.
    pub fn register_schemas(&mut self, schemas: &BTreeMap<String, TypeSchema>) -> Result<()> {
        let mut pending: Vec<(&String, &TypeSchema)> = schemas.iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for (name, schema) in pending {
                match self.get(&schema.extends) {
                    Some(parent) => self.register(build_type(name, schema, &parent)?)?,
                    None => deferred.push((name, schema)),
                }
            }
            if deferred.len() == before {
                let names: Vec<String> = deferred
                    .iter()
                    .map(|(name, schema)| format!("{name} extends {}", schema.extends))
                    .collect();
                return Err(ConfigraphError::Schema(format!(
                    "Unresolvable type definitions: {}",
                    names.join(", ")
                )));
            }
            pending = deferred;
        }
        Ok(())
    }
}

fn build_type(name: &str, schema: &TypeSchema, parent: &Arc<DataType>) -> Result<Arc<DataType>> {
    let mut builder = DataType::builder(name).extends(parent);

    if let Some(description) = &schema.description {
        builder = builder.description(description.clone());
    }
    if let Some(default) = &schema.default {
        builder = builder.default_value(default.clone());
    }
    if let Some(sensitive) = schema.sensitive {
        builder = builder.sensitive(sensitive);
    }

    if let Some(min) = schema.min {
        builder = builder.validate(move |v| match v.as_f64() {
            Some(n) if n < min => Err(ValidationIssue::error(format!(
                "Value must be at least {min}, got {n}"
            ))),
            _ => Ok(()),
        });
    }
    if let Some(max) = schema.max {
        builder = builder.validate(move |v| match v.as_f64() {
            Some(n) if n > max => Err(ValidationIssue::error(format!(
                "Value must be at most {max}, got {n}"
            ))),
            _ => Ok(()),
        });
    }
    if let Some(min) = schema.min_length {
        builder = builder.validate(move |v| match length(v) {
            Some(len) if len < min => Err(ValidationIssue::error(format!(
                "Length must be at least {min}, got {len}"
            ))),
            _ => Ok(()),
        });
    }
    if let Some(max) = schema.max_length {
        builder = builder.validate(move |v| match length(v) {
            Some(len) if len > max => Err(ValidationIssue::error(format!(
                "Length must be at most {max}, got {len}"
            ))),
            _ => Ok(()),
        });
    }
    if let Some(pattern) = &schema.matches {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            ConfigraphError::Schema(format!("Type '{name}' has an invalid pattern: {e}"))
        })?;
        let pattern = pattern.clone();
        builder = builder.validate(move |v| match v.as_str() {
            Some(s) if !regex.is_match(s) => Err(ValidationIssue::error(format!(
                "Value must match pattern '{pattern}'"
            ))),
            Some(_) => Ok(()),
            None => Err(ValidationIssue::error(format!(
                "Pattern check needs a string, got {}",
                value_type_name(v)
            ))),
        });
    }
    if let Some(options) = schema.one_of.clone() {
        builder = builder.validate(move |v| {
            if options.contains(v) {
                Ok(())
            } else {
                Err(ValidationIssue::error(format!(
                    "Value must be one of: {}",
                    options
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                )))
            }
        });
    }

    Ok(builder.build())
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn type_schema(extends: &str) -> TypeSchema {
        TypeSchema {
            extends: extends.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = TypeRegistry::new();
        for name in ["any", "string", "number", "boolean", "url", "array", "dictionary"] {
            assert!(registry.contains(name), "missing {name}");
        }
        let integer = registry.get("integer").unwrap();
        assert!(integer.apply(json!(1.5)).validation_errors.len() == 1);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = TypeRegistry::new();
        assert!(registry.register(builtins::port()).is_err());
    }

    #[test]
    fn test_definitions_in_any_order() {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "a_even_port".to_string(),
            TypeSchema {
                max: Some(9000.0),
                ..type_schema("b_base_port")
            },
        );
        schemas.insert(
            "b_base_port".to_string(),
            TypeSchema {
                default: Some(json!(8080)),
                ..type_schema("port")
            },
        );

        let mut registry = TypeRegistry::new();
        registry.register_schemas(&schemas).unwrap();

        let t = registry.get("a_even_port").unwrap();
        assert_eq!(t.chain_names(), vec!["number", "port", "b_base_port", "a_even_port"]);
        assert_eq!(t.default_value(), Some(&json!(8080)));
        assert_eq!(t.apply(json!("9500")).validation_errors.len(), 1);
    }

    #[test]
    fn test_unknown_parent_and_cycles_rejected() {
        let mut schemas = BTreeMap::new();
        schemas.insert("x".to_string(), type_schema("y"));
        schemas.insert("y".to_string(), type_schema("x"));
        let err = TypeRegistry::new().register_schemas(&schemas).unwrap_err();
        assert!(err.to_string().contains("Unresolvable"));
    }

    #[test]
    fn test_pattern_and_one_of() {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "region".to_string(),
            TypeSchema {
                matches: Some("[a-z]{2}-[a-z]+-\\d".to_string()),
                ..type_schema("string")
            },
        );
        schemas.insert(
            "tier".to_string(),
            TypeSchema {
                one_of: Some(vec![json!("free"), json!("pro")]),
                ..type_schema("string")
            },
        );
        let mut registry = TypeRegistry::new();
        registry.register_schemas(&schemas).unwrap();

        let region = registry.get("region").unwrap();
        assert!(region.apply(json!("eu-west-1")).validation_errors.is_empty());
        assert_eq!(region.apply(json!("EU")).validation_errors.len(), 1);

        let tier = registry.get("tier").unwrap();
        assert!(tier.apply(json!("pro")).validation_errors.is_empty());
        assert_eq!(tier.apply(json!("gold")).validation_errors.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_is_schema_error() {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            "broken".to_string(),
            TypeSchema {
                matches: Some("(".to_string()),
                ..type_schema("string")
            },
        );
        assert!(matches!(
            TypeRegistry::new().register_schemas(&schemas),
            Err(ConfigraphError::Schema(_))
        ));
    }
}
