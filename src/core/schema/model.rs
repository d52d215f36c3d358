//! Serde models of declarative schemas and their conversion to entities

use super::registry::TypeRegistry;
use crate::core::entity::{Entity, PickSpec};
use crate::core::node::{ItemDef, Override};
use crate::core::resolver::{switch_by, Resolver};
use crate::core::types::builtins::{self, ArraySettings};
use crate::core::types::{DataType, TypeKind};
use crate::domain::NodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A named type layered on a registered one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSchema {
    pub extends: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub sensitive: Option<bool>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// Characters of a string or elements of an array
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Regular expression the whole string must match
    #[serde(default)]
    pub matches: Option<String>,
    #[serde(default)]
    pub one_of: Option<Vec<Value>>,
}

/// Declaration of one configuration item
///
/// At most one of `value`, `ref` and `switch_by` may be given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemSchema {
    /// Registered type name; `object` is implied by `children`
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    /// Path of a node whose value this item takes
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    /// Path of the node whose value selects a branch
    #[serde(default)]
    pub switch_by: Option<String>,
    /// Branch values keyed by switch value; `_default` catches the rest
    #[serde(default)]
    pub branches: BTreeMap<String, Value>,
    /// Environment variable consulted before the value
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sensitive: Option<SensitiveSchema>,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Declared children of an object item
    #[serde(default)]
    pub children: BTreeMap<String, ItemSchema>,
    /// Element declaration of an array or dictionary item
    #[serde(default)]
    pub items: Option<Box<ItemSchema>>,
}

/// `sensitive = true` or `sensitive = { allowed_domains = [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensitiveSchema {
    Flag(bool),
    Domains(AllowedDomains),
}

/// Domains a sensitive value may be sent to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowedDomains {
    pub allowed_domains: Vec<String>,
}

/// A pick of another entity's item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PickSchema {
    pub key: String,
    /// Source entity; the parent when omitted
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub rename: Option<String>,
    /// Type of the picked node; the source type when omitted
    #[serde(default)]
    pub extends: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub picks: Vec<PickSchema>,
    #[serde(default)]
    pub items: BTreeMap<String, ItemSchema>,
}

/// Types and entities of a whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSchema {
    #[serde(default)]
    pub types: BTreeMap<String, TypeSchema>,
    #[serde(default)]
    pub entities: Vec<EntitySchema>,
}

impl ItemSchema {
    /// Builds the item; problems become schema errors on the item
    pub fn to_item(&self, registry: &TypeRegistry) -> ItemDef {
        let mut errors = Vec::new();
        let data_type = self.data_type(registry, &mut errors);

        let mut item = ItemDef::new().extends(data_type);

        let sources = [
            self.value.is_some(),
            self.reference.is_some(),
            self.switch_by.is_some(),
        ];
        if sources.iter().filter(|set| **set).count() > 1 {
            errors.push(NodeError::schema(
                "Only one of 'value', 'ref' and 'switch_by' may be set",
            ));
        } else if let Some(value) = &self.value {
            item = item.value(value.clone());
        } else if let Some(path) = &self.reference {
            item = item.resolver(Resolver::reference(path.clone()));
        } else if let Some(path) = &self.switch_by {
            let switch = self
                .branches
                .iter()
                .fold(switch_by(path.clone()), |switch, (key, value)| {
                    switch.case(key.clone(), value.clone())
                });
            item = item.resolver(switch.into_resolver());
        }
        if self.switch_by.is_none() && !self.branches.is_empty() {
            errors.push(NodeError::schema("'branches' requires 'switch_by'"));
        }

        if let Some(var) = &self.env {
            item = item.with_override(Override::env(var.clone()));
        }
        if self.required {
            item = item.required();
        }
        match &self.sensitive {
            Some(SensitiveSchema::Flag(sensitive)) => item = item.sensitive(*sensitive),
            Some(SensitiveSchema::Domains(domains)) => {
                item = item.sensitive_for_domains(domains.allowed_domains.clone());
            }
            None => {}
        }
        if let Some(description) = &self.description {
            item = item.description(description.clone());
        }
        item = item.dynamic(self.dynamic);

        errors
            .into_iter()
            .fold(item, |item, err| item.with_schema_error(err))
    }

    fn data_type(&self, registry: &TypeRegistry, errors: &mut Vec<NodeError>) -> Arc<DataType> {
        let named = match self.extends.as_deref() {
            Some(name) => registry.get(name).or_else(|| {
                errors.push(NodeError::schema(format!("Unknown type '{name}'")));
                None
            }),
            None => None,
        };

        if !self.children.is_empty() {
            let children: Vec<(String, ItemDef)> = self
                .children
                .iter()
                .map(|(key, child)| (key.clone(), child.to_item(registry)))
                .collect();
            return match named {
                Some(t) if matches!(t.kind(), TypeKind::Object(_)) => {
                    refine(&t, TypeKind::Object(children))
                }
                Some(t) => {
                    errors.push(NodeError::schema(format!(
                        "Type '{}' cannot declare children",
                        t.name()
                    )));
                    builtins::object(children)
                }
                None => builtins::object(children),
            };
        }

        if let Some(element) = &self.items {
            let element_type = element.data_type(registry, errors);
            return match named {
                Some(t) => match t.kind() {
                    TypeKind::Array(_) => refine(&t, TypeKind::Array(Some(element_type))),
                    TypeKind::Dictionary(_) => {
                        refine(&t, TypeKind::Dictionary(Some(element_type)))
                    }
                    _ => {
                        errors.push(NodeError::schema(format!(
                            "Type '{}' cannot declare items",
                            t.name()
                        )));
                        builtins::any()
                    }
                },
                None => builtins::array(ArraySettings {
                    item_type: Some(element_type),
                    ..Default::default()
                }),
            };
        }

        named.unwrap_or_else(builtins::any)
    }
}

/// Keeps every stage of `named` and only swaps the element or child declaration
fn refine(named: &Arc<DataType>, kind: TypeKind) -> Arc<DataType> {
    DataType::builder(named.name()).extends(named).kind(kind).build()
}

impl PickSchema {
    fn to_pick(&self, registry: &TypeRegistry) -> Result<PickSpec, NodeError> {
        let mut pick = PickSpec::new(self.key.clone());
        if let Some(from) = &self.from {
            pick = pick.from_entity(from.clone());
        }
        if let Some(rename) = &self.rename {
            pick = pick.rename(rename.clone());
        }
        if let Some(name) = &self.extends {
            let data_type = registry
                .get(name)
                .ok_or_else(|| NodeError::schema(format!("Unknown type '{name}'")))?;
            pick = pick.with_type(data_type);
        }
        Ok(pick)
    }
}

impl EntitySchema {
    /// Builds the entity; item and pick problems are recorded on the entity
    pub fn to_entity(&self, registry: &TypeRegistry) -> Entity {
        let mut entity = Entity::new(self.name.clone());
        if let Some(parent) = &self.parent {
            entity = entity.with_parent(parent.clone());
        }
        for (key, item) in &self.items {
            entity = entity.with_item(key.clone(), item.to_item(registry));
        }
        for pick in &self.picks {
            match pick.to_pick(registry) {
                Ok(pick) => entity = entity.with_pick(pick),
                Err(err) => entity.schema_errors.push(err),
            }
        }
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conflicting_value_sources() {
        let schema = ItemSchema {
            value: Some(json!(1)),
            reference: Some("other".to_string()),
            ..Default::default()
        };
        let item = schema.to_item(&TypeRegistry::new());
        assert_eq!(item.schema_errors.len(), 1);
    }

    #[test]
    fn test_unknown_type_recorded() {
        let schema = ItemSchema {
            extends: Some("semver".to_string()),
            ..Default::default()
        };
        let item = schema.to_item(&TypeRegistry::new());
        assert_eq!(item.data_type().name(), "any");
        assert!(matches!(item.schema_errors[0], NodeError::Schema { .. }));
    }

    #[test]
    fn test_children_imply_object() {
        let mut children = BTreeMap::new();
        children.insert(
            "port".to_string(),
            ItemSchema {
                extends: Some("port".to_string()),
                ..Default::default()
            },
        );
        let schema = ItemSchema {
            children,
            ..Default::default()
        };
        let item = schema.to_item(&TypeRegistry::new());
        assert!(matches!(item.data_type().kind(), TypeKind::Object(c) if c.len() == 1));
        assert!(item.schema_errors.is_empty());
    }

    #[test]
    fn test_items_on_scalar_rejected() {
        let schema = ItemSchema {
            extends: Some("string".to_string()),
            items: Some(Box::new(ItemSchema::default())),
            ..Default::default()
        };
        let item = schema.to_item(&TypeRegistry::new());
        assert_eq!(item.schema_errors.len(), 1);
    }

    #[test]
    fn test_dictionary_items() {
        let schema = ItemSchema {
            extends: Some("dictionary".to_string()),
            items: Some(Box::new(ItemSchema {
                extends: Some("number".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let item = schema.to_item(&TypeRegistry::new());
        match item.data_type().kind() {
            TypeKind::Dictionary(Some(value_type)) => assert_eq!(value_type.name(), "number"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_items_keep_named_array_stages() {
        let mut registry = TypeRegistry::new();
        let mut types = BTreeMap::new();
        types.insert(
            "short_list".to_string(),
            TypeSchema {
                extends: "array".to_string(),
                max_length: Some(2),
                description: Some("At most two".to_string()),
                ..Default::default()
            },
        );
        registry.register_schemas(&types).unwrap();

        let schema = ItemSchema {
            extends: Some("short_list".to_string()),
            items: Some(Box::new(ItemSchema {
                extends: Some("number".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        };
        let item = schema.to_item(&registry);
        let data_type = item.data_type();

        assert!(data_type.extends_type("array"));
        assert_eq!(data_type.description(), Some("At most two"));
        assert!(matches!(data_type.kind(), TypeKind::Array(Some(t)) if t.name() == "number"));
        assert!(!data_type.apply(json!([1, 2, 3])).validation_errors.is_empty());
    }

    #[test]
    fn test_sensitive_flag_and_domains_forms() {
        let flag: ItemSchema = toml::from_str("sensitive = false").unwrap();
        let item = flag.to_item(&TypeRegistry::new());
        assert_eq!(item.sensitive, Some(false));
        assert!(item.allowed_domains.is_empty());

        let domains: ItemSchema =
            toml::from_str("sensitive = { allowed_domains = [\"api.stripe.com\"] }").unwrap();
        let item = domains.to_item(&TypeRegistry::new());
        assert_eq!(item.sensitive, Some(true));
        assert_eq!(item.allowed_domains, vec!["api.stripe.com".to_string()]);
    }

    #[test]
    fn test_sensitive_rejects_unknown_map_keys() {
        assert!(toml::from_str::<ItemSchema>("sensitive = { domains = [\"x\"] }").is_err());
    }

    #[test]
    fn test_pick_with_unknown_type_is_entity_error() {
        let schema = EntitySchema {
            name: "app".to_string(),
            picks: vec![PickSchema {
                key: "TOKEN".to_string(),
                extends: Some("nope".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let entity = schema.to_entity(&TypeRegistry::new());
        assert!(entity.picks().is_empty());
        assert_eq!(entity.schema_errors().len(), 1);
    }
}
