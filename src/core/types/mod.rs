//! Data types: coercion and validation chains
//!
//! A [`DataType`] turns a raw value into a typed, validated value. Types extend
//! other types; at build time the chain is flattened into an ordered list of
//! stages, innermost (base) type first. For `A extends B extends C` the stages run
//! `C → B → A`, each stage coercing and then validating.
//!
//! Coercion stops at the first failing stage and the value keeps whatever shape
//! the last successful stage produced. Validation errors are collected from every
//! stage that ran.
//!
//! # Example
//!
//! ```
//! use configraph::core::types::{builtins, DataType, ValidationIssue};
//! use serde_json::json;
//!
//! let even_port = DataType::builder("even_port")
//!     .extends(&builtins::port())
//!     .validate(|value| match value.as_i64() {
//!         Some(n) if n % 2 == 0 => Ok(()),
//!         _ => Err(ValidationIssue::error("port must be even")),
//!     })
//!     .build();
//!
//! let outcome = even_port.apply(json!("8080"));
//! assert_eq!(outcome.value, json!(8080));
//! assert!(outcome.validation_errors.is_empty());
//! assert_eq!(even_port.chain_names(), vec!["number", "port", "even_port"]);
//! ```

pub mod builtins;

use crate::core::node::ItemDef;
use crate::domain::NodeError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Coercion function: converts a value or explains why it cannot
pub type CoerceFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Validation function: accepts a coerced value or reports an issue
pub type ValidateFn = Arc<dyn Fn(&Value) -> Result<(), ValidationIssue> + Send + Sync>;

/// A failed validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub message: String,
    pub is_warning: bool,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_warning: false,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_warning: true,
        }
    }
}

impl From<String> for ValidationIssue {
    fn from(message: String) -> Self {
        Self::error(message)
    }
}

impl From<ValidationIssue> for NodeError {
    fn from(issue: ValidationIssue) -> Self {
        NodeError::Validation {
            message: issue.message,
            is_warning: issue.is_warning,
        }
    }
}

/// Shape of the values a type produces
#[derive(Clone)]
pub enum TypeKind {
    /// A single value with no addressable children
    Scalar,
    /// An object with a fixed set of declared children
    Object(Vec<(String, ItemDef)>),
    /// An array whose elements all share one type (`None` accepts anything)
    Array(Option<Arc<DataType>>),
    /// An object with arbitrary keys whose values share one type
    Dictionary(Option<Arc<DataType>>),
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::Scalar => "scalar",
            TypeKind::Object(_) => "object",
            TypeKind::Array(_) => "array",
            TypeKind::Dictionary(_) => "dictionary",
        }
    }

    pub fn is_composite(&self) -> bool {
        !matches!(self, TypeKind::Scalar)
    }
}

impl fmt::Debug for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Object(children) => f
                .debug_tuple("Object")
                .field(&children.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>())
                .finish(),
            TypeKind::Array(item) | TypeKind::Dictionary(item) => f
                .debug_tuple(self.name())
                .field(&item.as_ref().map(|t| t.name()))
                .finish(),
            TypeKind::Scalar => f.write_str("Scalar"),
        }
    }
}

/// One level of a flattened extension chain
#[derive(Clone)]
struct Stage {
    type_name: String,
    coerce: Option<CoerceFn>,
    validators: Vec<ValidateFn>,
}

/// Result of running a value through a type chain
#[derive(Debug, Clone, PartialEq)]
pub struct TypeOutcome {
    /// The coerced value, or the last successfully coerced value on failure
    pub value: Value,
    pub coercion_error: Option<NodeError>,
    pub validation_errors: Vec<NodeError>,
}

/// Immutable coercion/validation rule set
pub struct DataType {
    name: String,
    parent: Option<Arc<DataType>>,
    description: Option<String>,
    default_value: Option<Value>,
    sensitive: Option<bool>,
    kind: Option<TypeKind>,
    stages: Vec<Stage>,
}

impl DataType {
    /// Starts building a new type
    pub fn builder(name: impl Into<String>) -> DataTypeBuilder {
        DataTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<DataType>> {
        self.parent.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.description()))
    }

    /// Type names in the order their stages run (innermost first)
    pub fn chain_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(t) = current {
            names.push(t.name.as_str());
            current = t.parent.as_deref();
        }
        names.reverse();
        names
    }

    /// Returns true if this type is, or extends, the named type
    pub fn extends_type(&self, name: &str) -> bool {
        self.chain_names().contains(&name)
    }

    /// Default value, searched from the outermost type inward
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.default_value()))
    }

    /// Sensitivity, inherited from the parent unless set at this level
    pub fn is_sensitive(&self) -> bool {
        self.sensitive
            .or_else(|| self.parent.as_ref().map(|p| p.is_sensitive()))
            .unwrap_or(false)
    }

    /// Composite kind, inherited from the parent unless set at this level
    pub fn kind(&self) -> &TypeKind {
        const SCALAR: &TypeKind = &TypeKind::Scalar;
        match &self.kind {
            Some(kind) => kind,
            None => self.parent.as_ref().map(|p| p.kind()).unwrap_or(SCALAR),
        }
    }

    /// Runs every stage of the chain against a value
    ///
    /// Composite children are not visited here; the resolution engine handles them
    /// because children may carry resolvers of their own.
    pub fn apply(&self, raw: Value) -> TypeOutcome {
        let mut value = raw;
        let mut validation_errors = Vec::new();

        for stage in &self.stages {
            if let Some(coerce) = &stage.coerce {
                match coerce(value.clone()) {
                    Ok(coerced) => value = coerced,
                    Err(message) => {
                        return TypeOutcome {
                            value,
                            coercion_error: Some(NodeError::coercion(format!(
                                "[{}] {}",
                                stage.type_name, message
                            ))),
                            validation_errors,
                        };
                    }
                }
            }

            for validate in &stage.validators {
                if let Err(issue) = validate(&value) {
                    validation_errors.push(NodeError::from(ValidationIssue {
                        message: format!("[{}] {}", stage.type_name, issue.message),
                        is_warning: issue.is_warning,
                    }));
                }
            }
        }

        TypeOutcome {
            value,
            coercion_error: None,
            validation_errors,
        }
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataType")
            .field("chain", &self.chain_names())
            .field("kind", self.kind())
            .field("sensitive", &self.is_sensitive())
            .finish()
    }
}

/// Builder for [`DataType`]
pub struct DataTypeBuilder {
    name: String,
    parent: Option<Arc<DataType>>,
    description: Option<String>,
    coerce: Option<CoerceFn>,
    validators: Vec<ValidateFn>,
    default_value: Option<Value>,
    sensitive: Option<bool>,
    kind: Option<TypeKind>,
}

impl DataTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            description: None,
            coerce: None,
            validators: Vec::new(),
            default_value: None,
            sensitive: None,
            kind: None,
        }
    }

    /// Layers this type on top of an existing one
    pub fn extends(mut self, parent: &Arc<DataType>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn coerce<F>(mut self, coerce: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.coerce = Some(Arc::new(coerce));
        self
    }

    /// Adds a validation rule; rules at one level run in the order they were added
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value) -> Result<(), ValidationIssue> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validate));
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = Some(sensitive);
        self
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn build(self) -> Arc<DataType> {
        let mut stages = self
            .parent
            .as_ref()
            .map(|p| p.stages.clone())
            .unwrap_or_default();
        stages.push(Stage {
            type_name: self.name.clone(),
            coerce: self.coerce,
            validators: self.validators,
        });

        Arc::new(DataType {
            name: self.name,
            parent: self.parent,
            description: self.description,
            default_value: self.default_value,
            sensitive: self.sensitive,
            kind: self.kind,
            stages,
        })
    }
}

/// Human readable name of a JSON value's type, used in coercion messages
pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording_type(
        name: &str,
        parent: Option<&Arc<DataType>>,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<DataType> {
        let coerce_log = Arc::clone(log);
        let validate_log = Arc::clone(log);
        let coerce_name = name.to_string();
        let validate_name = name.to_string();
        let mut builder = DataType::builder(name)
            .coerce(move |v| {
                coerce_log
                    .lock()
                    .unwrap()
                    .push(format!("coerce:{coerce_name}"));
                Ok(v)
            })
            .validate(move |_| {
                validate_log
                    .lock()
                    .unwrap()
                    .push(format!("validate:{validate_name}"));
                Ok(())
            });
        if let Some(parent) = parent {
            builder = builder.extends(parent);
        }
        builder.build()
    }

    #[test]
    fn test_chain_runs_innermost_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let c = recording_type("c", None, &log);
        let b = recording_type("b", Some(&c), &log);
        let a = recording_type("a", Some(&b), &log);

        a.apply(json!(1));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "coerce:c",
                "validate:c",
                "coerce:b",
                "validate:b",
                "coerce:a",
                "validate:a"
            ]
        );
        assert_eq!(a.chain_names(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_failing_middle_coercion_stops_outer_levels() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let c = recording_type("c", None, &log);
        let b_log = Arc::clone(&log);
        let b = DataType::builder("b")
            .extends(&c)
            .coerce(move |_| {
                b_log.lock().unwrap().push("coerce:b".to_string());
                Err("b refuses".to_string())
            })
            .build();
        let a = recording_type("a", Some(&b), &log);

        let outcome = a.apply(json!("raw"));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["coerce:c", "validate:c", "coerce:b"]
        );
        assert_eq!(outcome.value, json!("raw"));
        assert_eq!(
            outcome.coercion_error,
            Some(NodeError::coercion("[b] b refuses"))
        );
    }

    #[test]
    fn test_validation_errors_collected_from_every_level() {
        let base = DataType::builder("base")
            .validate(|_| Err(ValidationIssue::error("base rule")))
            .build();
        let outer = DataType::builder("outer")
            .extends(&base)
            .validate(|_| Err(ValidationIssue::warning("outer rule")))
            .build();

        let outcome = outer.apply(json!(true));
        assert_eq!(
            outcome.validation_errors,
            vec![
                NodeError::validation("[base] base rule"),
                NodeError::warning("[outer] outer rule"),
            ]
        );
    }

    #[test]
    fn test_inherited_attributes() {
        let secret = DataType::builder("secret")
            .sensitive(true)
            .default_value("fallback")
            .build();
        let token = DataType::builder("token").extends(&secret).build();
        let public = DataType::builder("public")
            .extends(&secret)
            .sensitive(false)
            .default_value("other")
            .build();

        assert!(token.is_sensitive());
        assert_eq!(token.default_value(), Some(&json!("fallback")));
        assert!(!public.is_sensitive());
        assert_eq!(public.default_value(), Some(&json!("other")));
        assert!(token.extends_type("secret"));
        assert!(!secret.extends_type("token"));
    }
}
