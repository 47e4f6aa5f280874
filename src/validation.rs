//! Schema validation helpers.
//!
//! Resource configuration is checked against its [`Schema`] before any API call:
//! presence of required values, value types, nested block cardinality,
//! attribute validators and mutually exclusive siblings. Setting a deprecated
//! attribute yields a warning rather than an error.
//!
//! # Example
//!
//! ```
//! use scaleway_provider::schema::{Attribute, Schema, Validator};
//! use scaleway_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("forward_protocol", Attribute::required_string()
//!         .with_validator(Validator::one_of(&["tcp", "http"])));
//!
//! assert!(validate(&schema, &json!({"forward_protocol": "tcp"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"forward_protocol": "udp"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("forward_protocol".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, Diagnostic, DiagnosticSeverity, NestedBlock, Schema,
};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Validate a JSON value against a schema.
///
/// Returns every diagnostic found, warnings included. Use [`validate_result`]
/// to fail only on errors.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Err with the diagnostics
/// when any of them is an error.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error)
    {
        Err(diagnostics)
    } else {
        Ok(())
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate_result(schema, value).is_ok()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diagnostic = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diagnostic = diagnostic.with_attribute(path);
            }
            diagnostics.push(diagnostic);
            return;
        },
    };

    let mut conflicts = BTreeSet::new();
    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
        collect_conflicts(name, &attr.conflicts_with, obj, &mut conflicts);
    }

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
        collect_conflicts(name, &nested.conflicts_with, obj, &mut conflicts);
    }

    for (a, b) in conflicts {
        let a_path = join_path(path, &a);
        diagnostics.push(
            Diagnostic::error(format!(
                "Conflicting attributes '{}' and '{}'",
                a_path,
                join_path(path, &b)
            ))
            .with_detail("Only one of these may be set")
            .with_attribute(a_path),
        );
    }
}

/// A value counts as set when it is present, non-null and not an empty block list.
fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn collect_conflicts(
    name: &str,
    conflicts_with: &[String],
    obj: &Map<String, Value>,
    found: &mut BTreeSet<(String, String)>,
) {
    if !is_set(obj.get(name)) {
        return;
    }
    for other in conflicts_with {
        if is_set(obj.get(other)) {
            // ordered so a pair declared on both sides is reported once
            let pair = if name < other.as_str() {
                (name.to_string(), other.clone())
            } else {
                (other.clone(), name.to_string())
            };
            found.insert(pair);
        }
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Computed-only attributes are set by the provider
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                for validator in &attr.validators {
                    if let Err(reason) = validator.check(v) {
                        diagnostics.push(
                            Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                                .with_detail(reason)
                                .with_attribute(path),
                        );
                    }
                }
            }
            if let Some(message) = &attr.deprecated {
                diagnostics.push(
                    Diagnostic::warning(format!("Attribute '{}' is deprecated", path))
                        .with_detail(message.clone())
                        .with_attribute(path),
                );
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                for (name, attr_type) in attrs {
                    if let Some(value) = obj.get(name) {
                        validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
                    }
                }
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {},
        Some(Value::Array(arr)) => {
            check_item_count(nested, arr.len(), path, diagnostics);
            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn check_item_count(nested: &NestedBlock, len: usize, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let len = len as u32;
    // 0 means unlimited
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }
}

pub(crate) fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}
