//! Request validation against an endpoint's declared schema.
//!
//! The runtime only depends on the [`RequestValidator`] trait; the bundled
//! [`SchemaValidator`] covers the pragmatic JSON-Schema subset catalogs
//! actually use (`type`, `required`, `properties`, `enum`, numeric and
//! length bounds). A schema may carry independent `query`, `body`, and
//! `headers` sub-schemas; error strings are prefixed with the section they
//! came from, e.g. `body/name: is required`.

use serde_json::Value;
use std::collections::HashMap;

/// Outcome of validating one request.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parts of the request handed to the validator.
#[derive(Debug, Clone)]
pub struct RequestParts<'a> {
    pub query: &'a HashMap<String, String>,
    pub body: &'a Value,
    pub headers: &'a HashMap<String, String>,
}

/// External validation collaborator.
pub trait RequestValidator: Send + Sync {
    fn validate(&self, schema: &Value, parts: &RequestParts<'_>) -> ValidationReport;
}

/// Built-in structural validator.
#[derive(Debug, Default)]
pub struct SchemaValidator;

impl RequestValidator for SchemaValidator {
    fn validate(&self, schema: &Value, parts: &RequestParts<'_>) -> ValidationReport {
        let mut errors = Vec::new();

        if let Some(query_schema) = schema.get("query") {
            let query_value = Value::Object(
                parts
                    .query
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            );
            check(query_schema, &query_value, "query", &mut errors);
        }
        if let Some(body_schema) = schema.get("body") {
            check(body_schema, parts.body, "body", &mut errors);
        }
        if let Some(header_schema) = schema.get("headers") {
            let header_value = Value::Object(
                parts
                    .headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            );
            check(header_schema, &header_value, "headers", &mut errors);
        }

        ValidationReport { errors }
    }
}

fn check(schema: &Value, value: &Value, path: &str, errors: &mut Vec<String>) {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            errors.push(format!("{path}: expected type {expected}"));
            return;
        }
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            let present = value
                .as_object()
                .map(|obj| obj.contains_key(name))
                .unwrap_or(false);
            if !present {
                errors.push(format!("{path}/{name}: is required"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        if let Some(object) = value.as_object() {
            for (name, property_schema) in properties {
                if let Some(property) = object.get(name) {
                    check(property_schema, property, &format!("{path}/{name}"), errors);
                }
            }
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(format!("{path}: value not in enum"));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(minimum) = schema.get("minimum").and_then(Value::as_f64) {
            if n < minimum {
                errors.push(format!("{path}: must be >= {minimum}"));
            }
        }
        if let Some(maximum) = schema.get("maximum").and_then(Value::as_f64) {
            if n > maximum {
                errors.push(format!("{path}: must be <= {maximum}"));
            }
        }
    }

    if let Some(s) = value.as_str() {
        if let Some(min_length) = schema.get("minLength").and_then(Value::as_u64) {
            if (s.chars().count() as u64) < min_length {
                errors.push(format!("{path}: shorter than minLength {min_length}"));
            }
        }
        if let Some(max_length) = schema.get("maxLength").and_then(Value::as_u64) {
            if (s.chars().count() as u64) > max_length {
                errors.push(format!("{path}: longer than maxLength {max_length}"));
            }
        }
    }

    if let Some(item_schema) = schema.get("items") {
        if let Some(items) = value.as_array() {
            for (index, item) in items.iter().enumerate() {
                check(item_schema, item, &format!("{path}/{index}"), errors);
            }
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}
