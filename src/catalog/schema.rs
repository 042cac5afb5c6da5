//! Typed subset of JSON Schema used to describe and check tool arguments.
//!
//! Arguments are validated locally so that malformed calls never reach the
//! remote API.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|number| number.fract() == 0.0)
            }
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl SchemaViolation {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() {
                "arguments".to_string()
            } else {
                path.to_string()
            },
            message: message.into(),
        }
    }
}

impl Schema {
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|field| field == name)
    }

    /// Checks a tool argument object and returns it with `null` optional
    /// properties removed.
    pub fn validate_arguments(&self, arguments: Value) -> Result<Map<String, Value>, SchemaViolation> {
        let mut object = match arguments {
            Value::Null => Map::new(),
            Value::Object(object) => object,
            other => {
                return Err(SchemaViolation::new(
                    "",
                    format!("must be a JSON object, got {}", type_name(&other)),
                ))
            }
        };

        object.retain(|key, value| !(value.is_null() && !self.is_required(key)));
        self.validate_object(&object, "")?;
        Ok(object)
    }

    /// Fills absent top-level properties from their `default`. `except` names a
    /// property left unset so a configured fallback can apply instead.
    pub fn apply_defaults(&self, object: &mut Map<String, Value>, except: Option<&str>) {
        for (name, property) in &self.properties {
            if except == Some(name.as_str()) || object.contains_key(name) {
                continue;
            }
            if let Some(default) = &property.default {
                object.insert(name.clone(), default.clone());
            }
        }
    }

    pub fn validate(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        if let Some(kind) = self.kind {
            if !kind.accepts(value) {
                return Err(SchemaViolation::new(
                    path,
                    format!("expected {}, got {}", kind.as_str(), type_name(value)),
                ));
            }
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                let options = allowed
                    .iter()
                    .map(|option| option.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(SchemaViolation::new(path, format!("must be one of: {options}")));
            }
        }

        match value {
            Value::String(text) => self.validate_string(text, path),
            Value::Number(_) => self.validate_number(value, path),
            Value::Array(items) => self.validate_array(items, path),
            Value::Object(object) => self.validate_object(object, path),
            Value::Bool(_) | Value::Null => Ok(()),
        }
    }

    /// Reports the first `pattern` keyword that is not a valid regular expression.
    pub fn invalid_pattern(&self) -> Option<String> {
        if let Some(pattern) = &self.pattern {
            if Regex::new(pattern).is_err() {
                return Some(pattern.clone());
            }
        }

        self.items
            .iter()
            .map(|items| &**items)
            .chain(self.properties.values())
            .find_map(Schema::invalid_pattern)
    }

    /// Input schema in the shape expected by MCP hosts. The top level always
    /// carries a `required` list, even when empty.
    pub fn to_input_schema(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Some(object) = value.as_object_mut() {
            object
                .entry("type")
                .or_insert_with(|| Value::String("object".to_string()));
            object
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
            object
                .entry("required")
                .or_insert_with(|| Value::Array(Vec::new()));
        }
        value
    }

    fn validate_string(&self, text: &str, path: &str) -> Result<(), SchemaViolation> {
        let length = text.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return Err(SchemaViolation::new(
                    path,
                    format!("must be at least {min} characters"),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(SchemaViolation::new(
                    path,
                    format!("must be at most {max} characters"),
                ));
            }
        }

        if let Some(pattern) = &self.pattern {
            let regex = Regex::new(pattern)
                .map_err(|_| SchemaViolation::new(path, "schema pattern is invalid"))?;
            if !regex.is_match(text) {
                return Err(SchemaViolation::new(
                    path,
                    format!("does not match pattern {pattern}"),
                ));
            }
        }

        match self.format.as_deref() {
            Some("date") if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_err() => Err(
                SchemaViolation::new(path, "must be a calendar date (YYYY-MM-DD)"),
            ),
            Some("email") if !looks_like_email(text) => {
                Err(SchemaViolation::new(path, "must be an email address"))
            }
            _ => Ok(()),
        }
    }

    fn validate_number(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        let Some(number) = value.as_f64() else {
            return Ok(());
        };

        if let Some(min) = &self.minimum {
            if min.as_f64().is_some_and(|min| number < min) {
                return Err(SchemaViolation::new(path, format!("must be >= {min}")));
            }
        }
        if let Some(max) = &self.maximum {
            if max.as_f64().is_some_and(|max| number > max) {
                return Err(SchemaViolation::new(path, format!("must be <= {max}")));
            }
        }

        Ok(())
    }

    fn validate_array(&self, items: &[Value], path: &str) -> Result<(), SchemaViolation> {
        if let Some(min) = self.min_items {
            if items.len() < min {
                return Err(SchemaViolation::new(
                    path,
                    format!("must contain at least {min} items"),
                ));
            }
        }
        if let Some(max) = self.max_items {
            if items.len() > max {
                return Err(SchemaViolation::new(
                    path,
                    format!("must contain at most {max} items"),
                ));
            }
        }

        if let Some(item_schema) = &self.items {
            for (index, item) in items.iter().enumerate() {
                item_schema.validate(item, &format!("{}[{index}]", display_path(path)))?;
            }
        }

        Ok(())
    }

    fn validate_object(&self, object: &Map<String, Value>, path: &str) -> Result<(), SchemaViolation> {
        for field in &self.required {
            if object.get(field).map_or(true, Value::is_null) {
                return Err(SchemaViolation::new(
                    &child_path(path, field),
                    "is required",
                ));
            }
        }

        for (key, value) in object {
            match self.properties.get(key) {
                Some(schema) => {
                    if value.is_null() && !self.is_required(key) {
                        continue;
                    }
                    schema.validate(value, &child_path(path, key))?;
                }
                None if self.additional_properties == Some(false) => {
                    return Err(SchemaViolation::new(
                        &child_path(path, key),
                        "is not a recognised parameter",
                    ));
                }
                None => {}
            }
        }

        Ok(())
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "arguments"
    } else {
        path
    }
}

fn looks_like_email(text: &str) -> bool {
    text.split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn search_schema() -> Schema {
        serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "page": {"type": "integer", "minimum": 1, "maximum": 1000, "default": 1},
                "num_results": {"type": "integer", "minimum": 1, "maximum": 100},
                "language": {"type": "string", "enum": ["es", "en"], "default": "es"},
                "date_from": {"type": "string", "pattern": "^\\d{4}-\\d{2}-\\d{2}$"},
                "hotel_ids": {"type": "array", "items": {"type": "string"}, "maxItems": 2},
                "guest": {
                    "type": "object",
                    "properties": {
                        "email": {"type": "string", "format": "email"},
                        "adults": {"type": "integer", "minimum": 1}
                    },
                    "required": ["adults"],
                    "additionalProperties": false
                }
            },
            "required": ["num_results"],
            "additionalProperties": false
        }))
        .expect("schema parses")
    }

    fn violation(arguments: Value) -> SchemaViolation {
        search_schema()
            .validate_arguments(arguments)
            .expect_err("arguments must be rejected")
    }

    #[test]
    fn accepts_valid_arguments() {
        let arguments = search_schema()
            .validate_arguments(json!({
                "page": 2,
                "num_results": 5,
                "language": "en",
                "date_from": "2026-03-01",
                "hotel_ids": ["H1"],
                "guest": {"adults": 2, "email": "ana@example.com"}
            }))
            .expect("valid arguments");

        assert_eq!(arguments["num_results"], json!(5));
    }

    #[test]
    fn rejects_missing_required_field() {
        let error = violation(json!({"page": 1}));
        assert_eq!(error.path, "num_results");
        assert_eq!(error.message, "is required");
    }

    #[test]
    fn null_required_field_counts_as_missing() {
        let error = violation(json!({"num_results": null}));
        assert_eq!(error.path, "num_results");
    }

    #[test]
    fn null_optional_field_is_dropped() {
        let arguments = search_schema()
            .validate_arguments(json!({"num_results": 1, "page": null}))
            .expect("null optional is ignored");
        assert!(!arguments.contains_key("page"));
    }

    #[test]
    fn rejects_unknown_field() {
        let error = violation(json!({"num_results": 1, "pages": 3}));
        assert_eq!(error.path, "pages");
        assert!(error.message.contains("not a recognised"));
    }

    #[test]
    fn rejects_type_mismatch() {
        let error = violation(json!({"num_results": "five"}));
        assert_eq!(error.message, "expected integer, got string");
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        assert_eq!(violation(json!({"num_results": 1, "page": -1})).path, "page");
        assert_eq!(violation(json!({"num_results": 1000})).path, "num_results");
    }

    #[test]
    fn rejects_value_outside_enum() {
        let error = violation(json!({"num_results": 1, "language": "xx"}));
        assert!(error.message.starts_with("must be one of"));
    }

    #[test]
    fn rejects_pattern_mismatch() {
        let error = violation(json!({"num_results": 1, "date_from": "01/03/2026"}));
        assert_eq!(error.path, "date_from");
    }

    #[test]
    fn reports_nested_paths() {
        let error = violation(json!({"num_results": 1, "guest": {"email": "x@y.com"}}));
        assert_eq!(error.path, "guest.adults");

        let error = violation(json!({"num_results": 1, "hotel_ids": ["a", 7]}));
        assert_eq!(error.path, "hotel_ids[1]");

        let error = violation(json!({"num_results": 1, "hotel_ids": ["a", "b", "c"]}));
        assert!(error.message.contains("at most 2"));
    }

    #[test]
    fn rejects_non_object_arguments() {
        let error = violation(json!([1, 2]));
        assert_eq!(error.path, "arguments");
        assert!(error.message.contains("array"));
    }

    #[test]
    fn treats_missing_arguments_as_empty_object() {
        let schema: Schema = serde_json::from_value(json!({"type": "object"})).expect("schema");
        assert!(schema.validate_arguments(Value::Null).expect("empty").is_empty());
    }

    #[test]
    fn input_schema_always_lists_required() {
        let schema: Schema =
            serde_json::from_value(json!({"type": "object", "properties": {}})).expect("schema");
        assert_eq!(schema.to_input_schema()["required"], json!([]));
        assert_eq!(search_schema().to_input_schema()["required"], json!(["num_results"]));
    }

    #[test]
    fn finds_invalid_nested_pattern() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "properties": {"code": {"type": "string", "pattern": "(unclosed"}}
        }))
        .expect("schema");

        assert_eq!(schema.invalid_pattern().as_deref(), Some("(unclosed"));
        assert_eq!(search_schema().invalid_pattern(), None);
    }

    #[test]
    fn defaults_fill_only_absent_properties() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "page": {"type": "integer", "default": 1},
                "num_results": {"type": "integer", "default": 25},
                "language": {"type": "string", "default": "es"},
                "hotel_id": {"type": "string"}
            }
        }))
        .expect("schema");

        let mut arguments = schema
            .validate_arguments(json!({"num_results": 5}))
            .expect("valid");
        schema.apply_defaults(&mut arguments, Some("language"));

        assert_eq!(Value::Object(arguments), json!({"page": 1, "num_results": 5}));
    }
}
