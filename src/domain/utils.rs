//! Shared conversions for tool arguments and remote payloads

use chrono::{Days, NaiveDate, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::catalog::schema::{Schema, SchemaType};

pub const SNIPPET_LIMIT: usize = 200;

/// `hotel_room_ids` -> `HotelRoomIds`. Keys without underscores keep their inner casing.
pub fn pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Truncates remote text for error messages.
pub fn snippet(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }

    let mut cut = trimmed.chars().take(limit).collect::<String>();
    cut.push_str("...");
    cut
}

/// Arguments made of schema defaults plus placeholders for required fields
/// without one. Used by the endpoint tester and the registry health check.
pub fn sample_arguments(schema: &Schema) -> Map<String, Value> {
    sample_arguments_on(schema, Utc::now().date_naive())
}

pub fn sample_arguments_on(schema: &Schema, today: NaiveDate) -> Map<String, Value> {
    let mut arguments = Map::new();
    for (name, property) in &schema.properties {
        if let Some(default) = &property.default {
            arguments.insert(name.clone(), default.clone());
        } else if schema.is_required(name) {
            arguments.insert(name.clone(), sample_value(property, today));
        }
    }
    arguments
}

fn sample_value(schema: &Schema, today: NaiveDate) -> Value {
    if let Some(default) = &schema.default {
        return default.clone();
    }
    if let Some(first) = schema.allowed.as_ref().and_then(|allowed| allowed.first()) {
        return first.clone();
    }

    match schema.kind {
        Some(SchemaType::String) | None => Value::String(sample_string(schema, today)),
        Some(SchemaType::Integer) => schema
            .minimum
            .as_ref()
            .and_then(|min| min.as_f64())
            .map(|min| json!(min.ceil().max(1.0) as i64))
            .unwrap_or_else(|| json!(1)),
        Some(SchemaType::Number) => schema
            .minimum
            .as_ref()
            .and_then(|min| min.as_f64())
            .map(|min| json!(min.max(1.0)))
            .unwrap_or_else(|| json!(1.0)),
        Some(SchemaType::Boolean) => Value::Bool(false),
        Some(SchemaType::Array) => {
            let count = schema.min_items.unwrap_or(0);
            let item = schema
                .items
                .as_deref()
                .map(|items| sample_value(items, today))
                .unwrap_or_else(|| Value::String("sample".to_string()));
            Value::Array(vec![item; count])
        }
        Some(SchemaType::Object) => Value::Object(sample_arguments_on(schema, today)),
    }
}

fn sample_string(schema: &Schema, today: NaiveDate) -> String {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let date = tomorrow.format("%Y-%m-%d").to_string();

    let candidates: Vec<String> = match (schema.format.as_deref(), schema.pattern.as_deref()) {
        (Some("email"), _) => vec!["test@example.com".to_string()],
        (Some("date"), _) => vec![date],
        (Some("date-time"), _) => vec![format!("{date}T12:00:00")],
        (_, Some(_)) => vec![
            date.clone(),
            format!("{date}T12:00:00"),
            "ES".to_string(),
            "EUR".to_string(),
        ],
        _ => vec!["sample".to_string()],
    };

    let matches_pattern = |candidate: &String| match schema.pattern.as_deref() {
        Some(pattern) => Regex::new(pattern).is_ok_and(|regex| regex.is_match(candidate)),
        None => true,
    };
    let fits_length = |candidate: &String| {
        let length = candidate.chars().count();
        schema.min_length.map_or(true, |min| length >= min)
            && schema.max_length.map_or(true, |max| length <= max)
    };

    candidates
        .into_iter()
        .find(|candidate| matches_pattern(candidate) && fits_length(candidate))
        .unwrap_or_else(|| "x".repeat(schema.min_length.unwrap_or(1).max(1)))
}

/// Copy of `value` with sensitive keys replaced, for audit logs.
pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "cvv" | "cvc" | "card_number"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
