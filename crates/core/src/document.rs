//! Dynamic document values and structural schema validation.
//!
//! `options` is intentionally tenant-defined, so it stays a
//! `serde_json::Value` rather than a fixed static type. The schema language
//! is a small structural subset: `type`, `properties`, `required`, `items`,
//! `enum`, `minimum`, `maximum`.

use serde_json::Value;

use crate::error::{DomainError, DomainResult};

/// Merge `patch` into `base`, key-wise and recursively for objects.
///
/// A `null` in `patch` deletes the key. Non-object values replace.
pub fn merge(base: &mut Value, patch: &Value) {
    if let (Value::Object(b), Value::Object(p)) = (&mut *base, patch) {
        for (key, value) in p {
            if value.is_null() {
                b.remove(key);
                continue;
            }
            match b.get_mut(key) {
                Some(slot) => merge(slot, value),
                None => {
                    b.insert(key.clone(), value.clone());
                }
            }
        }
    } else {
        *base = patch.clone();
    }
}

/// Fold option documents in application order (earliest first), then the
/// caller's patch. Used by the definition factories: ancestor templates
/// root-first, the definition itself, then caller overrides.
pub fn fold_options<'a>(
    chain: impl Iterator<Item = Option<&'a Value>>,
    patch: Option<&'a Value>,
) -> Option<Value> {
    let mut folded: Option<Value> = None;
    for options in chain.flatten().chain(patch) {
        match folded.as_mut() {
            Some(base) => merge(base, options),
            None => folded = Some(options.clone()),
        }
    }
    folded
}

/// Validate `options` against `schema` when both are present.
///
/// Called at save time for every entity; a violation blocks the save.
pub fn validate_against(options: Option<&Value>, schema: Option<&Value>) -> DomainResult<()> {
    let (Some(options), Some(schema)) = (options, schema) else {
        return Ok(());
    };

    let mut violations = Vec::new();
    check(options, schema, "$", &mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DomainError::SchemaViolation { violations })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        // Integers satisfy "number".
        "number" => matches!(value, Value::Number(_)),
        other => type_name(value) == other,
    }
}

fn check(value: &Value, schema: &Value, path: &str, violations: &mut Vec<String>) {
    let Value::Object(rules) = schema else {
        return;
    };

    if let Some(Value::String(expected)) = rules.get("type") {
        if !type_matches(value, expected) {
            violations.push(format!(
                "{path}: expected {expected}, got {}",
                type_name(value)
            ));
            return;
        }
    }

    if let Some(Value::Array(allowed)) = rules.get("enum") {
        if !allowed.contains(value) {
            violations.push(format!("{path}: value not in enum"));
        }
    }

    if let Value::Number(n) = value {
        if let (Some(v), Some(min)) = (n.as_f64(), rules.get("minimum").and_then(Value::as_f64)) {
            if v < min {
                violations.push(format!("{path}: {v} below minimum {min}"));
            }
        }
        if let (Some(v), Some(max)) = (n.as_f64(), rules.get("maximum").and_then(Value::as_f64)) {
            if v > max {
                violations.push(format!("{path}: {v} above maximum {max}"));
            }
        }
    }

    if let Value::Object(fields) = value {
        if let Some(Value::Array(required)) = rules.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(name) {
                    violations.push(format!("{path}: missing required key '{name}'"));
                }
            }
        }
        if let Some(Value::Object(properties)) = rules.get("properties") {
            for (name, subschema) in properties {
                if let Some(field) = fields.get(name) {
                    check(field, subschema, &format!("{path}.{name}"), violations);
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, rules.get("items")) {
        for (idx, item) in items.iter().enumerate() {
            check(item, item_schema, &format!("{path}[{idx}]"), violations);
        }
    }
}
