//! Structural checks of tool parameters against a tool's JSON schema.
//!
//! Covers the subset tool schemas use in practice: object roots, `required`,
//! per-property `type` and `enum`. Other keywords are ignored.

use serde_json::Value;

pub fn validate_parameters(schema: &Value, params: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !params.is_object() {
        return Err(format!("expected an object, got {}", type_name(params)));
    }

    let Some(object) = params.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(format!("missing required parameter '{key}'"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in object {
        let Some(property) = properties.get(key) else {
            continue;
        };

        if let Some(expected) = property.get("type")
            && !matches_type(expected, value)
        {
            return Err(format!(
                "parameter '{key}' should be {}, got {}",
                describe_type(expected),
                type_name(value)
            ));
        }

        if let Some(allowed) = property.get("enum").and_then(Value::as_array)
            && !allowed.contains(value)
        {
            return Err(format!("parameter '{key}' must be one of {}", Value::Array(allowed.clone())));
        }
    }

    Ok(())
}

fn matches_type(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(name) => matches_named_type(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| matches_named_type(name, value)),
        _ => true,
    }
}

fn matches_named_type(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
