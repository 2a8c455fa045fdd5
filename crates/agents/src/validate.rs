//! Argument validation against a tool's declared parameter schema.
//!
//! Checks the subset of JSON schema the tool declarations actually use:
//! required keys and primitive types. Unknown extra keys are tolerated so
//! a chatty model can still land a call. Type tags are matched
//! case-insensitively ("STRING" and "string" both appear in the wild).

use serde_json::Value;

/// Validate `arguments` against `schema`. Returns the human-readable
/// reason on failure; the caller turns it into a failure observation.
pub fn validate_arguments(arguments: &Value, schema: &Value) -> Result<(), String> {
    let Some(args) = arguments.as_object() else {
        return Err("arguments must be a JSON object".into());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            match args.get(key) {
                None | Some(Value::Null) => {
                    return Err(format!("missing required parameter: {key}"));
                },
                Some(Value::String(s)) if s.trim().is_empty() => {
                    return Err(format!("required parameter is empty: {key}"));
                },
                Some(_) => {},
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in args {
        let Some(declared) = properties.get(key) else {
            continue;
        };
        let Some(expected) = declared.get("type").and_then(Value::as_str) else {
            continue;
        };
        if !type_matches(value, expected) {
            return Err(format!(
                "parameter '{key}' should be {}, got {}",
                expected.to_ascii_lowercase(),
                json_type_name(value)
            ));
        }
    }

    Ok(())
}

fn type_matches(value: &Value, expected: &str) -> bool {
    if value.is_null() {
        // Null optionals are treated as absent.
        return true;
    }
    match expected.to_ascii_lowercase().as_str() {
        "string" => value.is_string(),
        "number" | "integer" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
