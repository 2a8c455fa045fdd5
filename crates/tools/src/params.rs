//! Shared helpers for extracting typed parameters from `serde_json::Value`.
//!
//! These reduce boilerplate in `AgentTool::execute` implementations that
//! manually pull fields from a JSON object.

use serde_json::Value;

use crate::Error;

/// Extract a trimmed, non-empty `&str` from a JSON object field.
///
/// Returns `None` when the key is absent, null, not a string, empty,
/// or whitespace-only.
pub fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Like [`str_param`] but returns a `crate::Error` when missing.
pub fn require_str<'a>(params: &'a Value, key: &str) -> crate::Result<&'a str> {
    str_param(params, key)
        .ok_or_else(|| Error::message(format!("missing required parameter: {key}")))
}

/// Extract a boolean, defaulting to `default` when absent.
pub fn bool_param(params: &Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Extract a `u64`, defaulting to `default` when absent. Accepts numeric
/// strings because models frequently quote numbers.
pub fn u64_param(params: &Value, key: &str, default: u64) -> u64 {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Extract an `f64`, defaulting to `default` when absent.
pub fn f64_param(params: &Value, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}
