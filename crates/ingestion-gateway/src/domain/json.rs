//! Defensive accessors over untrusted JSON objects.
//!
//! None of these fail: a missing key and a value of the wrong type look the
//! same to the caller.

use serde_json::{Map, Number, Value};

/// Floats at or above this magnitude keep their exponent form.
const INTEGRAL_FLOAT_LIMIT: f64 = 1e15;

/// The value at `key` if it is a JSON string.
pub fn optional_string<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Like [`optional_string`] but treats `""` as absent.
pub fn non_empty_string<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    optional_string(map, key).filter(|s| !s.is_empty())
}

/// The value at `key` if it is a JSON object.
pub fn optional_object<'a>(
    map: &'a Map<String, Value>,
    key: &str,
) -> Option<&'a Map<String, Value>> {
    map.get(key).and_then(Value::as_object)
}

/// Render any JSON value as an identifier string.
///
/// - string: itself
/// - integer: decimal digits
/// - float: shortest form; integral floats drop the fraction (`42.0` -> `42`)
/// - bool: `true` / `false`
/// - null or absent: empty string
/// - array / object: compact JSON
pub fn stringify_any(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => stringify_number(n),
        Some(other) => other.to_string(),
    }
}

fn stringify_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < INTEGRAL_FLOAT_LIMIT => {
            format!("{:.0}", f)
        }
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// The value as an integer if it is a whole number.
pub fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < INTEGRAL_FLOAT_LIMIT)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}
