//! Helpers over [`serde_json::Value`], the result type every visitor produces.
//!
//! A visitor result is "nothing" when it is `None` or `Value::Null`; an
//! "object" is a `Value::Object`. Merge and child attachment only ever act on
//! objects.

use serde_json::{Number, Value};

/// Collapses `Some(Value::Null)` into `None`.
pub fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

/// Renders a scalar without JSON quoting; compound values fall back to JSON.
///
/// # Examples
///
/// ```rust
/// use docweave::ast::value::display_string;
/// assert_eq!(display_string(&serde_json::json!("a")), "a");
/// assert_eq!(display_string(&serde_json::json!(2)), "2");
/// ```
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Parses a string as a JSON number, preferring integers.
///
/// # Examples
///
/// ```rust
/// use docweave::ast::value::coerce_number;
/// assert_eq!(coerce_number("42"), Some(serde_json::json!(42)));
/// assert_eq!(coerce_number(" 1.5 "), Some(serde_json::json!(1.5)));
/// assert_eq!(coerce_number("wide"), None);
/// ```
pub fn coerce_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Interprets the usual markup spellings of a boolean attribute.
///
/// An empty string counts as `true` (bare attribute such as `<input disabled>`).
pub fn coerce_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_null_filters_null() {
        assert_eq!(non_null(Some(Value::Null)), None);
        assert_eq!(non_null(Some(json!(0))), Some(json!(0)));
        assert_eq!(non_null(None), None);
    }

    #[test]
    fn test_coerce_bool_spellings() {
        assert_eq!(coerce_bool("TRUE"), Some(true));
        assert_eq!(coerce_bool(""), Some(true));
        assert_eq!(coerce_bool("off"), Some(false));
        assert_eq!(coerce_bool("maybe"), None);
    }

    #[test]
    fn test_display_string_compound_values() {
        assert_eq!(display_string(&json!([1, 2])), "[1,2]");
        assert_eq!(display_string(&Value::Null), "");
    }
}
