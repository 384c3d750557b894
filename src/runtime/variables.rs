//! `${a.b.c}` interpolation over context variables.
//!
//! Placeholders name a dotted path: the first segment is a variable, the rest
//! walk nested objects (or array indices). Unresolvable placeholders are left
//! untouched so a later stage can still see them.

use im::HashMap as ImHashMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::ast::value::display_string;

/// Persistent variable map carried by contexts; later bindings shadow earlier.
pub type Variables = ImHashMap<String, Value>;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_\-]*(?:\.[A-Za-z0-9_\-]+)*)\s*\}")
        .expect("placeholder pattern is valid")
});

/// Looks up a dotted path such as `site.author.name`.
pub fn lookup<'a>(variables: &'a Variables, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = variables.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Returns true if the text contains at least one placeholder.
pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

/// Replaces every resolvable `${...}` placeholder in `text`.
///
/// # Examples
///
/// ```rust
/// use docweave::runtime::variables::{resolve_variables, Variables};
/// let mut vars = Variables::new();
/// vars.insert("site".to_string(), serde_json::json!({"name": "Docs"}));
/// assert_eq!(resolve_variables("Welcome to ${site.name}", &vars), "Welcome to Docs");
/// assert_eq!(resolve_variables("${missing}", &vars), "${missing}");
/// ```
pub fn resolve_variables(text: &str, variables: &Variables) -> String {
    if !has_placeholders(text) {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match lookup(variables, &caps[1]) {
            Some(value) => display_string(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Interpolates every string inside a JSON value.
///
/// A string consisting of exactly one placeholder is replaced by the variable's
/// value itself, keeping its JSON type.
pub fn resolve_value(value: &Value, variables: &Variables) -> Value {
    match value {
        Value::String(s) => {
            if let Some(caps) = PLACEHOLDER.captures(s) {
                if caps[0].len() == s.len() {
                    if let Some(found) = lookup(variables, &caps[1]) {
                        return found.clone();
                    }
                }
            }
            Value::String(resolve_variables(s, variables))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, variables)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}
