//! Merging of multiple visitor results for one node.
//!
//! Results are folded pairwise, left to right, in dispatch order. For a key
//! present in both operands the rules apply in this order:
//!
//! 1. a custom merge function, if configured, decides;
//! 2. two arrays concatenate when `merge_arrays` is set;
//! 3. two objects merge recursively when `deep_merge` is set;
//! 4. otherwise the conflict strategy picks one side.
//!
//! If either operand is not an object the later operand replaces the earlier.

use serde_json::{Map, Value};

use crate::runtime::options::{ConflictStrategy, CustomMergeFn, TransformOptions};

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub deep: bool,
    pub arrays: bool,
    pub strategy: ConflictStrategy,
    pub custom: Option<CustomMergeFn>,
}

impl MergeOptions {
    pub fn from_options(options: &TransformOptions) -> Self {
        Self {
            deep: options.deep_merge(),
            arrays: options.merge_arrays(),
            strategy: options.conflict_strategy(),
            custom: options.custom_merge_fn.clone(),
        }
    }
}

/// Folds `results` into one value. Returns `None` for an empty list.
///
/// # Examples
///
/// ```rust
/// use docweave::engine::merge::{merge_results, MergeOptions};
/// use serde_json::json;
/// let opts = MergeOptions { deep: true, arrays: true, ..Default::default() };
/// let merged = merge_results(vec![json!({"a": 1, "b": [1]}), json!({"a": 2, "b": [2]})], &opts);
/// assert_eq!(merged, Some(json!({"a": 2, "b": [1, 2]})));
/// ```
pub fn merge_results(results: Vec<Value>, options: &MergeOptions) -> Option<Value> {
    results
        .into_iter()
        .reduce(|earlier, later| merge_pair(earlier, later, options))
}

pub fn merge_pair(earlier: Value, later: Value, options: &MergeOptions) -> Value {
    match (earlier, later) {
        (Value::Object(a), Value::Object(b)) => Value::Object(merge_objects(a, b, options)),
        (_, later) => later,
    }
}

fn merge_objects(
    mut earlier: Map<String, Value>,
    later: Map<String, Value>,
    options: &MergeOptions,
) -> Map<String, Value> {
    for (key, incoming) in later {
        let merged = match earlier.remove(&key) {
            None => incoming,
            Some(existing) => merge_key(&key, existing, incoming, options),
        };
        earlier.insert(key, merged);
    }
    earlier
}

fn merge_key(key: &str, existing: Value, incoming: Value, options: &MergeOptions) -> Value {
    if let Some(custom) = &options.custom {
        return custom.call(key, &existing, &incoming);
    }
    match (existing, incoming) {
        (Value::Array(mut a), Value::Array(b)) if options.arrays => {
            a.extend(b);
            Value::Array(a)
        }
        (Value::Object(a), Value::Object(b)) if options.deep => {
            Value::Object(merge_objects(a, b, options))
        }
        (existing, incoming) => match options.strategy {
            ConflictStrategy::FirstWins => existing,
            ConflictStrategy::LastWins => incoming,
        },
    }
}

#[cfg(test)]
mod merge_tests {
    use super::*;
    use serde_json::json;

    fn opts() -> MergeOptions {
        MergeOptions {
            deep: true,
            arrays: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_wins_keeps_earlier_scalars() {
        let o = MergeOptions {
            strategy: ConflictStrategy::FirstWins,
            ..opts()
        };
        let merged = merge_results(vec![json!({"a": 1, "b": [1]}), json!({"a": 2, "b": [2]})], &o);
        assert_eq!(merged, Some(json!({"a": 1, "b": [1, 2]})));
    }

    #[test]
    fn test_deep_merge_recurses() {
        let merged = merge_pair(
            json!({"meta": {"x": 1, "y": 1}}),
            json!({"meta": {"y": 2, "z": 3}}),
            &opts(),
        );
        assert_eq!(merged, json!({"meta": {"x": 1, "y": 2, "z": 3}}));

        let shallow = MergeOptions { deep: false, ..opts() };
        let merged = merge_pair(json!({"meta": {"x": 1}}), json!({"meta": {"y": 2}}), &shallow);
        assert_eq!(merged, json!({"meta": {"y": 2}}));
    }

    #[test]
    fn test_arrays_replace_without_merge_arrays() {
        let o = MergeOptions { arrays: false, ..opts() };
        assert_eq!(merge_pair(json!({"b": [1]}), json!({"b": [2]}), &o), json!({"b": [2]}));
    }

    #[test]
    fn test_non_object_later_operand_wins() {
        assert_eq!(merge_pair(json!({"a": 1}), json!("s"), &opts()), json!("s"));
        assert_eq!(merge_pair(json!(1), json!({"a": 1}), &opts()), json!({"a": 1}));
        assert_eq!(merge_results(vec![], &opts()), None);
        assert_eq!(merge_results(vec![json!(3)], &opts()), Some(json!(3)));
    }

    #[test]
    fn test_custom_merge_fn_takes_precedence() {
        let o = MergeOptions {
            custom: Some(CustomMergeFn::new(|key, a, b| {
                json!(format!("{}:{}+{}", key, a, b))
            })),
            ..opts()
        };
        let merged = merge_pair(json!({"n": 1, "only": true}), json!({"n": 2}), &o);
        assert_eq!(merged, json!({"n": "n:1+2", "only": true}));
    }
}
