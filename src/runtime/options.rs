//! Transform options and their layering.
//!
//! Every field is optional so that option sets can be shallow-merged: per-call
//! options override engine defaults field by field, and unset fields fall back
//! to the documented defaults through the accessor methods.
//!
//! Options can also be loaded from JSON or YAML (camelCase keys):
//!
//! ```rust
//! use docweave::TransformOptions;
//! use docweave::runtime::options::{ConflictStrategy, Mode};
//! let opts = TransformOptions::from_yaml_str("mode: strict\nmergeReturnValues: true\nconflictStrategy: first-wins\n").unwrap();
//! assert_eq!(opts.mode(), Mode::Strict);
//! assert!(opts.merge_return_values());
//! assert_eq!(opts.conflict_strategy(), ConflictStrategy::FirstWins);
//! assert!(opts.enable_cache());
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagnostics::{ErrorContext, TransformError};

pub const DEFAULT_ERROR_THRESHOLD: usize = 3;

// ============================================================================
// OPTION ENUMS
// ============================================================================

/// Error policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The first visitor or adapter failure aborts the transform.
    Strict,
    /// Failures are logged and the traversal continues.
    #[default]
    Loose,
}

/// Resolution of a key present in two merged results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    FirstWins,
    #[default]
    LastWins,
}

/// What happens when a visitor reaches the error threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdAction {
    #[default]
    Disable,
    /// Keep counting but never disable.
    Ignore,
}

/// Signature of a user-supplied merge function: `(key, earlier, later) -> merged`.
pub type MergeFn = dyn Fn(&str, &Value, &Value) -> Value + Send + Sync;

/// Shared handle to a custom merge function.
#[derive(Clone)]
pub struct CustomMergeFn(pub Arc<MergeFn>);

impl CustomMergeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &Value, &Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, key: &str, earlier: &Value, later: &Value) -> Value {
        (self.0)(key, earlier, later)
    }
}

impl fmt::Debug for CustomMergeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomMergeFn(..)")
    }
}

// ============================================================================
// TRANSFORM OPTIONS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TransformOptions {
    /// Output adapter key.
    pub format: Option<String>,
    pub mode: Option<Mode>,
    /// Initial context variables.
    pub variables: Option<Map<String, Value>>,
    pub enable_cache: Option<bool>,
    pub merge_return_values: Option<bool>,
    pub deep_merge: Option<bool>,
    pub merge_arrays: Option<bool>,
    pub conflict_strategy: Option<ConflictStrategy>,
    #[serde(skip)]
    pub custom_merge_fn: Option<CustomMergeFn>,
    pub error_threshold: Option<usize>,
    pub threshold_exceeded_action: Option<ThresholdAction>,
    /// Maximum tree depth; unlimited when unset.
    pub max_depth: Option<usize>,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow merge: every field set on `self` wins over `defaults`.
    pub fn merged_over(&self, defaults: &TransformOptions) -> TransformOptions {
        TransformOptions {
            format: self.format.clone().or_else(|| defaults.format.clone()),
            mode: self.mode.or(defaults.mode),
            variables: self
                .variables
                .clone()
                .or_else(|| defaults.variables.clone()),
            enable_cache: self.enable_cache.or(defaults.enable_cache),
            merge_return_values: self.merge_return_values.or(defaults.merge_return_values),
            deep_merge: self.deep_merge.or(defaults.deep_merge),
            merge_arrays: self.merge_arrays.or(defaults.merge_arrays),
            conflict_strategy: self.conflict_strategy.or(defaults.conflict_strategy),
            custom_merge_fn: self
                .custom_merge_fn
                .clone()
                .or_else(|| defaults.custom_merge_fn.clone()),
            error_threshold: self.error_threshold.or(defaults.error_threshold),
            threshold_exceeded_action: self
                .threshold_exceeded_action
                .or(defaults.threshold_exceeded_action),
            max_depth: self.max_depth.or(defaults.max_depth),
        }
    }

    // ------------------------------------------------------------------------
    // Effective values
    // ------------------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }

    pub fn is_strict(&self) -> bool {
        self.mode() == Mode::Strict
    }

    pub fn enable_cache(&self) -> bool {
        self.enable_cache.unwrap_or(true)
    }

    pub fn merge_return_values(&self) -> bool {
        self.merge_return_values.unwrap_or(false)
    }

    pub fn deep_merge(&self) -> bool {
        self.deep_merge.unwrap_or(true)
    }

    pub fn merge_arrays(&self) -> bool {
        self.merge_arrays.unwrap_or(false)
    }

    pub fn conflict_strategy(&self) -> ConflictStrategy {
        self.conflict_strategy.unwrap_or_default()
    }

    pub fn error_threshold(&self) -> usize {
        self.error_threshold.unwrap_or(DEFAULT_ERROR_THRESHOLD)
    }

    pub fn threshold_exceeded_action(&self) -> ThresholdAction {
        self.threshold_exceeded_action.unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Builder-style setters
    // ------------------------------------------------------------------------

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn strict(self) -> Self {
        self.with_mode(Mode::Strict)
    }

    pub fn loose(self) -> Self {
        self.with_mode(Mode::Loose)
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = Some(enabled);
        self
    }

    pub fn with_merge(mut self, enabled: bool) -> Self {
        self.merge_return_values = Some(enabled);
        self
    }

    pub fn with_deep_merge(mut self, enabled: bool) -> Self {
        self.deep_merge = Some(enabled);
        self
    }

    pub fn with_merge_arrays(mut self, enabled: bool) -> Self {
        self.merge_arrays = Some(enabled);
        self
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = Some(strategy);
        self
    }

    pub fn with_custom_merge_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value, &Value) -> Value + Send + Sync + 'static,
    {
        self.custom_merge_fn = Some(CustomMergeFn::new(f));
        self
    }

    pub fn with_error_threshold(mut self, threshold: usize) -> Self {
        self.error_threshold = Some(threshold);
        self
    }

    pub fn with_threshold_action(mut self, action: ThresholdAction) -> Self {
        self.threshold_exceeded_action = Some(action);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    pub fn from_json_str(json: &str) -> Result<Self, TransformError> {
        let opts: TransformOptions = serde_json::from_str(json).map_err(|e| {
            config_error(format!("invalid JSON transform options: {}", e), Box::new(e))
        })?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, TransformError> {
        let opts: TransformOptions = serde_yaml::from_str(yaml).map_err(|e| {
            config_error(format!("invalid YAML transform options: {}", e), Box::new(e))
        })?;
        opts.validate()?;
        Ok(opts)
    }

    /// Rejects values that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.error_threshold == Some(0) {
            return Err(TransformError::Configuration {
                message: "errorThreshold must be at least 1".to_string(),
                ctx: ErrorContext::with_help("use 1 to disable a visitor on its first failure"),
                source: None,
            });
        }
        if self.max_depth == Some(0) {
            return Err(crate::err_msg!(
                Configuration,
                "maxDepth must be at least 1 (the document itself is depth 1)"
            ));
        }
        Ok(())
    }
}

fn config_error(message: String, source: crate::diagnostics::BoxError) -> TransformError {
    TransformError::Configuration {
        message,
        ctx: ErrorContext::none(),
        source: Some(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let opts = TransformOptions::default();
        assert_eq!(opts.mode(), Mode::Loose);
        assert!(opts.enable_cache());
        assert!(!opts.merge_return_values());
        assert!(opts.deep_merge());
        assert!(!opts.merge_arrays());
        assert_eq!(opts.conflict_strategy(), ConflictStrategy::LastWins);
        assert_eq!(opts.error_threshold(), 3);
        assert_eq!(opts.threshold_exceeded_action(), ThresholdAction::Disable);
    }

    #[test]
    fn test_call_options_win_over_defaults() {
        let defaults = TransformOptions::new()
            .strict()
            .with_format("json")
            .with_error_threshold(5);
        let call = TransformOptions::new().loose().with_cache(false);
        let merged = call.merged_over(&defaults);
        assert_eq!(merged.mode(), Mode::Loose);
        assert_eq!(merged.format.as_deref(), Some("json"));
        assert_eq!(merged.error_threshold(), 5);
        assert!(!merged.enable_cache());
    }

    #[test]
    fn test_variables_are_replaced_not_merged() {
        let defaults = TransformOptions::new().with_variable("a", 1);
        let call = TransformOptions::new().with_variable("b", 2);
        let merged = call.merged_over(&defaults);
        let vars = merged.variables.unwrap();
        assert_eq!(vars.get("b"), Some(&json!(2)));
        assert!(vars.get("a").is_none());
    }

    #[test]
    fn test_json_loading_and_validation() {
        let opts = TransformOptions::from_json_str(
            r#"{"mode":"strict","variables":{"lang":"en"},"mergeArrays":true}"#,
        )
        .unwrap();
        assert!(opts.is_strict());
        assert!(opts.merge_arrays());
        assert_eq!(opts.variables.unwrap()["lang"], "en");

        let err = TransformOptions::from_json_str(r#"{"errorThreshold":0}"#).unwrap_err();
        assert!(matches!(err, TransformError::Configuration { .. }));

        let err = TransformOptions::from_json_str(r#"{"mode":"lenient"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid JSON transform options"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(TransformOptions::from_yaml_str("enableCahce: false\n").is_err());
    }
}
