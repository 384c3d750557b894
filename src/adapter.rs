//! Output adapters.
//!
//! An adapter runs exactly once per transform, on the fully merged result, and
//! turns it into the caller's output shape. Closures with the right signature
//! are adapters:
//!
//! ```rust
//! use docweave::runtime::context::TransformContext;
//! use docweave::{BoxError, TransformEngine};
//! use serde_json::{json, Value};
//! let mut engine = TransformEngine::new();
//! engine.set_output_adapter(|result: Value, _ctx: &TransformContext| -> Result<Value, BoxError> {
//!     Ok(json!({ "wrapped": result }))
//! });
//! ```

use serde_json::Value;

use crate::diagnostics::BoxError;
use crate::runtime::context::TransformContext;

pub trait OutputAdapter: Send + Sync {
    fn adapt(&self, result: Value, context: &TransformContext) -> Result<Value, BoxError>;
}

impl<F> OutputAdapter for F
where
    F: Fn(Value, &TransformContext) -> Result<Value, BoxError> + Send + Sync,
{
    fn adapt(&self, result: Value, context: &TransformContext) -> Result<Value, BoxError> {
        self(result, context)
    }
}

/// Returns the result unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAdapter;

impl OutputAdapter for IdentityAdapter {
    fn adapt(&self, result: Value, _context: &TransformContext) -> Result<Value, BoxError> {
        Ok(result)
    }
}

/// Renders the result as a JSON string value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStringAdapter {
    pub pretty: bool,
}

impl OutputAdapter for JsonStringAdapter {
    fn adapt(&self, result: Value, _context: &TransformContext) -> Result<Value, BoxError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        Ok(Value::String(text))
    }
}
