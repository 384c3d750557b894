//! # Transform Engine
//!
//! The engine owns everything that outlives a single transform: the visitor
//! registry (with its circuit breaker), the result cache, the output adapters,
//! the persisted default options and the log of loose-mode failures.
//!
//! ## Pipeline
//!
//! ```text
//! options.merged_over(defaults) -> cache probe -> root context
//!     -> dispatch(document) -> recursive dispatch(children) -> merge
//!     -> cache store -> output adapter
//! ```
//!
//! ## Usage
//! ```rust
//! use docweave::ast::builder::{document, element, text};
//! use docweave::visitor::FnVisitor;
//! use docweave::TransformEngine;
//! use serde_json::json;
//!
//! let mut engine = TransformEngine::new();
//! engine.register_visitor(
//!     FnVisitor::new("text").on_content(|c, _ctx| Ok(Some(json!({ "text": c.value })))),
//! );
//! let doc = document().child(element("p").child(text("hi"))).build();
//! let out = engine.transform(&doc).unwrap();
//! assert_eq!(out["children"][0]["children"][0]["text"], "hi");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::adapter::OutputAdapter;
use crate::ast::{Document, NodeRef};
use crate::diagnostics::{adapter_error, format_error, ErrorRecord, ErrorRecordKind, TransformError};
use crate::runtime::cache::TransformCache;
use crate::runtime::context::{create_root_context, TransformContext};
use crate::runtime::mode::ModeConfig;
use crate::runtime::options::TransformOptions;
use crate::runtime::registry::VisitorManager;
use crate::visitor::Visitor;

pub mod dispatch;
mod dispatch_async;
pub mod merge;

use dispatch::Traversal;

pub struct TransformEngine {
    defaults: TransformOptions,
    visitors: VisitorManager,
    cache: TransformCache,
    adapter: Option<Arc<dyn OutputAdapter>>,
    adapters: HashMap<String, Arc<dyn OutputAdapter>>,
    error_log: Mutex<Vec<ErrorRecord>>,
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("defaults", &self.defaults)
            .field("visitors", &self.visitors)
            .field("cached", &self.cache.len())
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CONSTRUCTION AND CONFIGURATION
// ============================================================================

impl TransformEngine {
    pub fn new() -> Self {
        Self::with_options(TransformOptions::default())
    }

    /// Engine whose persisted defaults are `defaults`.
    pub fn with_options(defaults: TransformOptions) -> Self {
        Self {
            defaults,
            visitors: VisitorManager::new(),
            cache: TransformCache::new(),
            adapter: None,
            adapters: HashMap::new(),
            error_log: Mutex::new(Vec::new()),
        }
    }

    /// Engine with the built-in visitor set registered.
    pub fn with_builtin_visitors() -> Self {
        let mut engine = Self::new();
        crate::visitors::register_builtin_visitors(&mut engine);
        engine
    }

    /// Shallow-merges `options` into the persisted defaults.
    pub fn configure(&mut self, options: TransformOptions) -> Result<(), TransformError> {
        options.validate()?;
        self.defaults = options.merged_over(&self.defaults);
        Ok(())
    }

    pub fn defaults(&self) -> &TransformOptions {
        &self.defaults
    }

    // ------------------------------------------------------------------------
    // Visitors
    // ------------------------------------------------------------------------

    pub fn register_visitor(&mut self, visitor: impl Visitor + 'static) {
        self.visitors.register_visitor(visitor);
    }

    pub fn register_shared_visitor(&mut self, visitor: Arc<dyn Visitor>) {
        self.visitors.register_shared(visitor);
    }

    pub fn unregister_visitor(&mut self, name: &str) -> bool {
        self.visitors.unregister_visitor(name)
    }

    /// Excludes a visitor from dispatch without unregistering it.
    pub fn disable_visitor_by_name(&self, name: &str) -> bool {
        let changed = self.visitors.disable_visitor(name);
        if changed {
            tracing::info!(visitor = name, "visitor disabled");
        }
        changed
    }

    /// Re-enables a visitor and clears its error count.
    pub fn enable_visitor_by_name(&self, name: &str) -> bool {
        let changed = self.visitors.enable_visitor(name);
        if changed {
            tracing::info!(visitor = name, "visitor re-enabled");
        }
        changed
    }

    pub fn visitors(&self) -> &VisitorManager {
        &self.visitors
    }

    // ------------------------------------------------------------------------
    // Adapters
    // ------------------------------------------------------------------------

    /// Adapter used when no format-specific adapter matches.
    pub fn set_output_adapter(&mut self, adapter: impl OutputAdapter + 'static) {
        self.adapter = Some(Arc::new(adapter));
    }

    /// Adapter selected when `options.format` equals `format`.
    pub fn register_output_adapter(
        &mut self,
        format: impl Into<String>,
        adapter: impl OutputAdapter + 'static,
    ) {
        self.adapters.insert(format.into(), Arc::new(adapter));
    }

    // ------------------------------------------------------------------------
    // Cache and error log
    // ------------------------------------------------------------------------

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Snapshot of the loose-mode failures recorded so far.
    pub fn error_log(&self) -> Vec<ErrorRecord> {
        self.error_log.lock().clone()
    }

    /// Drains the failure log.
    pub fn take_error_log(&self) -> Vec<ErrorRecord> {
        std::mem::take(&mut *self.error_log.lock())
    }

    pub(crate) fn record_error(&self, record: ErrorRecord) {
        self.error_log.lock().push(record);
    }
}

// ============================================================================
// TRANSFORM
// ============================================================================

/// Per-call state shared by the sync and async entry points.
struct Prepared {
    options: TransformOptions,
    cache_key: Option<(String, String)>,
}

impl TransformEngine {
    /// Transforms `document` with the persisted defaults.
    pub fn transform(&self, document: &Document) -> Result<Value, TransformError> {
        self.transform_with(document, &TransformOptions::default())
    }

    /// Transforms `document` with `options` layered over the defaults.
    pub fn transform_with(
        &self,
        document: &Document,
        options: &TransformOptions,
    ) -> Result<Value, TransformError> {
        let prepared = self.prepare(document, options)?;
        if let Some(hit) = self.probe(&prepared) {
            let root = self.root_context(document, &prepared.options);
            return self.finish(hit, &root, &prepared.options);
        }

        let root = self.root_context(document, &prepared.options);
        let traversal = Traversal::new(self, &prepared.options);
        let result = traversal
            .visit(NodeRef::Document(document), 0, &root)?
            .unwrap_or(Value::Null);
        self.store(prepared.cache_key, &result);
        self.finish(result, &root, &prepared.options)
    }

    pub async fn transform_async(&self, document: &Document) -> Result<Value, TransformError> {
        self.transform_async_with(document, &TransformOptions::default())
            .await
    }

    /// Asynchronous mirror of [`TransformEngine::transform_with`].
    pub async fn transform_async_with(
        &self,
        document: &Document,
        options: &TransformOptions,
    ) -> Result<Value, TransformError> {
        let prepared = self.prepare(document, options)?;
        if let Some(hit) = self.probe(&prepared) {
            let root = self.root_context(document, &prepared.options);
            return self.finish(hit, &root, &prepared.options);
        }

        let root = self.root_context(document, &prepared.options);
        let traversal = Traversal::new(self, &prepared.options);
        let result = traversal
            .visit_async(NodeRef::Document(document), 0, root.clone())
            .await?
            .unwrap_or(Value::Null);
        self.store(prepared.cache_key, &result);
        self.finish(result, &root, &prepared.options)
    }

    fn prepare(
        &self,
        document: &Document,
        options: &TransformOptions,
    ) -> Result<Prepared, TransformError> {
        let options = options.merged_over(&self.defaults);
        options.validate()?;
        let mode = ModeConfig::from_options(&options);
        self.visitors
            .configure_breaker(mode.error_threshold, mode.threshold_exceeded_action);
        let cache_key = options
            .enable_cache()
            .then(|| TransformCache::key_for(document, &options));
        Ok(Prepared { options, cache_key })
    }

    fn probe(&self, prepared: &Prepared) -> Option<Value> {
        let (key, hash) = prepared.cache_key.as_ref()?;
        self.cache.lookup(key, hash)
    }

    fn store(&self, cache_key: Option<(String, String)>, result: &Value) {
        if let Some((key, hash)) = cache_key {
            self.cache.store(key, hash, result.clone());
        }
    }

    fn root_context(&self, document: &Document, options: &TransformOptions) -> TransformContext {
        create_root_context(Arc::new(document.clone()), Arc::new(options.clone()))
    }

    fn select_adapter(
        &self,
        options: &TransformOptions,
    ) -> Result<Option<Arc<dyn OutputAdapter>>, TransformError> {
        match options.format.as_deref() {
            Some(format) => match self.adapters.get(format) {
                Some(adapter) => Ok(Some(Arc::clone(adapter))),
                None => match &self.adapter {
                    Some(adapter) => Ok(Some(Arc::clone(adapter))),
                    None => Err(crate::err_msg!(
                        Configuration,
                        "no output adapter registered for format '{}'",
                        format
                    )),
                },
            },
            None => Ok(self.adapter.clone()),
        }
    }

    /// Runs the output adapter under the call's error policy.
    fn finish(
        &self,
        result: Value,
        context: &TransformContext,
        options: &TransformOptions,
    ) -> Result<Value, TransformError> {
        let mode = ModeConfig::from_options(options);
        let adapted = self.select_adapter(options).and_then(|adapter| match adapter {
            Some(adapter) => adapter
                .adapt(result.clone(), context)
                .map_err(|e| adapter_error(e, options.format.as_deref())),
            None => Ok(result.clone()),
        });
        match adapted {
            Ok(value) => Ok(value),
            Err(error) if mode.is_strict() => Err(error),
            Err(error) => {
                tracing::warn!("{}", format_error(&error, mode.error_verbosity));
                self.record_error(ErrorRecord::from_error(ErrorRecordKind::AdapterFailed, &error));
                Ok(result)
            }
        }
    }
}
