//! Per-node dispatch.
//!
//! One [`Traversal`] is built per transform call. It owns the call's error
//! policy and merge settings and borrows the engine for the visitor registry
//! and the error log. The synchronous walk lives here; the asynchronous mirror
//! in `dispatch_async` reuses every helper except the invocation itself.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::ast::value::non_null;
use crate::ast::NodeRef;
use crate::diagnostics::{
    enhance_visitor_error, format_error, BoxError, ErrorContext, ErrorRecord, ErrorRecordKind,
    TransformError,
};
use crate::engine::merge::{merge_results, MergeOptions};
use crate::engine::TransformEngine;
use crate::runtime::context::{add_result, clone_context, create_child_context, TransformContext};
use crate::runtime::mode::ModeConfig;
use crate::runtime::options::TransformOptions;
use crate::runtime::path::make_segment;
use crate::visitor::{Flavor, VisitResult, Visitor};

// ============================================================================
// INVOCATION OUTCOME
// ============================================================================

/// What one visitor did with one node.
#[derive(Debug)]
pub(crate) enum Invocation {
    Produced(Value),
    Empty,
    Failed(BoxError),
}

impl Invocation {
    pub(crate) fn from_result(result: VisitResult) -> Self {
        match result.map(non_null) {
            Ok(Some(value)) => Invocation::Produced(value),
            Ok(None) => Invocation::Empty,
            Err(err) => Invocation::Failed(err),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "visitor panicked".to_string()
        };
        Invocation::Failed(format!("panic: {}", message).into())
    }
}

fn invoke(visitor: &dyn Visitor, node: NodeRef<'_>, context: &TransformContext) -> Invocation {
    let call = panic::catch_unwind(AssertUnwindSafe(|| match node {
        NodeRef::Document(d) => visitor
            .as_document_handler()
            .map(|h| h.visit_document(d, context)),
        NodeRef::Element(e) => visitor
            .as_element_handler()
            .map(|h| h.visit_element(e, context)),
        NodeRef::Content(c) => visitor
            .as_content_handler()
            .map(|h| h.visit_content(c, context)),
        NodeRef::Reference(r) => visitor
            .as_reference_handler()
            .map(|h| h.visit_reference(r, context)),
    }));
    match call {
        Ok(Some(result)) => Invocation::from_result(result),
        Ok(None) => Invocation::Empty,
        Err(payload) => Invocation::from_panic(payload),
    }
}

// ============================================================================
// NODE SHAPE HELPERS
// ============================================================================

/// Path segment for a node; `index` is its position among its siblings.
pub(crate) fn segment_for(node: NodeRef<'_>, index: usize) -> String {
    match node {
        NodeRef::Document(_) => "document".to_string(),
        NodeRef::Element(e) => make_segment("element", &e.tag_name),
        NodeRef::Content(_) => make_segment("content", index),
        NodeRef::Reference(r) => make_segment("reference", &r.protocol),
    }
}

/// Minimal node synthesized when no visitor produced a result.
pub(crate) fn default_skeleton(node: NodeRef<'_>, children: Vec<Value>) -> Option<Value> {
    match node {
        NodeRef::Document(_) => Some(json!({ "type": "document", "children": children })),
        NodeRef::Element(e) => Some(json!({
            "type": "element",
            "tagName": e.tag_name,
            "children": children,
        })),
        NodeRef::Content(_) | NodeRef::Reference(_) => None,
    }
}

/// Combines a node's own result with the results of its children.
pub(crate) fn assemble(
    node: NodeRef<'_>,
    result: Option<Value>,
    child_results: Vec<Value>,
) -> Option<Value> {
    match result {
        Some(Value::Object(mut map)) => {
            if !child_results.is_empty() {
                map.insert("children".to_string(), Value::Array(child_results));
            }
            Some(Value::Object(map))
        }
        Some(other) => Some(other),
        None => default_skeleton(node, child_results),
    }
}

// ============================================================================
// TRAVERSAL
// ============================================================================

pub(crate) struct Traversal<'e> {
    pub(crate) engine: &'e TransformEngine,
    pub(crate) mode: ModeConfig,
    pub(crate) merge_enabled: bool,
    pub(crate) merge: MergeOptions,
    pub(crate) max_depth: Option<usize>,
}

impl<'e> Traversal<'e> {
    pub(crate) fn new(engine: &'e TransformEngine, options: &TransformOptions) -> Self {
        Self {
            engine,
            mode: ModeConfig::from_options(options),
            merge_enabled: options.merge_return_values(),
            merge: MergeOptions::from_options(options),
            max_depth: options.max_depth,
        }
    }

    /// Child context for `node`, checked against the depth limit.
    pub(crate) fn enter(
        &self,
        node: NodeRef<'_>,
        index: usize,
        parent: &TransformContext,
    ) -> Result<TransformContext, TransformError> {
        let context = create_child_context(parent, segment_for(node, index), None);
        if let Some(limit) = self.max_depth {
            if context.depth() > limit {
                return Err(TransformError::DepthLimit {
                    limit,
                    ctx: ErrorContext {
                        path: Some(context.path_string()),
                        help: Some("raise `maxDepth` or leave it unset for no limit".to_string()),
                        ..ErrorContext::none()
                    },
                });
            }
        }
        Ok(context)
    }

    pub(crate) fn visitors_for(&self, node: NodeRef<'_>, flavor: Flavor) -> Vec<Arc<dyn Visitor>> {
        self.engine
            .visitors()
            .visitors_for(node.node_type(), node.tag(), flavor)
    }

    /// Applies the error policy to one invocation.
    ///
    /// Returns the produced value, `None` when the visitor contributed nothing
    /// (including a loose-mode failure), or the enhanced error in strict mode.
    pub(crate) fn settle(
        &self,
        visitor: &str,
        invocation: Invocation,
        node: NodeRef<'_>,
        context: &TransformContext,
    ) -> Result<Option<Value>, TransformError> {
        let registry = self.engine.visitors();
        let source = match invocation {
            Invocation::Produced(value) => {
                registry.reset_error_count(visitor);
                return Ok(Some(value));
            }
            Invocation::Empty => {
                registry.reset_error_count(visitor);
                return Ok(None);
            }
            Invocation::Failed(source) => source,
        };

        let count = registry.increment_error_count(visitor);
        let error = enhance_visitor_error(
            source,
            visitor,
            node.node_type(),
            node.position(),
            context.path_string(),
        );

        if !self.mode.is_strict() {
            tracing::warn!(
                visitor,
                path = %context.path_string(),
                "{}",
                format_error(&error, self.mode.error_verbosity)
            );
            self.engine
                .record_error(ErrorRecord::from_error(ErrorRecordKind::VisitorFailed, &error));
        }
        if count.newly_disabled {
            tracing::warn!(
                visitor,
                errors = count.count,
                threshold = self.mode.error_threshold,
                "visitor disabled after repeated failures"
            );
            self.engine.record_error(ErrorRecord::visitor_disabled(
                visitor,
                count.count,
                self.mode.error_threshold,
            ));
        }
        if self.mode.is_strict() {
            return Err(error);
        }
        Ok(None)
    }

    /// Folds the collected results of one node.
    pub(crate) fn combine(&self, results: Vec<Value>) -> Option<Value> {
        merge_results(results, &self.merge)
    }

    /// Context handed to the children of a node: its own result (or a null
    /// placeholder) appended to the ancestor results.
    pub(crate) fn child_context(context: &TransformContext, result: &Option<Value>) -> TransformContext {
        add_result(context, result.clone().unwrap_or(Value::Null))
    }

    // ------------------------------------------------------------------------
    // Synchronous walk
    // ------------------------------------------------------------------------

    pub(crate) fn visit(
        &self,
        node: NodeRef<'_>,
        index: usize,
        parent: &TransformContext,
    ) -> Result<Option<Value>, TransformError> {
        let context = self.enter(node, index, parent)?;
        let visitors = self.visitors_for(node, Flavor::Sync);
        tracing::debug!(
            path = %context.path_string(),
            visitors = visitors.len(),
            "dispatching node"
        );

        let mut results = Vec::new();
        for visitor in &visitors {
            if self.engine.visitors().is_disabled(visitor.name()) {
                continue;
            }
            let invocation = invoke(visitor.as_ref(), node, &clone_context(&context));
            if let Some(value) = self.settle(visitor.name(), invocation, node, &context)? {
                results.push(value);
                if !self.merge_enabled {
                    break;
                }
            }
        }
        let result = self.combine(results);

        let children = node.children();
        if children.is_empty() {
            return Ok(result);
        }
        let child_context = Self::child_context(&context, &result);
        let mut child_results = Vec::new();
        for (i, child) in children.iter().enumerate() {
            if let Some(value) = self.visit(NodeRef::from(child), i, &child_context)? {
                child_results.push(value);
            }
        }
        Ok(assemble(node, result, child_results))
    }
}
