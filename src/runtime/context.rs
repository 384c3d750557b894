//! Traversal contexts.
//!
//! A [`TransformContext`] is an immutable value: every operation here returns a
//! new context and never touches its input. Collections are persistent (`im`),
//! so deriving a child context is copy-on-write and siblings can never observe
//! each other's changes.
//!
//! ## Alignment invariant
//! `parent_results[i]` is the merged result of the ancestor at `path[i]`. While
//! a node is being visited its own segment is the last entry of `path`, so
//! `parent_results.len() == path.len() - 1`.

use std::sync::Arc;

use im::Vector;
use serde_json::Value;

use crate::ast::Document;
use crate::runtime::options::TransformOptions;
use crate::runtime::path::segment_name;
use crate::runtime::variables::{self, Variables};

#[derive(Debug, Clone)]
pub struct TransformContext {
    /// The document being transformed, shared read-only.
    pub document: Arc<Document>,
    /// Effective options of this call, shared read-only.
    pub options: Arc<TransformOptions>,
    /// Output format key, if any.
    pub output: Option<String>,
    pub variables: Variables,
    pub path: Vector<String>,
    pub parent_results: Vector<Value>,
}

// ============================================================================
// CONTEXT MANAGER OPERATIONS
// ============================================================================

/// Context for the start of a traversal: empty path, no ancestor results.
pub fn create_root_context(
    document: Arc<Document>,
    options: Arc<TransformOptions>,
) -> TransformContext {
    let variables = options
        .variables
        .as_ref()
        .map(|vars| {
            vars.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Variables>()
        })
        .unwrap_or_default();
    TransformContext {
        output: options.format.clone(),
        document,
        options,
        variables,
        path: Vector::new(),
        parent_results: Vector::new(),
    }
}

/// Derives a child context one segment deeper.
///
/// `overrides` are shallow-merged over the parent's variables and win on
/// conflicts.
pub fn create_child_context(
    parent: &TransformContext,
    segment: impl Into<String>,
    overrides: Option<&Variables>,
) -> TransformContext {
    let mut path = parent.path.clone();
    path.push_back(segment.into());
    let variables = match overrides {
        Some(over) => over.clone().union(parent.variables.clone()),
        None => parent.variables.clone(),
    };
    TransformContext {
        document: Arc::clone(&parent.document),
        options: Arc::clone(&parent.options),
        output: parent.output.clone(),
        variables,
        path,
        parent_results: parent.parent_results.clone(),
    }
}

/// Returns a context with `result` appended to its ancestor results.
pub fn add_result(context: &TransformContext, result: Value) -> TransformContext {
    let mut next = context.clone();
    next.parent_results.push_back(result);
    next
}

/// Independent copy of a context. Document and options stay shared.
pub fn clone_context(context: &TransformContext) -> TransformContext {
    context.clone()
}

/// Fully independent copy: no structure is shared with the original, not even
/// the document or options.
pub fn deep_clone_context(context: &TransformContext) -> TransformContext {
    TransformContext {
        document: Arc::new((*context.document).clone()),
        options: Arc::new((*context.options).clone()),
        output: context.output.clone(),
        variables: context
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        path: context.path.iter().cloned().collect(),
        parent_results: context.parent_results.iter().cloned().collect(),
    }
}

// ============================================================================
// QUERIES
// ============================================================================

impl TransformContext {
    /// Local variable lookup. See `ContextGraph::lookup_variable` for lookups
    /// that climb through parent contexts.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Dotted-path lookup, e.g. `site.author`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        variables::lookup(&self.variables, path)
    }

    /// Resolves `${...}` placeholders against this context's variables.
    pub fn interpolate(&self, text: &str) -> String {
        variables::resolve_variables(text, &self.variables)
    }

    /// Returns a context with extra variable bindings layered on top.
    pub fn with_variables(&self, overrides: &Variables) -> TransformContext {
        let mut next = self.clone();
        next.variables = overrides.clone().union(self.variables.clone());
        next
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn current_segment(&self) -> Option<&str> {
        self.path.back().map(String::as_str)
    }

    pub fn path_string(&self) -> String {
        self.path.iter().cloned().collect::<Vec<_>>().join("/")
    }

    /// Result of the closest ancestor.
    pub fn parent_result(&self) -> Option<&Value> {
        self.parent_results.back()
    }

    /// Result of the ancestor at `path[index]`.
    pub fn ancestor_result(&self, index: usize) -> Option<&Value> {
        self.parent_results.get(index)
    }

    /// Result of the closest ancestor whose segment name is `name`
    /// (e.g. `"element"` or `"document"`).
    pub fn nearest_ancestor(&self, name: &str) -> Option<&Value> {
        (0..self.parent_results.len())
            .rev()
            .find(|&i| self.path.get(i).is_some_and(|seg| segment_name(seg) == name))
            .and_then(|i| self.parent_results.get(i))
    }

    /// Result of the closest ancestor whose full segment equals `segment`
    /// (e.g. `"element[section]"`).
    pub fn ancestor_by_segment(&self, segment: &str) -> Option<&Value> {
        (0..self.parent_results.len())
            .rev()
            .find(|&i| self.path.get(i).is_some_and(|seg| seg == segment))
            .and_then(|i| self.parent_results.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> TransformContext {
        let options = TransformOptions::new().with_variable("lang", "en").with_variable("v", 1);
        create_root_context(Arc::new(Document::default()), Arc::new(options))
    }

    #[test]
    fn test_root_context_copies_variables() {
        let ctx = root();
        assert_eq!(ctx.variable("lang"), Some(&json!("en")));
        assert!(ctx.path.is_empty());
        assert!(ctx.parent_results.is_empty());
    }

    #[test]
    fn test_child_context_does_not_touch_parent() {
        let parent = root();
        let mut overrides = Variables::new();
        overrides.insert("v".into(), json!(2));
        let child = create_child_context(&parent, "document", Some(&overrides));
        assert_eq!(child.path_string(), "document");
        assert_eq!(child.variable("v"), Some(&json!(2)));
        assert_eq!(child.variable("lang"), Some(&json!("en")));
        assert_eq!(parent.variable("v"), Some(&json!(1)));
        assert!(parent.path.is_empty());
    }

    #[test]
    fn test_add_result_is_copy_on_write() {
        let base = create_child_context(&root(), "document", None);
        let a = add_result(&base, json!({"n": "a"}));
        let b = add_result(&base, json!({"n": "b"}));
        assert!(base.parent_results.is_empty());
        assert_eq!(a.parent_result(), Some(&json!({"n": "a"})));
        assert_eq!(b.parent_result(), Some(&json!({"n": "b"})));
    }

    #[test]
    fn test_nearest_ancestor_respects_alignment() {
        let doc = create_child_context(&root(), "document", None);
        let doc = add_result(&doc, json!("doc"));
        let section = create_child_context(&doc, "element[section]", None);
        let section = add_result(&section, json!("section"));
        let para = create_child_context(&section, "element[p]", None);

        assert_eq!(para.depth(), 3);
        assert_eq!(para.parent_results.len(), 2);
        assert_eq!(para.nearest_ancestor("element"), Some(&json!("section")));
        assert_eq!(para.nearest_ancestor("document"), Some(&json!("doc")));
        assert_eq!(para.ancestor_by_segment("element[section]"), Some(&json!("section")));
        // The node's own segment has no result yet.
        assert_eq!(para.ancestor_by_segment("element[p]"), None);
        assert_eq!(para.ancestor_result(0), Some(&json!("doc")));
    }

    #[test]
    fn test_deep_clone_shares_nothing() {
        let ctx = add_result(&create_child_context(&root(), "document", None), json!([1]));
        let copy = deep_clone_context(&ctx);
        assert!(!Arc::ptr_eq(&ctx.document, &copy.document));
        assert!(!Arc::ptr_eq(&ctx.options, &copy.options));
        assert_eq!(copy.path, ctx.path);
        assert_eq!(copy.parent_results, ctx.parent_results);

        let shallow = clone_context(&ctx);
        assert!(Arc::ptr_eq(&ctx.document, &shallow.document));
    }

    #[test]
    fn test_interpolate_uses_context_variables() {
        let ctx = root();
        assert_eq!(ctx.interpolate("lang=${lang}"), "lang=en");
    }
}
