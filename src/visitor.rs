//! # Visitor Contract
//!
//! A visitor is a named, prioritized bundle of node handlers. Handlers are
//! capability traits; a visitor implements any subset and advertises each one
//! through the matching `as_*` accessor on [`Visitor`]:
//!
//! | Capability               | Sync trait          | Async trait               |
//! |--------------------------|---------------------|---------------------------|
//! | handles-document         | [`DocumentHandler`] | [`AsyncDocumentHandler`]  |
//! | handles-element          | [`ElementHandler`]  | [`AsyncElementHandler`]   |
//! | handles-content          | [`ContentHandler`]  | [`AsyncContentHandler`]   |
//! | handles-reference        | [`ReferenceHandler`]| [`AsyncReferenceHandler`] |
//!
//! The synchronous engine path only sees sync handlers. The asynchronous path
//! prefers an async handler and falls back to the sync one.
//!
//! A handler returns `Ok(None)` (or `Ok(Some(Value::Null))`) when it has
//! nothing to contribute, `Ok(Some(value))` to contribute a result, and `Err`
//! on failure.
//!
//! For small visitors, [`FnVisitor`] wraps closures:
//!
//! ```rust
//! use docweave::visitor::FnVisitor;
//! use serde_json::json;
//! let upper = FnVisitor::new("upper")
//!     .with_priority(5)
//!     .on_content(|c, _ctx| Ok(Some(json!(c.value.to_uppercase()))));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::ast::{Content, Document, Element, NodeType, Reference};
use crate::diagnostics::BoxError;
use crate::runtime::context::TransformContext;

/// Outcome of one handler call.
pub type VisitResult = Result<Option<Value>, BoxError>;

// ============================================================================
// PRIORITY
// ============================================================================

/// Visitor priority; higher runs first.
///
/// `PerTag` lets an element visitor outrank others for specific tags only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Priority {
    Fixed(i64),
    PerTag {
        default: i64,
        tags: HashMap<String, i64>,
    },
}

impl Priority {
    /// Priority used for the global ordering.
    pub fn base(&self) -> i64 {
        match self {
            Priority::Fixed(p) => *p,
            Priority::PerTag { default, .. } => *default,
        }
    }

    /// Priority for an element with the given tag.
    pub fn for_tag(&self, tag: &str) -> i64 {
        match self {
            Priority::Fixed(p) => *p,
            Priority::PerTag { default, tags } => tags.get(tag).copied().unwrap_or(*default),
        }
    }

    pub fn per_tag<I, S>(default: i64, tags: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Priority::PerTag {
            default,
            tags: tags.into_iter().map(|(t, p)| (t.into(), p)).collect(),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Fixed(0)
    }
}

impl From<i64> for Priority {
    fn from(p: i64) -> Self {
        Priority::Fixed(p)
    }
}

// ============================================================================
// CAPABILITY TRAITS
// ============================================================================

pub trait DocumentHandler: Send + Sync {
    fn visit_document(&self, document: &Document, context: &TransformContext) -> VisitResult;
}

pub trait ElementHandler: Send + Sync {
    fn visit_element(&self, element: &Element, context: &TransformContext) -> VisitResult;
}

pub trait ContentHandler: Send + Sync {
    fn visit_content(&self, content: &Content, context: &TransformContext) -> VisitResult;
}

pub trait ReferenceHandler: Send + Sync {
    fn visit_reference(&self, reference: &Reference, context: &TransformContext) -> VisitResult;
}

#[async_trait]
pub trait AsyncDocumentHandler: Send + Sync {
    async fn visit_document_async(
        &self,
        document: &Document,
        context: &TransformContext,
    ) -> VisitResult;
}

#[async_trait]
pub trait AsyncElementHandler: Send + Sync {
    async fn visit_element_async(&self, element: &Element, context: &TransformContext)
        -> VisitResult;
}

#[async_trait]
pub trait AsyncContentHandler: Send + Sync {
    async fn visit_content_async(&self, content: &Content, context: &TransformContext)
        -> VisitResult;
}

#[async_trait]
pub trait AsyncReferenceHandler: Send + Sync {
    async fn visit_reference_async(
        &self,
        reference: &Reference,
        context: &TransformContext,
    ) -> VisitResult;
}

/// A registered visitor. Names must be unique within an engine.
pub trait Visitor: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> Priority {
        Priority::default()
    }

    fn as_document_handler(&self) -> Option<&dyn DocumentHandler> {
        None
    }

    fn as_element_handler(&self) -> Option<&dyn ElementHandler> {
        None
    }

    fn as_content_handler(&self) -> Option<&dyn ContentHandler> {
        None
    }

    fn as_reference_handler(&self) -> Option<&dyn ReferenceHandler> {
        None
    }

    fn as_async_document_handler(&self) -> Option<&dyn AsyncDocumentHandler> {
        None
    }

    fn as_async_element_handler(&self) -> Option<&dyn AsyncElementHandler> {
        None
    }

    fn as_async_content_handler(&self) -> Option<&dyn AsyncContentHandler> {
        None
    }

    fn as_async_reference_handler(&self) -> Option<&dyn AsyncReferenceHandler> {
        None
    }
}

/// Which engine path is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Sync,
    Async,
}

/// Whether `visitor` exposes a handler for `node_type` on the given path.
///
/// The async path accepts either flavor of handler.
pub fn handles(visitor: &dyn Visitor, node_type: NodeType, flavor: Flavor) -> bool {
    let sync = match node_type {
        NodeType::Document => visitor.as_document_handler().is_some(),
        NodeType::Element => visitor.as_element_handler().is_some(),
        NodeType::Content => visitor.as_content_handler().is_some(),
        NodeType::Reference => visitor.as_reference_handler().is_some(),
    };
    match flavor {
        Flavor::Sync => sync,
        Flavor::Async => {
            sync || match node_type {
                NodeType::Document => visitor.as_async_document_handler().is_some(),
                NodeType::Element => visitor.as_async_element_handler().is_some(),
                NodeType::Content => visitor.as_async_content_handler().is_some(),
                NodeType::Reference => visitor.as_async_reference_handler().is_some(),
            }
        }
    }
}

// ============================================================================
// CLOSURE-BACKED VISITOR
// ============================================================================

type SyncFn<N> = Arc<dyn Fn(&N, &TransformContext) -> VisitResult + Send + Sync>;
type AsyncFn<N> = Arc<dyn Fn(N, TransformContext) -> BoxFuture<'static, VisitResult> + Send + Sync>;

/// Visitor assembled from closures.
///
/// Async closures receive owned copies of the node and context so the returned
/// future can be `'static`.
#[derive(Clone)]
pub struct FnVisitor {
    name: String,
    priority: Priority,
    document: Option<SyncFn<Document>>,
    element: Option<SyncFn<Element>>,
    content: Option<SyncFn<Content>>,
    reference: Option<SyncFn<Reference>>,
    document_async: Option<AsyncFn<Document>>,
    element_async: Option<AsyncFn<Element>>,
    content_async: Option<AsyncFn<Content>>,
    reference_async: Option<AsyncFn<Reference>>,
}

fn boxed_async<N, F, Fut>(f: F) -> AsyncFn<N>
where
    F: Fn(N, TransformContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = VisitResult> + Send + 'static,
{
    Arc::new(move |node, ctx| f(node, ctx).boxed())
}

impl FnVisitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: Priority::default(),
            document: None,
            element: None,
            content: None,
            reference: None,
            document_async: None,
            element_async: None,
            content_async: None,
            reference_async: None,
        }
    }

    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn on_document<F>(mut self, f: F) -> Self
    where
        F: Fn(&Document, &TransformContext) -> VisitResult + Send + Sync + 'static,
    {
        self.document = Some(Arc::new(f));
        self
    }

    pub fn on_element<F>(mut self, f: F) -> Self
    where
        F: Fn(&Element, &TransformContext) -> VisitResult + Send + Sync + 'static,
    {
        self.element = Some(Arc::new(f));
        self
    }

    pub fn on_content<F>(mut self, f: F) -> Self
    where
        F: Fn(&Content, &TransformContext) -> VisitResult + Send + Sync + 'static,
    {
        self.content = Some(Arc::new(f));
        self
    }

    pub fn on_reference<F>(mut self, f: F) -> Self
    where
        F: Fn(&Reference, &TransformContext) -> VisitResult + Send + Sync + 'static,
    {
        self.reference = Some(Arc::new(f));
        self
    }

    pub fn on_document_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Document, TransformContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VisitResult> + Send + 'static,
    {
        self.document_async = Some(boxed_async(f));
        self
    }

    pub fn on_element_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Element, TransformContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VisitResult> + Send + 'static,
    {
        self.element_async = Some(boxed_async(f));
        self
    }

    pub fn on_content_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Content, TransformContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VisitResult> + Send + 'static,
    {
        self.content_async = Some(boxed_async(f));
        self
    }

    pub fn on_reference_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Reference, TransformContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VisitResult> + Send + 'static,
    {
        self.reference_async = Some(boxed_async(f));
        self
    }
}

impl Visitor for FnVisitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority.clone()
    }

    fn as_document_handler(&self) -> Option<&dyn DocumentHandler> {
        self.document.as_ref().map(|_| self as &dyn DocumentHandler)
    }

    fn as_element_handler(&self) -> Option<&dyn ElementHandler> {
        self.element.as_ref().map(|_| self as &dyn ElementHandler)
    }

    fn as_content_handler(&self) -> Option<&dyn ContentHandler> {
        self.content.as_ref().map(|_| self as &dyn ContentHandler)
    }

    fn as_reference_handler(&self) -> Option<&dyn ReferenceHandler> {
        self.reference.as_ref().map(|_| self as &dyn ReferenceHandler)
    }

    fn as_async_document_handler(&self) -> Option<&dyn AsyncDocumentHandler> {
        self.document_async
            .as_ref()
            .map(|_| self as &dyn AsyncDocumentHandler)
    }

    fn as_async_element_handler(&self) -> Option<&dyn AsyncElementHandler> {
        self.element_async
            .as_ref()
            .map(|_| self as &dyn AsyncElementHandler)
    }

    fn as_async_content_handler(&self) -> Option<&dyn AsyncContentHandler> {
        self.content_async
            .as_ref()
            .map(|_| self as &dyn AsyncContentHandler)
    }

    fn as_async_reference_handler(&self) -> Option<&dyn AsyncReferenceHandler> {
        self.reference_async
            .as_ref()
            .map(|_| self as &dyn AsyncReferenceHandler)
    }
}

impl DocumentHandler for FnVisitor {
    fn visit_document(&self, document: &Document, context: &TransformContext) -> VisitResult {
        match &self.document {
            Some(f) => f(document, context),
            None => Ok(None),
        }
    }
}

impl ElementHandler for FnVisitor {
    fn visit_element(&self, element: &Element, context: &TransformContext) -> VisitResult {
        match &self.element {
            Some(f) => f(element, context),
            None => Ok(None),
        }
    }
}

impl ContentHandler for FnVisitor {
    fn visit_content(&self, content: &Content, context: &TransformContext) -> VisitResult {
        match &self.content {
            Some(f) => f(content, context),
            None => Ok(None),
        }
    }
}

impl ReferenceHandler for FnVisitor {
    fn visit_reference(&self, reference: &Reference, context: &TransformContext) -> VisitResult {
        match &self.reference {
            Some(f) => f(reference, context),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AsyncDocumentHandler for FnVisitor {
    async fn visit_document_async(
        &self,
        document: &Document,
        context: &TransformContext,
    ) -> VisitResult {
        match &self.document_async {
            Some(f) => f(document.clone(), context.clone()).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AsyncElementHandler for FnVisitor {
    async fn visit_element_async(
        &self,
        element: &Element,
        context: &TransformContext,
    ) -> VisitResult {
        match &self.element_async {
            Some(f) => f(element.clone(), context.clone()).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AsyncContentHandler for FnVisitor {
    async fn visit_content_async(
        &self,
        content: &Content,
        context: &TransformContext,
    ) -> VisitResult {
        match &self.content_async {
            Some(f) => f(content.clone(), context.clone()).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AsyncReferenceHandler for FnVisitor {
    async fn visit_reference_async(
        &self,
        reference: &Reference,
        context: &TransformContext,
    ) -> VisitResult {
        match &self.reference_async {
            Some(f) => f(reference.clone(), context.clone()).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capabilities_follow_registered_closures() {
        let v = FnVisitor::new("v").on_element(|_, _| Ok(Some(json!(1))));
        assert!(handles(&v, NodeType::Element, Flavor::Sync));
        assert!(handles(&v, NodeType::Element, Flavor::Async));
        assert!(!handles(&v, NodeType::Content, Flavor::Sync));

        let a = FnVisitor::new("a").on_content_async(|_, _| async { Ok(None) });
        assert!(!handles(&a, NodeType::Content, Flavor::Sync));
        assert!(handles(&a, NodeType::Content, Flavor::Async));
    }

    #[test]
    fn test_priority_per_tag() {
        let p = Priority::per_tag(1, [("table", 50)]);
        assert_eq!(p.base(), 1);
        assert_eq!(p.for_tag("table"), 50);
        assert_eq!(p.for_tag("p"), 1);
        assert_eq!(Priority::from(7).for_tag("table"), 7);
        assert_eq!(Priority::default().base(), 0);
    }
}
