//! Asynchronous walk.
//!
//! Same dispatch rules as the synchronous walk. The visitors of one node still
//! run one after another; the children of a node are started together and
//! joined. Registry locks are only taken inside synchronous helpers, so no lock
//! is ever held across an await point.
//!
//! Each invocation first waits for an admission slot from the registry. A
//! visitor disabled by a failing sibling is skipped, and no more calls start
//! than could fail before its breaker trips.

use std::panic::AssertUnwindSafe;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::ast::NodeRef;
use crate::diagnostics::TransformError;
use crate::engine::dispatch::{assemble, Invocation, Traversal};
use crate::runtime::context::{clone_context, TransformContext};
use crate::visitor::{Flavor, Visitor};

/// Calls the async handler for the node kind, falling back to the sync one.
async fn invoke_async(
    visitor: &dyn Visitor,
    node: NodeRef<'_>,
    context: &TransformContext,
) -> Invocation {
    let call = async {
        match node {
            NodeRef::Document(d) => match visitor.as_async_document_handler() {
                Some(h) => Some(h.visit_document_async(d, context).await),
                None => visitor
                    .as_document_handler()
                    .map(|h| h.visit_document(d, context)),
            },
            NodeRef::Element(e) => match visitor.as_async_element_handler() {
                Some(h) => Some(h.visit_element_async(e, context).await),
                None => visitor
                    .as_element_handler()
                    .map(|h| h.visit_element(e, context)),
            },
            NodeRef::Content(c) => match visitor.as_async_content_handler() {
                Some(h) => Some(h.visit_content_async(c, context).await),
                None => visitor
                    .as_content_handler()
                    .map(|h| h.visit_content(c, context)),
            },
            NodeRef::Reference(r) => match visitor.as_async_reference_handler() {
                Some(h) => Some(h.visit_reference_async(r, context).await),
                None => visitor
                    .as_reference_handler()
                    .map(|h| h.visit_reference(r, context)),
            },
        }
    };
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Some(result)) => Invocation::from_result(result),
        Ok(None) => Invocation::Empty,
        Err(payload) => Invocation::from_panic(payload),
    }
}

impl<'e> Traversal<'e> {
    pub(crate) fn visit_async<'a>(
        &'a self,
        node: NodeRef<'a>,
        index: usize,
        parent: TransformContext,
    ) -> BoxFuture<'a, Result<Option<Value>, TransformError>> {
        async move {
            let context = self.enter(node, index, &parent)?;
            let visitors = self.visitors_for(node, Flavor::Async);
            tracing::debug!(
                path = %context.path_string(),
                visitors = visitors.len(),
                "dispatching node (async)"
            );

            let registry = self.engine.visitors();
            let mut results = Vec::new();
            for visitor in &visitors {
                let Some(slot) = registry.admit(visitor.name()).await else {
                    continue;
                };
                let isolated = clone_context(&context);
                let invocation = invoke_async(visitor.as_ref(), node, &isolated).await;
                let settled = self.settle(visitor.name(), invocation, node, &context);
                drop(slot);
                if let Some(value) = settled? {
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
            let child_results = try_join_all(
                children
                    .iter()
                    .enumerate()
                    .map(|(i, child)| self.visit_async(NodeRef::from(child), i, child_context.clone())),
            )
            .await?;
            Ok(assemble(
                node,
                result,
                child_results.into_iter().flatten().collect(),
            ))
        }
        .boxed()
    }
}
