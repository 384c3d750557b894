//! # Built-in Visitors
//!
//! Ready-made visitors for the common transform jobs. Each one is configured
//! through a plain `*Config` struct and can be registered on its own.
//!
//! ## Module Structure
//!
//! - **`helpers`**: shared extraction utilities (text, attributes, key casing)
//! - **`document`**: document outline and element index
//! - **`metadata`**: normalized document metadata bag
//! - **`element`**: attribute coercion, interpolation and metadata extraction
//! - **`special`**: tag-specific extraction (image, link, code, table, ...)
//! - **`reference`**: inlining or linking of resolved references
//!
//! ## Default Priorities
//!
//! | Visitor                  | Name                  | Priority |
//! |--------------------------|-----------------------|----------|
//! | SpecialElementVisitor    | `special-element`     | 20       |
//! | InlineReferenceVisitor   | `reference-inline`    | 15       |
//! | DocumentStructureVisitor | `document-structure`  | 10       |
//! | ElementProcessingVisitor | `element-processing`  | 10       |
//! | ReferenceVisitor         | `reference`           | 10       |
//! | MetadataVisitor          | `metadata`            | 5        |

use std::sync::Arc;

use crate::engine::TransformEngine;
use crate::visitor::Visitor;

pub mod document;
pub mod element;
pub mod helpers;
pub mod metadata;
pub mod reference;
pub mod special;

pub use document::{DocumentStructureConfig, DocumentStructureVisitor};
pub use element::{ChildRecursion, ElementProcessingConfig, ElementProcessingVisitor};
pub use metadata::{MetadataConfig, MetadataVisitor};
pub use reference::{InlineReferenceVisitor, ReferenceConfig, ReferenceVisitor};
pub use special::{SpecialElementConfig, SpecialElementVisitor};

/// The default built-in set with default configuration.
///
/// Only the link-style reference visitor is included; register
/// [`InlineReferenceVisitor`] explicitly to inline resolved payloads.
/// [`MetadataVisitor`] is opt-in too: it contributes only when return values
/// are merged, since the document structure visitor always answers first.
pub fn builtin_visitors() -> Vec<Arc<dyn Visitor>> {
    vec![
        Arc::new(SpecialElementVisitor::default()),
        Arc::new(DocumentStructureVisitor::default()),
        Arc::new(ElementProcessingVisitor::default()),
        Arc::new(ReferenceVisitor::default()),
    ]
}

/// Registers every visitor from [`builtin_visitors`] on `engine`.
pub fn register_builtin_visitors(engine: &mut TransformEngine) {
    for visitor in builtin_visitors() {
        engine.register_shared_visitor(visitor);
    }
}
