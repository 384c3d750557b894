//! Common imports for writing visitors and driving the engine.

pub use crate::adapter::OutputAdapter;
pub use crate::ast::builder::{document, element, reference, text};
pub use crate::ast::{Content, Document, Element, Node, NodeType, Position, Reference};
pub use crate::diagnostics::{BoxError, ErrorRecord, ErrorRecordKind, TransformError};
pub use crate::engine::TransformEngine;
pub use crate::runtime::context::TransformContext;
pub use crate::runtime::options::{ConflictStrategy, Mode, TransformOptions};
pub use crate::visitor::{
    AsyncContentHandler, AsyncDocumentHandler, AsyncElementHandler, AsyncReferenceHandler,
    ContentHandler, DocumentHandler, ElementHandler, FnVisitor, Priority, ReferenceHandler,
    VisitResult, Visitor,
};
