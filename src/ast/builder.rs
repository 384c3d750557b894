//! # Tree Builders
//!
//! Fluent constructors for document trees. The upstream parser normally
//! produces the tree; these builders exist for embedding hosts and tests.
//!
//! ```rust
//! use docweave::ast::builder::{document, element, reference, text};
//! let doc = document()
//!     .id("guide")
//!     .child(element("section").attr("title", "Intro").child(text("Hello")))
//!     .child(reference("id", "intro"))
//!     .build();
//! assert_eq!(doc.children.len(), 2);
//! ```

use serde_json::Value;

use crate::ast::{Content, Document, Element, Meta, Node, Position, Reference};

pub fn document() -> DocumentBuilder {
    DocumentBuilder {
        doc: Document::default(),
    }
}

pub fn element(tag: impl Into<String>) -> ElementBuilder {
    ElementBuilder {
        el: Element {
            tag_name: tag.into(),
            ..Default::default()
        },
    }
}

pub fn text(value: impl Into<String>) -> ContentBuilder {
    ContentBuilder {
        content: Content {
            value: value.into(),
            ..Default::default()
        },
    }
}

pub fn reference(protocol: impl Into<String>, path: impl Into<String>) -> ReferenceBuilder {
    ReferenceBuilder {
        reference: Reference {
            protocol: protocol.into(),
            path: path.into(),
            ..Default::default()
        },
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    doc: Document,
}

impl DocumentBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.doc.id = Some(id.into());
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.doc.children.push(child.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert(&mut self.doc.meta, key, value);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert(&mut self.doc.metadata, key, value);
        self
    }

    pub fn semantics(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert(&mut self.doc.semantics, key, value);
        self
    }

    pub fn lines(mut self, start: usize, end: usize) -> Self {
        self.doc.position = Position::lines(start, end);
        self
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

#[derive(Debug, Clone)]
pub struct ElementBuilder {
    el: Element,
}

impl ElementBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.el.id = Some(id.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.el.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.el.children.push(child.into());
        self
    }

    pub fn children<I, N>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        self.el.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert(&mut self.el.meta, key, value);
        self
    }

    pub fn lines(mut self, start: usize, end: usize) -> Self {
        self.el.position = Position::lines(start, end);
        self
    }

    pub fn build(self) -> Element {
        self.el
    }

    pub fn into_node(self) -> Node {
        Node::Element(self.el)
    }
}

#[derive(Debug, Clone)]
pub struct ContentBuilder {
    content: Content,
}

impl ContentBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.content.id = Some(id.into());
        self
    }

    pub fn lines(mut self, start: usize, end: usize) -> Self {
        self.content.position = Position::lines(start, end);
        self
    }

    pub fn build(self) -> Content {
        self.content
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceBuilder {
    reference: Reference,
}

impl ReferenceBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.reference.id = Some(id.into());
        self
    }

    pub fn resolved(mut self, payload: impl Into<Value>) -> Self {
        self.reference.resolved = Some(payload.into());
        self
    }

    pub fn lines(mut self, start: usize, end: usize) -> Self {
        self.reference.position = Position::lines(start, end);
        self
    }

    pub fn build(self) -> Reference {
        self.reference
    }
}

fn insert(bag: &mut Option<Meta>, key: impl Into<String>, value: impl Into<Value>) {
    bag.get_or_insert_with(Meta::new)
        .insert(key.into(), value.into());
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<DocumentBuilder> for Node {
    fn from(b: DocumentBuilder) -> Self {
        Node::Document(b.doc)
    }
}

impl From<ElementBuilder> for Node {
    fn from(b: ElementBuilder) -> Self {
        Node::Element(b.el)
    }
}

impl From<ContentBuilder> for Node {
    fn from(b: ContentBuilder) -> Self {
        Node::Content(b.content)
    }
}

impl From<ReferenceBuilder> for Node {
    fn from(b: ReferenceBuilder) -> Self {
        Node::Reference(b.reference)
    }
}
