//! AST module for docweave
//!
//! This module provides the node model consumed by the transform engine: an
//! already-parsed, already-resolved document tree. Every node carries a
//! [`Position`] used only for diagnostics.
//!
//! The tree is produced upstream (parser + reference resolver) and is treated
//! as read-mostly input. It (de)serializes with an internal `type` tag so a
//! resolver can hand it over as JSON:
//!
//! ```rust
//! use docweave::ast::Node;
//! let json = r#"{"type":"element","tagName":"p","children":[{"type":"content","value":"hi"}]}"#;
//! let node: Node = serde_json::from_str(json).unwrap();
//! assert_eq!(node.children().len(), 1);
//! ```

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub mod builder;
pub mod value;

/// Free-form metadata bag attached to nodes.
pub type Meta = Map<String, Value>;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A single location in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub line: usize,
    pub column: usize,
    #[serde(default)]
    pub offset: usize,
}

/// Source range of a node.
///
/// # Examples
///
/// ```rust
/// use docweave::ast::Position;
/// let pos = Position::lines(3, 7);
/// assert_eq!(pos.line_range(), (3, 7));
/// assert_eq!(pos.to_string(), "3:1-7:1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub start: Point,
    pub end: Point,
}

impl Position {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Position spanning whole lines, columns pinned to 1.
    pub fn lines(start_line: usize, end_line: usize) -> Self {
        Self {
            start: Point {
                line: start_line,
                column: 1,
                offset: 0,
            },
            end: Point {
                line: end_line,
                column: 1,
                offset: 0,
            },
        }
    }

    pub fn line_range(&self) -> (usize, usize) {
        (self.start.line, self.end.line)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// Discriminant of [`Node`], also used as the dispatch key for visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Document,
    Element,
    Content,
    Reference,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Document => "document",
            NodeType::Element => "element",
            NodeType::Content => "content",
            NodeType::Reference => "reference",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The root of a parsed document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantics: Option<Meta>,
    #[serde(default)]
    pub position: Position,
}

/// A tagged markup element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub attributes: Meta,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub position: Position,
}

/// Literal text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub position: Position,
}

/// A `protocol:path` reference. `resolved` is populated by the upstream
/// resolver; the engine never resolves anything itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub protocol: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub position: Position,
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Document(Document),
    Element(Element),
    Content(Content),
    Reference(Reference),
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Document(_) => NodeType::Document,
            Node::Element(_) => NodeType::Element,
            Node::Content(_) => NodeType::Content,
            Node::Reference(_) => NodeType::Reference,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Node::Document(d) => d.position,
            Node::Element(e) => e.position,
            Node::Content(c) => c.position,
            Node::Reference(r) => r.position,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Node::Document(d) => d.id.as_deref(),
            Node::Element(e) => e.id.as_deref(),
            Node::Content(c) => c.id.as_deref(),
            Node::Reference(r) => r.id.as_deref(),
        }
    }

    pub fn meta(&self) -> Option<&Meta> {
        match self {
            Node::Document(d) => d.meta.as_ref(),
            Node::Element(e) => e.meta.as_ref(),
            Node::Content(c) => c.meta.as_ref(),
            Node::Reference(r) => r.meta.as_ref(),
        }
    }

    /// Ordered children. Content and Reference nodes are leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document(d) => &d.children,
            Node::Element(e) => &e.children,
            Node::Content(_) | Node::Reference(_) => &[],
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_content(&self) -> Option<&Content> {
        match self {
            Node::Content(c) => Some(c),
            _ => None,
        }
    }

    /// Returns true if this is an element with the given tag.
    pub fn is_tag(&self, tag: &str) -> bool {
        matches!(self, Node::Element(e) if e.tag_name == tag)
    }

    /// Concatenated text of every Content node below (and including) this node.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use docweave::ast::builder::{element, text};
    /// let node = element("p").child(text("Hello, ")).child(element("b").child(text("world"))).into_node();
    /// assert_eq!(node.text_content(), "Hello, world");
    /// ```
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &Node, out: &mut String) {
    match node {
        Node::Content(c) => out.push_str(&c.value),
        Node::Reference(_) => {}
        Node::Document(_) | Node::Element(_) => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

impl Document {
    pub fn node_type(&self) -> NodeType {
        NodeType::Document
    }

    /// Parses a document from its JSON form (as produced by the resolver).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Element {
    /// Attribute value rendered as a string, if present.
    pub fn attr_str(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(value::display_string)
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            collect_text(child, &mut out);
        }
        out
    }
}

impl Reference {
    pub fn is_resolved(&self) -> bool {
        self.resolved.as_ref().is_some_and(|v| !v.is_null())
    }
}

/// Borrowed view of any node kind, including the document root.
///
/// `Document` is not a variant of [`Node`] when it is the root of a tree, so
/// traversal code works on `NodeRef` to treat all four kinds uniformly.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Document(&'a Document),
    Element(&'a Element),
    Content(&'a Content),
    Reference(&'a Reference),
}

impl<'a> NodeRef<'a> {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeRef::Document(_) => NodeType::Document,
            NodeRef::Element(_) => NodeType::Element,
            NodeRef::Content(_) => NodeType::Content,
            NodeRef::Reference(_) => NodeType::Reference,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            NodeRef::Document(d) => d.position,
            NodeRef::Element(e) => e.position,
            NodeRef::Content(c) => c.position,
            NodeRef::Reference(r) => r.position,
        }
    }

    pub fn children(&self) -> &'a [Node] {
        match *self {
            NodeRef::Document(d) => &d.children,
            NodeRef::Element(e) => &e.children,
            NodeRef::Content(_) | NodeRef::Reference(_) => &[],
        }
    }

    /// Tag name for elements.
    pub fn tag(&self) -> Option<&'a str> {
        match *self {
            NodeRef::Element(e) => Some(e.tag_name.as_str()),
            _ => None,
        }
    }
}

impl<'a> From<&'a Node> for NodeRef<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::Document(d) => NodeRef::Document(d),
            Node::Element(e) => NodeRef::Element(e),
            Node::Content(c) => NodeRef::Content(c),
            Node::Reference(r) => NodeRef::Reference(r),
        }
    }
}

impl<'a> From<&'a Document> for NodeRef<'a> {
    fn from(doc: &'a Document) -> Self {
        NodeRef::Document(doc)
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<Document> for Node {
    fn from(doc: Document) -> Self {
        Node::Document(doc)
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl From<Content> for Node {
    fn from(c: Content) -> Self {
        Node::Content(c)
    }
}

impl From<Reference> for Node {
    fn from(r: Reference) -> Self {
        Node::Reference(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_roundtrips_through_tagged_json() {
        let input = json!({
            "type": "element",
            "tagName": "section",
            "attributes": { "title": "Intro" },
            "position": { "start": { "line": 1, "column": 1 }, "end": { "line": 4, "column": 2 } },
            "children": [
                { "type": "content", "value": "text" },
                { "type": "reference", "protocol": "id", "path": "intro" }
            ]
        });
        let node: Node = serde_json::from_value(input).unwrap();
        assert_eq!(node.node_type(), NodeType::Element);
        assert_eq!(node.position().line_range(), (1, 4));
        assert_eq!(node.children()[1].node_type(), NodeType::Reference);

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["tagName"], "section");
        assert_eq!(back["children"][0]["type"], "content");
    }

    #[test]
    fn test_leaves_have_no_children() {
        let c = Node::Content(Content {
            value: "x".into(),
            ..Default::default()
        });
        assert!(c.children().is_empty());
        assert!(!c.is_tag("p"));
    }

    #[test]
    fn test_reference_resolution_flag() {
        let mut r = Reference {
            protocol: "file".into(),
            path: "a.md".into(),
            ..Default::default()
        };
        assert!(!r.is_resolved());
        r.resolved = Some(Value::Null);
        assert!(!r.is_resolved());
        r.resolved = Some(json!({"title": "A"}));
        assert!(r.is_resolved());
    }
}
