//! Tag-specific extraction.
//!
//! Recognizes a fixed family of tags and produces a normalized `meta` object
//! for each, tagged with `meta.kind`. Any other tag yields nothing, so the next
//! visitor in line handles it.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::ast::value::coerce_number;
use crate::ast::{Element, Node};
use crate::runtime::context::TransformContext;
use crate::visitor::{ElementHandler, Priority, VisitResult, Visitor};
use crate::visitors::helpers::{
    child_elements, class_list, clean_text, descendant_elements, is_external_url, normalize_url,
};

/// Special element families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    Image,
    Link,
    Code,
    Table,
    List,
    Quote,
    Media,
}

impl SpecialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialKind::Image => "image",
            SpecialKind::Link => "link",
            SpecialKind::Code => "code",
            SpecialKind::Table => "table",
            SpecialKind::List => "list",
            SpecialKind::Quote => "quote",
            SpecialKind::Media => "media",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpecialElementConfig {
    /// Tag to family mapping.
    pub tags: HashMap<String, SpecialKind>,
    pub priority: i64,
}

impl Default for SpecialElementConfig {
    fn default() -> Self {
        let tags = [
            ("img", SpecialKind::Image),
            ("image", SpecialKind::Image),
            ("a", SpecialKind::Link),
            ("link", SpecialKind::Link),
            ("code", SpecialKind::Code),
            ("pre", SpecialKind::Code),
            ("table", SpecialKind::Table),
            ("ul", SpecialKind::List),
            ("ol", SpecialKind::List),
            ("list", SpecialKind::List),
            ("blockquote", SpecialKind::Quote),
            ("quote", SpecialKind::Quote),
            ("video", SpecialKind::Media),
            ("audio", SpecialKind::Media),
        ]
        .into_iter()
        .map(|(t, k)| (t.to_string(), k))
        .collect();
        Self { tags, priority: 20 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpecialElementVisitor {
    config: SpecialElementConfig,
}

impl SpecialElementVisitor {
    pub fn new(config: SpecialElementConfig) -> Self {
        Self { config }
    }
}

impl Visitor for SpecialElementVisitor {
    fn name(&self) -> &str {
        "special-element"
    }

    fn priority(&self) -> Priority {
        Priority::Fixed(self.config.priority)
    }

    fn as_element_handler(&self) -> Option<&dyn ElementHandler> {
        Some(self)
    }
}

impl ElementHandler for SpecialElementVisitor {
    fn visit_element(&self, element: &Element, _context: &TransformContext) -> VisitResult {
        let kind = match self.config.tags.get(&element.tag_name) {
            Some(kind) => *kind,
            None => return Ok(None),
        };
        let mut meta = match kind {
            SpecialKind::Image => image_meta(element),
            SpecialKind::Link => link_meta(element),
            SpecialKind::Code => code_meta(element),
            SpecialKind::Table => table_meta(element),
            SpecialKind::List => list_meta(element),
            SpecialKind::Quote => quote_meta(element),
            SpecialKind::Media => media_meta(element),
        };
        meta.insert("kind".into(), json!(kind.as_str()));
        let mut out = json!({
            "type": "element",
            "tagName": element.tag_name,
            "meta": meta,
        });
        if let Some(id) = &element.id {
            out["id"] = json!(id);
        }
        Ok(Some(out))
    }
}

// ============================================================================
// EXTRACTORS
// ============================================================================

fn insert_attr(meta: &mut Map<String, Value>, element: &Element, name: &str) {
    if let Some(value) = element.attr_str(name) {
        meta.insert(name.to_string(), json!(value));
    }
}

fn insert_dimension(meta: &mut Map<String, Value>, element: &Element, name: &str) {
    if let Some(raw) = element.attr_str(name) {
        meta.insert(
            name.to_string(),
            coerce_number(&raw).unwrap_or(Value::String(raw)),
        );
    }
}

fn image_meta(element: &Element) -> Map<String, Value> {
    let mut meta = Map::new();
    insert_attr(&mut meta, element, "src");
    meta.insert(
        "alt".into(),
        json!(element.attr_str("alt").unwrap_or_default()),
    );
    insert_attr(&mut meta, element, "title");
    insert_dimension(&mut meta, element, "width");
    insert_dimension(&mut meta, element, "height");
    meta
}

fn link_meta(element: &Element) -> Map<String, Value> {
    let mut meta = Map::new();
    let url = element
        .attr_str("href")
        .or_else(|| element.attr_str("url"))
        .map(|u| normalize_url(&u))
        .unwrap_or_default();
    meta.insert("external".into(), json!(is_external_url(&url)));
    meta.insert("url".into(), json!(url));
    meta.insert("text".into(), json!(clean_text(element)));
    insert_attr(&mut meta, element, "title");
    meta
}

fn code_meta(element: &Element) -> Map<String, Value> {
    let language = element
        .attr_str("language")
        .or_else(|| element.attr_str("lang"))
        .or_else(|| {
            class_list(element)
                .iter()
                .find_map(|c| c.strip_prefix("language-").map(str::to_string))
        });
    let mut meta = Map::new();
    meta.insert("language".into(), language.map(Value::String).unwrap_or(Value::Null));
    meta.insert("text".into(), json!(element.text_content()));
    meta
}

fn row_cells(row: &Element) -> Vec<String> {
    child_elements(row, &["td", "th", "cell"])
        .map(clean_text)
        .collect()
}

fn table_meta(element: &Element) -> Map<String, Value> {
    let rows = descendant_elements(element, &["tr", "row"]);
    let mut headers: Vec<String> = Vec::new();
    let mut matrix: Vec<Vec<String>> = Vec::new();
    for row in rows {
        // A header row has at least one cell and every cell is a `th`.
        let header_row = {
            let mut cells = row.children.iter().filter_map(Node::as_element).peekable();
            cells.peek().is_some() && cells.all(|c| c.tag_name == "th")
        };
        if headers.is_empty() && matrix.is_empty() && header_row {
            headers = row_cells(row);
        } else {
            matrix.push(row_cells(row));
        }
    }
    let columns = matrix
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    let mut meta = Map::new();
    meta.insert("headers".into(), json!(headers));
    meta.insert("rows".into(), json!(matrix));
    meta.insert("columns".into(), json!(columns));
    meta
}

fn list_meta(element: &Element) -> Map<String, Value> {
    let ordered = element.tag_name == "ol"
        || element
            .attr_str("ordered")
            .is_some_and(|v| v != "false");
    let items: Vec<String> = descendant_elements(element, &["li", "item"])
        .into_iter()
        .map(|li| {
            // Text of the item itself, nested lists excluded.
            li.children
                .iter()
                .filter(|c| !matches!(c, Node::Element(e) if matches!(e.tag_name.as_str(), "ul" | "ol" | "list")))
                .map(Node::text_content)
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    let start = element
        .attr_str("start")
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(1);
    let mut meta = Map::new();
    meta.insert("ordered".into(), json!(ordered));
    meta.insert("start".into(), json!(start));
    meta.insert("items".into(), json!(items));
    meta
}

fn quote_meta(element: &Element) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("text".into(), json!(clean_text(element)));
    let cite = element.attr_str("cite").or_else(|| {
        descendant_elements(element, &["cite"])
            .first()
            .map(|c| clean_text(c))
    });
    meta.insert("cite".into(), cite.map(Value::String).unwrap_or(Value::Null));
    meta
}

fn media_meta(element: &Element) -> Map<String, Value> {
    let src = element.attr_str("src").or_else(|| {
        child_elements(element, &["source"])
            .find_map(|s| s.attr_str("src"))
    });
    let mut meta = Map::new();
    meta.insert(
        "mediaType".into(),
        json!(if element.tag_name == "audio" { "audio" } else { "video" }),
    );
    meta.insert("src".into(), src.map(Value::String).unwrap_or(Value::Null));
    meta.insert(
        "controls".into(),
        json!(element.attributes.contains_key("controls")),
    );
    insert_dimension(&mut meta, element, "width");
    insert_dimension(&mut meta, element, "height");
    meta
}
