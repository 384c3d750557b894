//! Document outline.
//!
//! Top-level children are split into `sections` (outline tags) and `elements`
//! (everything else). Outline tags carry a level; a flat run such as
//! `section, subsection, subsection, section` folds into a tree where each
//! entry owns the following entries of a deeper level. Outline tags nested
//! inside an entry's own markup become its children too.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::ast::{Document, Element, Node};
use crate::runtime::context::TransformContext;
use crate::visitor::{DocumentHandler, Priority, VisitResult, Visitor};
use crate::visitors::helpers::{clean_text, merge_missing};

const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

#[derive(Debug, Clone)]
pub struct DocumentStructureConfig {
    /// Outline tags and their levels; lower is shallower.
    pub levels: Vec<(String, usize)>,
    pub include_elements: bool,
    pub priority: i64,
}

impl Default for DocumentStructureConfig {
    fn default() -> Self {
        Self {
            levels: vec![
                ("section".to_string(), 1),
                ("subsection".to_string(), 2),
                ("paragraph".to_string(), 3),
            ],
            include_elements: true,
            priority: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutlineEntry {
    tag_name: String,
    level: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    children: Vec<OutlineEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStructureVisitor {
    config: DocumentStructureConfig,
}

impl DocumentStructureVisitor {
    pub fn new(config: DocumentStructureConfig) -> Self {
        Self { config }
    }

    fn level_of(&self, tag: &str) -> Option<usize> {
        self.config
            .levels
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, level)| *level)
    }

    fn outline(&self, nodes: &[Node]) -> Vec<OutlineEntry> {
        let flat = nodes
            .iter()
            .filter_map(Node::as_element)
            .filter_map(|el| {
                self.level_of(&el.tag_name).map(|level| OutlineEntry {
                    tag_name: el.tag_name.clone(),
                    level,
                    id: el.id.clone().or_else(|| el.attr_str("id")),
                    title: title_of(el),
                    children: self.outline(&el.children),
                })
            })
            .collect();
        fold_levels(flat)
    }
}

/// Nests every entry under the closest preceding entry of a shallower level.
fn fold_levels(entries: Vec<OutlineEntry>) -> Vec<OutlineEntry> {
    let mut out = Vec::new();
    let mut iter = entries.into_iter().peekable();
    while let Some(mut head) = iter.next() {
        let mut deeper = Vec::new();
        while let Some(next) = iter.next_if(|n| n.level > head.level) {
            deeper.push(next);
        }
        head.children.extend(fold_levels(deeper));
        out.push(head);
    }
    out
}

fn title_of(el: &Element) -> Option<String> {
    el.attr_str("title").or_else(|| {
        el.children
            .iter()
            .filter_map(Node::as_element)
            .find(|c| HEADINGS.contains(&c.tag_name.as_str()))
            .map(clean_text)
    })
}

fn document_meta(doc: &Document) -> Map<String, Value> {
    let mut meta = doc.meta.clone().unwrap_or_default();
    for source in [&doc.metadata, &doc.semantics].into_iter().flatten() {
        merge_missing(&mut meta, source);
    }
    meta
}

impl Visitor for DocumentStructureVisitor {
    fn name(&self) -> &str {
        "document-structure"
    }

    fn priority(&self) -> Priority {
        Priority::Fixed(self.config.priority)
    }

    fn as_document_handler(&self) -> Option<&dyn DocumentHandler> {
        Some(self)
    }
}

impl DocumentHandler for DocumentStructureVisitor {
    fn visit_document(&self, document: &Document, _context: &TransformContext) -> VisitResult {
        let sections = serde_json::to_value(self.outline(&document.children))?;
        let mut out = Map::new();
        out.insert("type".into(), json!("document"));
        if let Some(id) = &document.id {
            out.insert("id".into(), json!(id));
        }
        out.insert("meta".into(), Value::Object(document_meta(document)));
        out.insert("sections".into(), sections);
        if self.config.include_elements {
            let elements: Vec<Value> = document
                .children
                .iter()
                .filter_map(Node::as_element)
                .filter(|el| self.level_of(&el.tag_name).is_none())
                .map(|el| {
                    let mut entry = json!({ "tagName": el.tag_name });
                    if let Some(id) = el.id.clone().or_else(|| el.attr_str("id")) {
                        entry["id"] = json!(id);
                    }
                    entry
                })
                .collect();
            out.insert("elements".into(), Value::Array(elements));
        }
        Ok(Some(Value::Object(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::{document, element, text};
    use crate::runtime::context::create_root_context;
    use crate::runtime::options::TransformOptions;
    use std::sync::Arc;

    fn visit(doc: &Document) -> Value {
        let ctx = create_root_context(Arc::new(doc.clone()), Arc::new(TransformOptions::new()));
        DocumentStructureVisitor::default()
            .visit_document(doc, &ctx)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_flat_levels_fold_into_outline() {
        let doc = document()
            .child(element("section").attr("title", "One"))
            .child(element("subsection").child(element("h2").child(text(" Sub "))))
            .child(element("paragraph"))
            .child(element("section").attr("title", "Two"))
            .child(element("figure").id("fig-1"))
            .build();
        let out = visit(&doc);
        let sections = out["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0]["title"], "One");
        assert_eq!(sections[0]["children"][0]["title"], "Sub");
        assert_eq!(sections[0]["children"][0]["children"][0]["tagName"], "paragraph");
        assert_eq!(sections[1]["title"], "Two");
        assert_eq!(out["elements"], json!([{"tagName": "figure", "id": "fig-1"}]));
    }

    #[test]
    fn test_nested_markup_is_part_of_outline() {
        let doc = document()
            .child(element("section").child(element("subsection").attr("title", "Inner")))
            .build();
        let out = visit(&doc);
        assert_eq!(out["sections"][0]["children"][0]["title"], "Inner");
    }

    #[test]
    fn test_meta_sources_do_not_overwrite() {
        let doc = document()
            .id("d1")
            .meta("title", "From meta")
            .metadata("title", "From metadata")
            .metadata("author", "Ada")
            .semantics("topic", "engines")
            .build();
        let out = visit(&doc);
        assert_eq!(out["id"], "d1");
        assert_eq!(
            out["meta"],
            json!({"title": "From meta", "author": "Ada", "topic": "engines"})
        );
    }
}
