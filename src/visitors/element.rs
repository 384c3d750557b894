//! Generic element processing.
//!
//! For every element: interpolate `${}` placeholders in attributes, run custom
//! converters, coerce configured numeric/boolean attributes, pull `data-*` and
//! `meta` values into a `meta` bag and split `class` into `classes`. A per-tag
//! special handler can then amend the output.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::ast::value::{coerce_bool, coerce_number};
use crate::ast::{Element, Node};
use crate::diagnostics::BoxError;
use crate::runtime::context::TransformContext;
use crate::runtime::variables::resolve_value;
use crate::visitor::{ElementHandler, Priority, VisitResult, Visitor};
use crate::visitors::helpers::{class_list, clean_text, merge_missing};

pub type AttributeConverter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Amends the processed output of one element in place.
pub type SpecialHandler =
    Arc<dyn Fn(&Element, &TransformContext, &mut Map<String, Value>) -> Result<(), BoxError> + Send + Sync>;

/// How much of an element's children the visitor itself summarizes. Child
/// results from the traversal are attached by the engine either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildRecursion {
    #[default]
    Skip,
    /// Adds the element's collapsed text as `text`.
    Text,
    /// Adds `childTags`: tag name and text of each direct child element.
    Shallow,
}

#[derive(Clone)]
pub struct ElementProcessingConfig {
    pub numeric_attributes: Vec<String>,
    pub boolean_attributes: Vec<String>,
    pub converters: HashMap<String, AttributeConverter>,
    pub interpolate: bool,
    pub extract_metadata: bool,
    pub special_handlers: HashMap<String, SpecialHandler>,
    pub child_recursion: ChildRecursion,
    pub priority: i64,
}

impl Default for ElementProcessingConfig {
    fn default() -> Self {
        let names = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            numeric_attributes: names(&["width", "height", "colspan", "rowspan", "start", "level"]),
            boolean_attributes: names(&["hidden", "disabled", "checked", "controls", "autoplay"]),
            converters: HashMap::new(),
            interpolate: true,
            extract_metadata: true,
            special_handlers: HashMap::new(),
            child_recursion: ChildRecursion::Skip,
            priority: 10,
        }
    }
}

impl fmt::Debug for ElementProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementProcessingConfig")
            .field("numeric_attributes", &self.numeric_attributes)
            .field("boolean_attributes", &self.boolean_attributes)
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .field("interpolate", &self.interpolate)
            .field("extract_metadata", &self.extract_metadata)
            .field("special_handlers", &self.special_handlers.keys().collect::<Vec<_>>())
            .field("child_recursion", &self.child_recursion)
            .finish()
    }
}

impl ElementProcessingConfig {
    pub fn with_converter<F>(mut self, attribute: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.converters.insert(attribute.into(), Arc::new(f));
        self
    }

    pub fn with_special_handler<F>(mut self, tag: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Element, &TransformContext, &mut Map<String, Value>) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.special_handlers.insert(tag.into(), Arc::new(f));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementProcessingVisitor {
    config: ElementProcessingConfig,
}

impl ElementProcessingVisitor {
    pub fn new(config: ElementProcessingConfig) -> Self {
        Self { config }
    }

    fn process_attribute(&self, name: &str, raw: &Value, context: &TransformContext) -> Value {
        let mut value = if self.config.interpolate {
            resolve_value(raw, &context.variables)
        } else {
            raw.clone()
        };
        if let Some(convert) = self.config.converters.get(name) {
            return convert(&value);
        }
        if let Value::String(s) = &value {
            if self.config.numeric_attributes.iter().any(|n| n == name) {
                if let Some(number) = coerce_number(s) {
                    value = number;
                }
            } else if self.config.boolean_attributes.iter().any(|n| n == name) {
                if let Some(flag) = coerce_bool(s) {
                    value = Value::Bool(flag);
                }
            }
        }
        value
    }
}

impl Visitor for ElementProcessingVisitor {
    fn name(&self) -> &str {
        "element-processing"
    }

    fn priority(&self) -> Priority {
        Priority::Fixed(self.config.priority)
    }

    fn as_element_handler(&self) -> Option<&dyn ElementHandler> {
        Some(self)
    }
}

impl ElementHandler for ElementProcessingVisitor {
    fn visit_element(&self, element: &Element, context: &TransformContext) -> VisitResult {
        let mut attributes = Map::new();
        let mut meta = Map::new();

        for (name, raw) in &element.attributes {
            let value = self.process_attribute(name, raw, context);
            if self.config.extract_metadata {
                if let Some(key) = name.strip_prefix("data-") {
                    meta.insert(key.to_string(), value);
                    continue;
                }
                if name == "meta" {
                    if let Value::Object(map) = &value {
                        merge_missing(&mut meta, map);
                        continue;
                    }
                }
            }
            if name != "class" {
                attributes.insert(name.clone(), value);
            }
        }
        if self.config.extract_metadata {
            if let Some(node_meta) = &element.meta {
                merge_missing(&mut meta, node_meta);
            }
        }

        let mut out = Map::new();
        out.insert("type".into(), json!("element"));
        out.insert("tagName".into(), json!(element.tag_name));
        if let Some(id) = &element.id {
            out.insert("id".into(), json!(id));
        }
        out.insert("attributes".into(), Value::Object(attributes));
        let classes = class_list(element);
        if !classes.is_empty() {
            out.insert("classes".into(), json!(classes));
        }
        if !meta.is_empty() {
            out.insert("meta".into(), Value::Object(meta));
        }

        match self.config.child_recursion {
            ChildRecursion::Skip => {}
            ChildRecursion::Text => {
                out.insert("text".into(), json!(clean_text(element)));
            }
            ChildRecursion::Shallow => {
                let tags: Vec<Value> = element
                    .children
                    .iter()
                    .filter_map(Node::as_element)
                    .map(|c| json!({ "tagName": c.tag_name, "text": clean_text(c) }))
                    .collect();
                out.insert("childTags".into(), Value::Array(tags));
            }
        }

        if let Some(handler) = self.config.special_handlers.get(&element.tag_name) {
            handler(element, context, &mut out)?;
        }
        Ok(Some(Value::Object(out)))
    }
}
