//! Resolved-reference handling.
//!
//! [`ReferenceVisitor`] renders a resolved reference as a typed link;
//! [`InlineReferenceVisitor`] splices the resolved payload into the output.
//! Both ignore unresolved references. Payloads may themselves contain
//! serialized reference nodes (`{"type": "reference", ...}`); those are
//! processed the same way, all the way down.

use serde_json::{json, Map, Value};

use crate::ast::value::display_string;
use crate::ast::Reference;
use crate::runtime::context::TransformContext;
use crate::visitor::{Priority, ReferenceHandler, VisitResult, Visitor};
use crate::visitors::helpers::is_external_url;

#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    /// Process references nested inside resolved payloads.
    pub resolve_nested: bool,
    /// Payload field used as the link title.
    pub title_field: String,
    pub priority: i64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            resolve_nested: true,
            title_field: "title".to_string(),
            priority: 10,
        }
    }
}

/// Link target for a `protocol:path` pair and whether it leaves the document
/// set.
///
/// # Examples
///
/// ```rust
/// use docweave::visitors::reference::link_target;
/// assert_eq!(link_target("id", "intro"), ("#intro".to_string(), false));
/// assert_eq!(link_target("file", "./docs/a.md"), ("docs/a.md".to_string(), false));
/// assert_eq!(link_target("https", "//example.com"), ("https://example.com".to_string(), true));
/// assert_eq!(link_target("isbn", "978-0"), ("isbn:978-0".to_string(), false));
/// ```
pub fn link_target(protocol: &str, path: &str) -> (String, bool) {
    match protocol {
        "id" => (format!("#{}", path.trim_start_matches('#')), false),
        "file" => (path.trim_start_matches("./").to_string(), false),
        "http" | "https" => {
            let href = if path.starts_with("//") {
                format!("{}:{}", protocol, path)
            } else {
                format!("{}://{}", protocol, path)
            };
            let external = is_external_url(&href);
            (href, external)
        }
        other => (format!("{}:{}", other, path), false),
    }
}

fn link_type(protocol: &str) -> &'static str {
    match protocol {
        "id" => "anchor",
        "file" => "file",
        "http" | "https" => "external",
        _ => "reference",
    }
}

/// A serialized reference node inside a payload.
fn as_nested_reference(value: &Value) -> Option<Reference> {
    let map = value.as_object()?;
    if map.get("type")?.as_str()? != "reference" {
        return None;
    }
    Some(Reference {
        protocol: map.get("protocol")?.as_str()?.to_string(),
        path: map.get("path")?.as_str()?.to_string(),
        resolved: map.get("resolved").cloned(),
        id: map.get("id").and_then(Value::as_str).map(str::to_string),
        ..Reference::default()
    })
}

/// Rewrites every resolved nested reference in `value` with `render`.
fn rewrite_nested(value: &Value, render: &dyn Fn(&Reference) -> Option<Value>) -> Value {
    if let Some(reference) = as_nested_reference(value) {
        if let Some(rendered) = render(&reference) {
            return rendered;
        }
        return value.clone();
    }
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| rewrite_nested(v, render)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), rewrite_nested(v, render)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

// ============================================================================
// LINK MODE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReferenceVisitor {
    config: ReferenceConfig,
}

impl ReferenceVisitor {
    pub fn new(config: ReferenceConfig) -> Self {
        Self { config }
    }

    fn render(&self, reference: &Reference) -> Option<Value> {
        let resolved = reference.resolved.as_ref().filter(|v| !v.is_null())?;
        let (href, external) = link_target(&reference.protocol, &reference.path);
        let title = match resolved {
            Value::Object(map) => map
                .get(&self.config.title_field)
                .map(display_string)
                .unwrap_or_else(|| reference.path.clone()),
            Value::String(s) => s.clone(),
            _ => reference.path.clone(),
        };
        let mut link = json!({
            "type": "link",
            "linkType": link_type(&reference.protocol),
            "href": href,
            "title": title,
            "external": external,
            "protocol": reference.protocol,
            "path": reference.path,
        });
        if self.config.resolve_nested {
            // Links gathered by the resolver are themselves references.
            if let Some(links) = resolved.get("links") {
                link["links"] = rewrite_nested(links, &|r| self.render(r));
            }
        }
        Some(link)
    }
}

impl Visitor for ReferenceVisitor {
    fn name(&self) -> &str {
        "reference"
    }

    fn priority(&self) -> Priority {
        Priority::Fixed(self.config.priority)
    }

    fn as_reference_handler(&self) -> Option<&dyn ReferenceHandler> {
        Some(self)
    }
}

impl ReferenceHandler for ReferenceVisitor {
    fn visit_reference(&self, reference: &Reference, _context: &TransformContext) -> VisitResult {
        Ok(self.render(reference))
    }
}

// ============================================================================
// INLINE MODE
// ============================================================================

#[derive(Debug, Clone)]
pub struct InlineReferenceVisitor {
    config: ReferenceConfig,
}

impl Default for InlineReferenceVisitor {
    fn default() -> Self {
        Self::new(ReferenceConfig {
            priority: 15,
            ..ReferenceConfig::default()
        })
    }
}

impl InlineReferenceVisitor {
    pub fn new(config: ReferenceConfig) -> Self {
        Self { config }
    }

    fn render(&self, reference: &Reference) -> Option<Value> {
        let resolved = reference.resolved.as_ref().filter(|v| !v.is_null())?;
        if self.config.resolve_nested {
            Some(rewrite_nested(resolved, &|r| self.render(r)))
        } else {
            Some(resolved.clone())
        }
    }
}

impl Visitor for InlineReferenceVisitor {
    fn name(&self) -> &str {
        "reference-inline"
    }

    fn priority(&self) -> Priority {
        Priority::Fixed(self.config.priority)
    }

    fn as_reference_handler(&self) -> Option<&dyn ReferenceHandler> {
        Some(self)
    }
}

impl ReferenceHandler for InlineReferenceVisitor {
    fn visit_reference(&self, reference: &Reference, _context: &TransformContext) -> VisitResult {
        Ok(self.render(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::reference;
    use crate::ast::Document;
    use crate::runtime::context::create_root_context;
    use crate::runtime::options::TransformOptions;
    use std::sync::Arc;

    fn ctx() -> TransformContext {
        create_root_context(Arc::new(Document::default()), Arc::new(TransformOptions::new()))
    }

    #[test]
    fn test_unresolved_references_yield_nothing() {
        let r = reference("id", "intro").build();
        assert!(ReferenceVisitor::default().visit_reference(&r, &ctx()).unwrap().is_none());
        assert!(InlineReferenceVisitor::default().visit_reference(&r, &ctx()).unwrap().is_none());
    }

    #[test]
    fn test_link_mode() {
        let r = reference("http", "example.com/a")
            .resolved(json!({"title": "Example"}))
            .build();
        let link = ReferenceVisitor::default().visit_reference(&r, &ctx()).unwrap().unwrap();
        assert_eq!(link["href"], "http://example.com/a");
        assert_eq!(link["linkType"], "external");
        assert_eq!(link["external"], true);
        assert_eq!(link["title"], "Example");

        let r = reference("id", "intro").resolved("Introduction").build();
        let link = ReferenceVisitor::default().visit_reference(&r, &ctx()).unwrap().unwrap();
        assert_eq!(link["href"], "#intro");
        assert_eq!(link["title"], "Introduction");
        assert_eq!(link["external"], false);
    }

    #[test]
    fn test_inline_mode_processes_nested_references() {
        let payload = json!({
            "body": "see below",
            "related": [
                {"type": "reference", "protocol": "id", "path": "x", "resolved": {"text": "X"}},
                {"type": "reference", "protocol": "id", "path": "y"}
            ]
        });
        let r = reference("file", "a.md").resolved(payload.clone()).build();
        let out = InlineReferenceVisitor::default().visit_reference(&r, &ctx()).unwrap().unwrap();
        assert_eq!(out["related"][0], json!({"text": "X"}));
        assert_eq!(out["related"][1]["type"], "reference");

        let flat = InlineReferenceVisitor::new(ReferenceConfig {
            resolve_nested: false,
            ..Default::default()
        });
        let out = flat.visit_reference(&r, &ctx()).unwrap().unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn test_link_mode_renders_nested_links() {
        let r = reference("file", "./guide.md")
            .resolved(json!({
                "title": "Guide",
                "links": [{"type": "reference", "protocol": "id", "path": "setup", "resolved": "Setup"}]
            }))
            .build();
        let link = ReferenceVisitor::default().visit_reference(&r, &ctx()).unwrap().unwrap();
        assert_eq!(link["href"], "guide.md");
        assert_eq!(link["links"][0]["href"], "#setup");
        assert_eq!(link["links"][0]["title"], "Setup");
    }
}
