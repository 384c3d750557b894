//! Shared extraction utilities for the built-in visitors.

use serde_json::{Map, Value};

use crate::ast::{Element, Node};

/// Copies entries of `source` into `target` without overwriting keys that are
/// already present.
pub fn merge_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// `camelCase`, `kebab-case` and `Title Case` keys to `snake_case`.
///
/// # Examples
///
/// ```rust
/// use docweave::visitors::helpers::to_snake_case;
/// assert_eq!(to_snake_case("publishedAt"), "published_at");
/// assert_eq!(to_snake_case("Reading-Time"), "reading_time");
/// assert_eq!(to_snake_case("already_snake"), "already_snake");
/// ```
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch == '-' || ch == ' ' || ch == '_' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Child elements of `element` with one of the given tags, in document order.
pub fn child_elements<'a>(element: &'a Element, tags: &'a [&'a str]) -> impl Iterator<Item = &'a Element> {
    element
        .children
        .iter()
        .filter_map(Node::as_element)
        .filter(move |e| tags.contains(&e.tag_name.as_str()))
}

/// Every element below `element` with one of the given tags, depth first.
pub fn descendant_elements<'a>(element: &'a Element, tags: &[&str]) -> Vec<&'a Element> {
    let mut out = Vec::new();
    collect_descendants(&element.children, tags, &mut out);
    out
}

fn collect_descendants<'a>(nodes: &'a [Node], tags: &[&str], out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(e) = node {
            if tags.contains(&e.tag_name.as_str()) {
                out.push(e);
            }
            collect_descendants(&e.children, tags, out);
        }
    }
}

/// Trimmed text of an element, whitespace runs collapsed.
pub fn clean_text(element: &Element) -> String {
    element
        .text_content()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes a link target: trims it and gives a bare `www.` host a scheme.
pub fn normalize_url(raw: &str) -> String {
    let url = raw.trim();
    if url.starts_with("www.") {
        format!("https://{}", url)
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}

pub fn is_external_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// The `class` attribute split on whitespace.
pub fn class_list(element: &Element) -> Vec<String> {
    element
        .attr_str("class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}
