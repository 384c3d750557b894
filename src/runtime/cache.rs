//! Content-hash validated result cache.
//!
//! Entries are keyed by the document id when it has one, otherwise by its
//! structural hash. Every probe recomputes the hash of the tree being
//! transformed together with a fingerprint of the options that shape the
//! result; an entry whose stored hash no longer matches is evicted, so neither
//! a mutated document nor a changed option set can be served a stale result.
//!
//! The output format is not part of the fingerprint: entries hold the result
//! before the adapter runs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::ast::{Document, Meta, Node, Position};
use crate::runtime::options::TransformOptions;

#[derive(Debug, Clone)]
pub struct CacheItem {
    pub key: String,
    pub content_hash: String,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TransformCache {
    entries: Mutex<HashMap<String, CacheItem>>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key and current content hash for a document transformed with
    /// the given effective options.
    pub fn key_for(document: &Document, options: &TransformOptions) -> (String, String) {
        let hash = document_hash(document);
        let content_hash = digest(&json!([hash, options_hash(options)]));
        let key = document.id.clone().unwrap_or(hash);
        (key, content_hash)
    }

    /// Returns the cached result if its stored hash matches `content_hash`.
    pub fn lookup(&self, key: &str, content_hash: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(item) if item.content_hash == content_hash => {
                tracing::trace!(key, "cache hit");
                Some(item.result.clone())
            }
            Some(_) => {
                tracing::trace!(key, "cache entry stale, evicting");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn store(&self, key: String, content_hash: String, result: Value) {
        tracing::trace!(key = %key, "cache store");
        self.entries.lock().insert(
            key.clone(),
            CacheItem {
                key,
                content_hash,
                result,
                timestamp: Utc::now(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<CacheItem> {
        self.entries.lock().get(key).cloned()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ============================================================================
// STRUCTURAL HASHING
// ============================================================================

/// SHA-256 over the structural fingerprint of a document.
pub fn document_hash(document: &Document) -> String {
    let children: Vec<Value> = document
        .children
        .iter()
        .map(|c| Value::String(node_hash(c)))
        .collect();
    let fingerprint = json!({
        "type": "document",
        "lines": lines(&document.position),
        "version": version(document.meta.as_ref()),
        "children": children,
    });
    digest(&fingerprint)
}

/// SHA-256 over the structural fingerprint of any node, children included.
pub fn node_hash(node: &Node) -> String {
    let mut fingerprint = Map::new();
    fingerprint.insert("type".into(), json!(node.node_type().as_str()));
    fingerprint.insert("lines".into(), lines(&node.position()));
    fingerprint.insert("version".into(), version(node.meta()));
    match node {
        Node::Document(_) => {}
        Node::Element(el) => {
            fingerprint.insert("tagName".into(), json!(el.tag_name));
            fingerprint.insert("attributes".into(), Value::Object(el.attributes.clone()));
        }
        Node::Content(c) => {
            fingerprint.insert("content".into(), json!(c.value));
        }
        Node::Reference(r) => {
            fingerprint.insert("protocol".into(), json!(r.protocol));
            fingerprint.insert("path".into(), json!(r.path));
            fingerprint.insert("resolved".into(), r.resolved.clone().unwrap_or(Value::Null));
        }
    }
    let children: Vec<Value> = node
        .children()
        .iter()
        .map(|c| Value::String(node_hash(c)))
        .collect();
    fingerprint.insert("children".into(), Value::Array(children));
    digest(&Value::Object(fingerprint))
}

/// SHA-256 over the options that change what a traversal produces.
pub fn options_hash(options: &TransformOptions) -> String {
    // Identity of the merge function; distinct closures never share an entry.
    let custom_merge = options
        .custom_merge_fn
        .as_ref()
        .map(|f| Arc::as_ptr(&f.0) as *const () as usize);
    let fingerprint = json!({
        "mode": options.mode(),
        "variables": options.variables,
        "mergeReturnValues": options.merge_return_values(),
        "deepMerge": options.deep_merge(),
        "mergeArrays": options.merge_arrays(),
        "conflictStrategy": options.conflict_strategy(),
        "customMergeFn": custom_merge,
        "maxDepth": options.max_depth,
    });
    digest(&fingerprint)
}

fn lines(position: &Position) -> Value {
    let (start, end) = position.line_range();
    json!([start, end])
}

fn version(meta: Option<&Meta>) -> Value {
    meta.and_then(|m| m.get("version")).cloned().unwrap_or(Value::Null)
}

fn digest(fingerprint: &Value) -> String {
    // serde_json::Map is ordered by key, so serialization is deterministic.
    let bytes = fingerprint.to_string();
    format!("{:x}", Sha256::digest(bytes.as_bytes()))
}
