//! Normalized document metadata.
//!
//! Collects `meta`, `metadata` and `semantics` of the document (earlier
//! sources win), plus selected context variables, into one `meta` bag.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::ast::Document;
use crate::runtime::context::TransformContext;
use crate::visitor::{DocumentHandler, Priority, VisitResult, Visitor};
use crate::visitors::helpers::{merge_missing, to_snake_case};

#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Context variables copied into the bag (dotted paths allowed). The key is
    /// the last path segment.
    pub include_variables: Vec<String>,
    /// Key renames applied after collection.
    pub rename: HashMap<String, String>,
    /// Adds `generatedAt` (RFC 3339, UTC).
    pub timestamp: bool,
    /// Rewrites every key to `snake_case` (renames are applied first).
    pub normalize_keys: bool,
    pub priority: i64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            include_variables: Vec::new(),
            rename: HashMap::new(),
            timestamp: false,
            normalize_keys: false,
            priority: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataVisitor {
    config: MetadataConfig,
}

impl MetadataVisitor {
    pub fn new(config: MetadataConfig) -> Self {
        Self { config }
    }

    fn collect(&self, document: &Document, context: &TransformContext) -> Map<String, Value> {
        let mut bag = Map::new();
        for source in [&document.meta, &document.metadata, &document.semantics]
            .into_iter()
            .flatten()
        {
            merge_missing(&mut bag, source);
        }

        for path in &self.config.include_variables {
            if let Some(value) = context.lookup(path) {
                let key = path.rsplit('.').next().unwrap_or(path);
                bag.entry(key.to_string()).or_insert_with(|| value.clone());
            }
        }

        let mut bag: Map<String, Value> = bag
            .into_iter()
            .map(|(key, value)| {
                let key = self.config.rename.get(&key).cloned().unwrap_or(key);
                let key = if self.config.normalize_keys {
                    to_snake_case(&key)
                } else {
                    key
                };
                (key, value)
            })
            .collect();

        if self.config.timestamp {
            let key = if self.config.normalize_keys {
                "generated_at"
            } else {
                "generatedAt"
            };
            bag.insert(
                key.to_string(),
                json!(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        bag
    }
}

impl Visitor for MetadataVisitor {
    fn name(&self) -> &str {
        "metadata"
    }

    fn priority(&self) -> Priority {
        Priority::Fixed(self.config.priority)
    }

    fn as_document_handler(&self) -> Option<&dyn DocumentHandler> {
        Some(self)
    }
}

impl DocumentHandler for MetadataVisitor {
    fn visit_document(&self, document: &Document, context: &TransformContext) -> VisitResult {
        Ok(Some(json!({ "meta": self.collect(document, context) })))
    }
}
