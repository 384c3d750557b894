//! Nested-context graph.
//!
//! Some consumers need contexts that know both their parent and their nested
//! children (bidirectional propagation). Storing those links inside the
//! contexts would create cycles, so the graph is an arena: contexts live in a
//! vector and link to each other by [`ContextId`].
//!
//! This is the one place where contexts are mutated in place, and only through
//! the arena.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::runtime::context::{create_child_context, deep_clone_context, TransformContext};
use crate::runtime::variables::Variables;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(usize);

impl ContextId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct GraphNode {
    context: TransformContext,
    parent: Option<ContextId>,
    nested: BTreeMap<String, ContextId>,
}

#[derive(Debug, Clone, Default)]
pub struct ContextGraph {
    nodes: Vec<GraphNode>,
}

impl ContextGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph holding a single parentless context.
    pub fn with_root(context: TransformContext) -> (Self, ContextId) {
        let mut graph = Self::new();
        let id = graph.insert(context, None);
        (graph, id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert(&mut self, context: TransformContext, parent: Option<ContextId>) -> ContextId {
        let id = ContextId(self.nodes.len());
        self.nodes.push(GraphNode {
            context,
            parent,
            nested: BTreeMap::new(),
        });
        id
    }

    /// Adds a parentless context.
    pub fn add_root(&mut self, context: TransformContext) -> ContextId {
        self.insert(context, None)
    }

    /// Derives a child of `parent` under `segment` and links it both ways.
    ///
    /// A previous nested context under the same segment is unlinked (it stays in
    /// the arena but is no longer reachable from `parent`).
    pub fn nest(
        &mut self,
        parent: ContextId,
        segment: &str,
        overrides: Option<&Variables>,
    ) -> Option<ContextId> {
        let child = create_child_context(&self.nodes.get(parent.0)?.context, segment, overrides);
        let id = self.insert(child, Some(parent));
        self.nodes[parent.0].nested.insert(segment.to_string(), id);
        Some(id)
    }

    pub fn get(&self, id: ContextId) -> Option<&TransformContext> {
        self.nodes.get(id.0).map(|n| &n.context)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut TransformContext> {
        self.nodes.get_mut(id.0).map(|n| &mut n.context)
    }

    pub fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn nested(&self, id: ContextId, segment: &str) -> Option<ContextId> {
        self.nodes.get(id.0)?.nested.get(segment).copied()
    }

    pub fn nested_segments(&self, id: ContextId) -> Vec<String> {
        self.nodes
            .get(id.0)
            .map(|n| n.nested.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Binds a variable on one context in place.
    pub fn set_variable(&mut self, id: ContextId, name: impl Into<String>, value: Value) -> bool {
        match self.get_mut(id) {
            Some(ctx) => {
                ctx.variables.insert(name.into(), value);
                true
            }
            None => false,
        }
    }

    /// Variable lookup: local bindings first, then (if `search_parent`) each
    /// ancestor in turn. The first hit wins.
    pub fn lookup_variable(&self, id: ContextId, name: &str, search_parent: bool) -> Option<&Value> {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.nodes.get(cur.0)?;
            if let Some(value) = node.context.variables.get(name) {
                return Some(value);
            }
            if !search_parent {
                return None;
            }
            current = node.parent;
        }
        None
    }

    /// Pushes a result upward: appends it to the parent's `parent_results`.
    pub fn propagate_to_parent(&mut self, id: ContextId, result: Value) -> Option<ContextId> {
        let parent = self.parent(id)?;
        self.nodes[parent.0].context.parent_results.push_back(result);
        Some(parent)
    }

    /// Pushes a result downward into every nested context of `id` (one level).
    pub fn propagate_to_nested(&mut self, id: ContextId, result: &Value) -> usize {
        let targets: Vec<ContextId> = match self.nodes.get(id.0) {
            Some(node) => node.nested.values().copied().collect(),
            None => return 0,
        };
        for target in &targets {
            self.nodes[target.0]
                .context
                .parent_results
                .push_back(result.clone());
        }
        targets.len()
    }

    /// Context ids of `id` and everything nested below it, parents first.
    pub fn subtree(&self, id: ContextId) -> Vec<ContextId> {
        let mut out = Vec::new();
        if self.nodes.get(id.0).is_none() {
            return out;
        }
        let mut queue = vec![id];
        while let Some(cur) = queue.pop() {
            out.push(cur);
            let node = &self.nodes[cur.0];
            queue.extend(node.nested.values().rev().copied());
        }
        out
    }

    /// Deep-copies the subtree rooted at `id` into a fresh graph.
    ///
    /// Every context is deep-cloned and all back-references are rewired to the
    /// new ids; the copied root has no parent.
    pub fn deep_clone_nested(&self, id: ContextId) -> Option<(ContextGraph, ContextId)> {
        self.nodes.get(id.0)?;
        let ids = self.subtree(id);
        let remap: BTreeMap<ContextId, ContextId> = ids
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, ContextId(new)))
            .collect();

        let nodes = ids
            .iter()
            .map(|old| {
                let node = &self.nodes[old.0];
                GraphNode {
                    context: deep_clone_context(&node.context),
                    parent: if *old == id {
                        None
                    } else {
                        node.parent.and_then(|p| remap.get(&p).copied())
                    },
                    nested: node
                        .nested
                        .iter()
                        .filter_map(|(seg, child)| remap.get(child).map(|c| (seg.clone(), *c)))
                        .collect(),
                }
            })
            .collect();

        Some((ContextGraph { nodes }, ContextId(0)))
    }
}
