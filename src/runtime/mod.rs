//! Runtime state of a transform: options, error policy, contexts, the visitor
//! registry and the result cache.
//!
//! Everything here is owned by a [`crate::engine::TransformEngine`] or created
//! per call. There is no process-wide state.

pub mod cache;
pub mod context;
pub mod graph;
pub mod mode;
pub mod options;
pub mod path;
pub mod registry;
pub mod variables;
