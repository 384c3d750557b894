//! docweave: a visitor-driven transform engine for parsed document trees.
//!
//! A [`TransformEngine`] walks a [`ast::Document`] depth first. At every node it
//! dispatches to the registered visitors in priority order, merges what they
//! return, recurses into the children and hands the assembled result to an
//! optional output adapter.

pub use crate::diagnostics::{BoxError, ErrorContext, TransformError};
pub use crate::engine::TransformEngine;
pub use crate::runtime::options::TransformOptions;

pub mod adapter;
pub mod ast;
pub mod diagnostics;
pub mod engine;
pub mod prelude;
pub mod runtime;
pub mod visitor;
pub mod visitors;
