//!
//! # Overview
//!
//! This module defines the unified, `miette`-based diagnostic system for the
//! transform engine. Every failure the engine surfaces is a [`TransformError`];
//! loose-mode failures that are logged instead of raised are kept as
//! [`ErrorRecord`]s.
//!
//! # Error Construction
//!
//! - **Use `err_msg!` for simple, message-only errors.**
//!   - `err_msg!(Configuration, "unknown mode '{}'", raw)`
//! - **Use [`enhance_visitor_error`] when a visitor handler fails.** It keeps the
//!   handler's own error as the `source()` and tags the message with the visitor
//!   name, node type and position.
//! - **Use [`adapter_error`] when an output adapter fails.**
//!
//! Do not construct `ErrorContext` manually unless the helpers above do not fit.

use std::error::Error as StdError;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::ast::{NodeType, Position};
use crate::runtime::mode::ErrorVerbosity;

/// Boxed error returned by visitor handlers and output adapters.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Structured description of where a visitor failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorErrorContext {
    pub visitor_name: String,
    pub node_type: NodeType,
    pub node_position: Position,
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    /// Visitor/node coordinates, present for visitor failures.
    pub visitor: Option<VisitorErrorContext>,
    /// Traversal path at the point of failure, segments joined with `/`.
    pub path: Option<String>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    /// Returns an empty error context (no visitor, path, or help).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_help(help: impl Into<String>) -> Self {
        Self {
            help: Some(help.into()),
            ..Self::default()
        }
    }
}

/// Unified error type for every engine failure mode.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Visitor error: {message}")]
    Visitor {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxError>,
    },
    #[error("Adapter error: {message}")]
    Adapter {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxError>,
    },
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxError>,
    },
    #[error("Recursion depth limit of {limit} exceeded")]
    DepthLimit { limit: usize, ctx: ErrorContext },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<BoxError>,
    },
}

impl TransformError {
    pub fn ctx(&self) -> &ErrorContext {
        match self {
            TransformError::Visitor { ctx, .. }
            | TransformError::Adapter { ctx, .. }
            | TransformError::Configuration { ctx, .. }
            | TransformError::DepthLimit { ctx, .. }
            | TransformError::Internal { ctx, .. } => ctx,
        }
    }

    /// Structured visitor coordinates, if this error came from a visitor.
    pub fn visitor_context(&self) -> Option<&VisitorErrorContext> {
        self.ctx().visitor.as_ref()
    }

    pub fn is_visitor_error(&self) -> bool {
        matches!(self, TransformError::Visitor { .. })
    }

    pub fn is_adapter_error(&self) -> bool {
        matches!(self, TransformError::Adapter { .. })
    }

    fn code_suffix(&self) -> &'static str {
        match self {
            TransformError::Visitor { .. } => "visitor",
            TransformError::Adapter { .. } => "adapter",
            TransformError::Configuration { .. } => "configuration",
            TransformError::DepthLimit { .. } => "depth_limit",
            TransformError::Internal { .. } => "internal",
        }
    }
}

impl Diagnostic for TransformError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("docweave::{}", self.code_suffix())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }
}

/// Constructs a `TransformError` variant with a formatted message and no context.
///
/// Only the message-carrying variants (`Visitor`, `Adapter`, `Configuration`,
/// `Internal`) are supported.
///
/// ```rust
/// use docweave::err_msg;
/// let err = err_msg!(Configuration, "unknown mode '{}'", "lenient");
/// assert_eq!(err.to_string(), "Configuration error: unknown mode 'lenient'");
/// ```
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)+) => {
        $crate::TransformError::$variant {
            message: format!($($arg)+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

// ============================================================================
// ERROR ENHANCEMENT
// ============================================================================

/// Wraps a visitor's failure, tagging it with visitor/node coordinates.
///
/// The original error is kept intact as the `source()` of the result, so its
/// own chain survives.
pub fn enhance_visitor_error(
    source: BoxError,
    visitor_name: &str,
    node_type: NodeType,
    position: Position,
    path: String,
) -> TransformError {
    let message = format!(
        "{} [visitor={}] [node={}] [at={}:{}]",
        source, visitor_name, node_type, position.start.line, position.start.column
    );
    TransformError::Visitor {
        message,
        ctx: ErrorContext {
            visitor: Some(VisitorErrorContext {
                visitor_name: visitor_name.to_string(),
                node_type,
                node_position: position,
            }),
            path: Some(path),
            help: Some(format!(
                "visitor '{}' is disabled automatically after repeated failures; re-enable it with `enable_visitor_by_name`",
                visitor_name
            )),
        },
        source: Some(source),
    }
}

pub fn adapter_error(source: BoxError, format: Option<&str>) -> TransformError {
    let message = match format {
        Some(f) => format!("{} [format={}]", source, f),
        None => source.to_string(),
    };
    TransformError::Adapter {
        message,
        ctx: ErrorContext::none(),
        source: Some(source),
    }
}

// ============================================================================
// STRUCTURED ERROR RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorRecordKind {
    /// A visitor failed and the traversal continued without its result.
    VisitorFailed,
    /// A visitor reached the error threshold and was disabled.
    VisitorDisabled,
    /// The output adapter failed; the unadapted result was returned.
    AdapterFailed,
}

/// A loose-mode failure, logged instead of raised.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub kind: ErrorRecordKind,
    pub visitor: Option<String>,
    pub node_type: Option<NodeType>,
    pub position: Option<Position>,
    pub path: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn from_error(kind: ErrorRecordKind, error: &TransformError) -> Self {
        let ctx = error.ctx();
        Self {
            kind,
            visitor: ctx.visitor.as_ref().map(|v| v.visitor_name.clone()),
            node_type: ctx.visitor.as_ref().map(|v| v.node_type),
            position: ctx.visitor.as_ref().map(|v| v.node_position),
            path: ctx.path.clone(),
            message: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn visitor_disabled(name: &str, count: usize, threshold: usize) -> Self {
        Self {
            kind: ErrorRecordKind::VisitorDisabled,
            visitor: Some(name.to_string()),
            node_type: None,
            position: None,
            path: None,
            message: format!(
                "visitor '{}' disabled after {} errors (threshold {})",
                name, count, threshold
            ),
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Renders an error at the requested verbosity.
///
/// - `Minimal`: the top-level message.
/// - `Standard`: message plus traversal path.
/// - `Detailed`: message, path, help, and the full `source()` chain.
pub fn format_error(error: &TransformError, verbosity: ErrorVerbosity) -> String {
    let mut out = error.to_string();
    if verbosity == ErrorVerbosity::Minimal {
        return out;
    }
    if let Some(path) = &error.ctx().path {
        let _ = write!(out, "\n  path: {}", path);
    }
    if verbosity == ErrorVerbosity::Detailed {
        if let Some(help) = &error.ctx().help {
            let _ = write!(out, "\n  help: {}", help);
        }
        let mut cause = error.source();
        while let Some(err) = cause {
            let _ = write!(out, "\n  caused by: {}", err);
            cause = err.source();
        }
    }
    out
}
