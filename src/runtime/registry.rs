//! Visitor registry and per-visitor circuit breaker.
//!
//! The registry is the single source of truth for which visitors an engine
//! dispatches to, in which order, and which of them are currently disabled.
//!
//! ## Ordering Invariant
//! Visitors are kept sorted by descending base priority. Ties keep registration
//! order. Re-registering a name replaces the visitor in place and keeps its
//! original registration slot for tie-breaking.
//!
//! ## Breaker Invariant
//! Error counts and the disabled set live behind one lock, so counting a
//! failure and tripping the breaker happen atomically. A visitor is reported as
//! newly disabled exactly once per trip.
//!
//! Concurrent walks go through [`VisitorManager::admit`]: an invocation only
//! starts while the visitor's error count plus its calls in flight stay below
//! the threshold, so sibling failures can never push the count past it.
//!
//! ## Usage
//! ```rust
//! use docweave::ast::NodeType;
//! use docweave::runtime::registry::VisitorManager;
//! use docweave::visitor::{Flavor, FnVisitor};
//! let mut visitors = VisitorManager::new();
//! visitors.register_visitor(FnVisitor::new("low").with_priority(1).on_content(|_, _| Ok(None)));
//! visitors.register_visitor(FnVisitor::new("high").with_priority(9).on_content(|_, _| Ok(None)));
//! let names: Vec<_> = visitors
//!     .visitors_for(NodeType::Content, None, Flavor::Sync)
//!     .iter()
//!     .map(|v| v.name().to_string())
//!     .collect();
//! assert_eq!(names, ["high", "low"]);
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::ast::NodeType;
use crate::runtime::options::{ThresholdAction, DEFAULT_ERROR_THRESHOLD};
use crate::visitor::{handles, Flavor, Visitor};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Clone)]
struct RegisteredVisitor {
    visitor: Arc<dyn Visitor>,
    seq: u64,
}

#[derive(Debug)]
struct BreakerState {
    error_counts: HashMap<String, usize>,
    disabled: HashSet<String>,
    in_flight: HashMap<String, usize>,
    waiters: HashMap<String, Vec<Waker>>,
    threshold: usize,
    action: ThresholdAction,
}

impl BreakerState {
    fn has_room(&self, name: &str) -> bool {
        if self.action == ThresholdAction::Ignore {
            return true;
        }
        let count = self.error_counts.get(name).copied().unwrap_or(0);
        let in_flight = self.in_flight.get(name).copied().unwrap_or(0);
        count + in_flight < self.threshold
    }
}

/// Outcome of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCount {
    pub count: usize,
    /// True only on the failure that tripped the breaker.
    pub newly_disabled: bool,
}

pub struct VisitorManager {
    entries: Vec<RegisteredVisitor>,
    next_seq: u64,
    breaker: Mutex<BreakerState>,
}

impl std::fmt::Debug for VisitorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitorManager")
            .field("visitors", &self.visitor_names())
            .field("breaker", &*self.breaker.lock())
            .finish()
    }
}

impl Default for VisitorManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

impl VisitorManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
            breaker: Mutex::new(BreakerState {
                error_counts: HashMap::new(),
                disabled: HashSet::new(),
                in_flight: HashMap::new(),
                waiters: HashMap::new(),
                threshold: DEFAULT_ERROR_THRESHOLD,
                action: ThresholdAction::Disable,
            }),
        }
    }

    /// Registers a visitor, replacing any visitor with the same name.
    pub fn register_visitor(&mut self, visitor: impl Visitor + 'static) {
        self.register_shared(Arc::new(visitor));
    }

    pub fn register_shared(&mut self, visitor: Arc<dyn Visitor>) {
        let name = visitor.name().to_string();
        match self.entries.iter_mut().find(|e| e.visitor.name() == name) {
            Some(existing) => {
                tracing::debug!(visitor = %name, "replacing registered visitor");
                existing.visitor = visitor;
            }
            None => {
                self.entries.push(RegisteredVisitor {
                    visitor,
                    seq: self.next_seq,
                });
                self.next_seq += 1;
            }
        }
        self.entries.sort_by(|a, b| {
            b.visitor
                .priority()
                .base()
                .cmp(&a.visitor.priority().base())
                .then(a.seq.cmp(&b.seq))
        });
    }

    /// Removes a visitor and forgets its breaker state.
    pub fn unregister_visitor(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.visitor.name() != name);
        let mut breaker = self.breaker.lock();
        breaker.error_counts.remove(name);
        breaker.disabled.remove(name);
        self.entries.len() != before
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Visitor>> {
        self.entries
            .iter()
            .find(|e| e.visitor.name() == name)
            .map(|e| Arc::clone(&e.visitor))
    }

    /// All registered visitors in dispatch order, disabled ones included.
    pub fn visitors(&self) -> Vec<Arc<dyn Visitor>> {
        self.entries.iter().map(|e| Arc::clone(&e.visitor)).collect()
    }

    pub fn visitor_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.visitor.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        let mut breaker = self.breaker.lock();
        breaker.error_counts.clear();
        breaker.disabled.clear();
    }

    // ------------------------------------------------------------------------
    // Dispatch lookup
    // ------------------------------------------------------------------------

    /// Enabled visitors able to handle `node_type` on the given path, in
    /// dispatch order.
    ///
    /// For elements, `tag` refines the order with per-tag priorities. The
    /// re-sort is stable, so equal per-tag priorities keep the global order.
    pub fn visitors_for(
        &self,
        node_type: NodeType,
        tag: Option<&str>,
        flavor: Flavor,
    ) -> Vec<Arc<dyn Visitor>> {
        let disabled = self.breaker.lock().disabled.clone();
        let mut selected: Vec<Arc<dyn Visitor>> = self
            .entries
            .iter()
            .filter(|e| !disabled.contains(e.visitor.name()))
            .filter(|e| handles(e.visitor.as_ref(), node_type, flavor))
            .map(|e| Arc::clone(&e.visitor))
            .collect();
        if let Some(tag) = tag {
            selected.sort_by_key(|v| std::cmp::Reverse(v.priority().for_tag(tag)));
        }
        selected
    }
}

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

impl VisitorManager {
    pub fn configure_breaker(&self, threshold: usize, action: ThresholdAction) {
        let mut breaker = self.breaker.lock();
        breaker.threshold = threshold.max(1);
        breaker.action = action;
    }

    /// Counts one failure and trips the breaker when the count reaches the
    /// threshold.
    pub fn increment_error_count(&self, name: &str) -> ErrorCount {
        let mut breaker = self.breaker.lock();
        let count = {
            let entry = breaker.error_counts.entry(name.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        let newly_disabled = breaker.action == ThresholdAction::Disable
            && count >= breaker.threshold
            && breaker.disabled.insert(name.to_string());
        ErrorCount {
            count,
            newly_disabled,
        }
    }

    pub fn reset_error_count(&self, name: &str) {
        self.breaker.lock().error_counts.remove(name);
    }

    pub fn error_count(&self, name: &str) -> usize {
        self.breaker
            .lock()
            .error_counts
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn threshold(&self) -> usize {
        self.breaker.lock().threshold
    }

    /// Returns true if the visitor was enabled before this call.
    pub fn disable_visitor(&self, name: &str) -> bool {
        self.breaker.lock().disabled.insert(name.to_string())
    }

    /// Re-enables a visitor and clears its error count.
    ///
    /// Returns true if the visitor was disabled before this call.
    pub fn enable_visitor(&self, name: &str) -> bool {
        let mut breaker = self.breaker.lock();
        breaker.error_counts.remove(name);
        breaker.disabled.remove(name)
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.breaker.lock().disabled.contains(name)
    }

    pub fn disabled_visitors(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breaker.lock().disabled.iter().cloned().collect();
        names.sort();
        names
    }

    /// Waits for a slot to invoke `name`.
    ///
    /// Resolves to `None` once the visitor is disabled. The returned
    /// [`InFlight`] guard must be held until the invocation has been settled.
    pub fn admit<'a>(&'a self, name: &'a str) -> Admission<'a> {
        Admission { manager: self, name }
    }
}

// ============================================================================
// ADMISSION
// ============================================================================

#[must_use = "an admission does nothing unless awaited"]
pub struct Admission<'a> {
    manager: &'a VisitorManager,
    name: &'a str,
}

impl<'a> Future for Admission<'a> {
    type Output = Option<InFlight<'a>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut breaker = self.manager.breaker.lock();
        if breaker.disabled.contains(self.name) {
            return Poll::Ready(None);
        }
        if breaker.has_room(self.name) {
            *breaker.in_flight.entry(self.name.to_string()).or_insert(0) += 1;
            return Poll::Ready(Some(InFlight {
                manager: self.manager,
                name: self.name,
            }));
        }
        breaker
            .waiters
            .entry(self.name.to_string())
            .or_default()
            .push(cx.waker().clone());
        Poll::Pending
    }
}

/// One admitted invocation. Dropping it frees the slot and wakes waiters.
pub struct InFlight<'a> {
    manager: &'a VisitorManager,
    name: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let waiters = {
            let mut breaker = self.manager.breaker.lock();
            if let Some(n) = breaker.in_flight.get_mut(self.name) {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    breaker.in_flight.remove(self.name);
                }
            }
            breaker.waiters.remove(self.name).unwrap_or_default()
        };
        for waker in waiters {
            waker.wake();
        }
    }
}
