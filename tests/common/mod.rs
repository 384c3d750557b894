//! Shared fixtures for the integration tests: sample trees, recording
//! visitors and tracing setup.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docweave::ast::builder::{document, element, reference, text};
use docweave::ast::Document;
use docweave::visitor::{FnVisitor, Priority};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Installs a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// `document > section[title=Intro] > (p > "Hello", reference id:intro)`.
pub fn sample_document() -> Document {
    document()
        .child(
            element("section")
                .attr("title", "Intro")
                .lines(1, 4)
                .child(element("p").lines(2, 2).child(text("Hello").lines(2, 2)))
                .child(reference("id", "intro").resolved(json!({"title": "Introduction"}))),
        )
        .build()
}

/// `document > section > content`.
pub fn section_with_text(body: &str) -> Document {
    document()
        .child(element("section").child(text(body)))
        .build()
}

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Element visitor that counts calls and returns `output` for every element.
pub fn counting_element_visitor(name: &str, priority: i64, counter: Counter, output: Value) -> FnVisitor {
    FnVisitor::new(name)
        .with_priority(priority)
        .on_element(move |_, _| {
            counter.hit();
            Ok(Some(output.clone()))
        })
}

/// Element visitor that always fails.
pub fn failing_element_visitor(name: &str, priority: impl Into<Priority>) -> FnVisitor {
    FnVisitor::new(name)
        .with_priority(priority)
        .on_element(|el, _| Err(format!("cannot process <{}>", el.tag_name).into()))
}

/// One observation per visited node: `(path, parent_results.len())`.
pub type Observations = Arc<Mutex<Vec<(Vec<String>, usize)>>>;

/// Visitor recording the context it sees at every node kind, contributing
/// nothing.
pub fn path_recorder(name: &str, seen: Observations) -> FnVisitor {
    let doc_seen = Arc::clone(&seen);
    let el_seen = Arc::clone(&seen);
    let content_seen = Arc::clone(&seen);
    FnVisitor::new(name)
        .on_document(move |_, ctx| {
            doc_seen
                .lock()
                .push((ctx.path.iter().cloned().collect(), ctx.parent_results.len()));
            Ok(None)
        })
        .on_element(move |_, ctx| {
            el_seen
                .lock()
                .push((ctx.path.iter().cloned().collect(), ctx.parent_results.len()));
            Ok(None)
        })
        .on_content(move |_, ctx| {
            content_seen
                .lock()
                .push((ctx.path.iter().cloned().collect(), ctx.parent_results.len()));
            Ok(None)
        })
}
