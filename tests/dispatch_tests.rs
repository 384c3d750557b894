mod common;

use std::sync::Arc;

use common::{
    counting_element_visitor, failing_element_visitor, init_tracing, path_recorder, section_with_text,
    Counter, Observations,
};
use docweave::ast::builder::{document, element, text};
use docweave::diagnostics::ErrorRecordKind;
use docweave::visitor::{FnVisitor, Priority};
use docweave::{TransformEngine, TransformError, TransformOptions};
use parking_lot::Mutex;
use serde_json::json;

fn no_cache() -> TransformOptions {
    TransformOptions::new().with_cache(false)
}

#[test]
fn test_equal_priority_keeps_registration_order() {
    init_tracing();
    for order in [["first", "second"], ["second", "first"]] {
        let mut engine = TransformEngine::new();
        for name in order {
            engine.register_visitor(
                FnVisitor::new(name)
                    .with_priority(5)
                    .on_element(move |_, _| Ok(Some(json!({ "by": name })))),
            );
        }
        let out = engine
            .transform_with(&section_with_text("x"), &no_cache())
            .unwrap();
        assert_eq!(out["children"][0]["by"], order[0]);
    }
}

#[test]
fn test_higher_priority_runs_first_and_stops_dispatch() {
    let low = Counter::new();
    let high = Counter::new();
    let mut engine = TransformEngine::new();
    engine.register_visitor(counting_element_visitor("low", 1, low.clone(), json!({"v": "low"})));
    engine.register_visitor(counting_element_visitor("high", 9, high.clone(), json!({"v": "high"})));

    let out = engine
        .transform_with(&section_with_text("x"), &no_cache())
        .unwrap();
    assert_eq!(out["children"][0]["v"], "high");
    assert_eq!(high.get(), 1);
    assert_eq!(low.get(), 0);
}

#[test]
fn test_per_tag_priority() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(
        FnVisitor::new("generic")
            .with_priority(10)
            .on_element(|_, _| Ok(Some(json!({"by": "generic"})))),
    );
    engine.register_visitor(
        FnVisitor::new("tables")
            .with_priority(Priority::per_tag(0, [("table", 50)]))
            .on_element(|_, _| Ok(Some(json!({"by": "tables"})))),
    );
    let doc = document().child(element("table")).child(element("p")).build();
    let out = engine.transform_with(&doc, &no_cache()).unwrap();
    assert_eq!(out["children"][0]["by"], "tables");
    assert_eq!(out["children"][1]["by"], "generic");
}

#[test]
fn test_context_paths_grow_one_segment_per_level() {
    let seen: Observations = Arc::new(Mutex::new(Vec::new()));
    let mut engine = TransformEngine::new();
    engine.register_visitor(path_recorder("recorder", Arc::clone(&seen)));

    engine
        .transform_with(&section_with_text("hello"), &no_cache())
        .unwrap();

    let seen = seen.lock().clone();
    assert_eq!(
        seen,
        vec![
            (vec!["document".to_string()], 0),
            (vec!["document".to_string(), "element[section]".to_string()], 1),
            (
                vec![
                    "document".to_string(),
                    "element[section]".to_string(),
                    "content[0]".to_string()
                ],
                2
            ),
        ]
    );
}

#[test]
fn test_children_see_parent_results() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(
        FnVisitor::new("section")
            .on_element(|el, _| Ok(Some(json!({ "tag": el.tag_name })))),
    );
    engine.register_visitor(FnVisitor::new("text").on_content(|c, ctx| {
        let parent = ctx.nearest_ancestor("element").cloned().unwrap_or_default();
        Ok(Some(json!({ "text": c.value, "parentTag": parent["tag"] })))
    }));
    let out = engine
        .transform_with(&section_with_text("hi"), &no_cache())
        .unwrap();
    assert_eq!(out["children"][0]["children"][0]["parentTag"], "section");
}

#[test]
fn test_structure_preserved_without_visitors() {
    let engine = TransformEngine::new();
    let doc = document()
        .child(element("section").child(element("p").child(text("x"))))
        .child(element("aside"))
        .build();
    let out = engine.transform(&doc).unwrap();
    assert_eq!(out["type"], "document");
    let children = out["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["tagName"], "section");
    assert_eq!(children[0]["children"][0]["tagName"], "p");
}

#[test]
fn test_strict_mode_aborts_with_enhanced_error() {
    let ok = Counter::new();
    let mut engine = TransformEngine::new();
    engine.register_visitor(failing_element_visitor("broken", 10));
    engine.register_visitor(counting_element_visitor("ok", 1, ok.clone(), json!({"ok": true})));

    let err = engine
        .transform_with(&section_with_text("x"), &no_cache().strict())
        .unwrap_err();
    assert!(err.is_visitor_error());
    let ctx = err.visitor_context().unwrap();
    assert_eq!(ctx.visitor_name, "broken");
    assert!(err.to_string().contains("[visitor=broken]"));
    assert!(err.to_string().contains("cannot process <section>"));
    assert_eq!(ok.get(), 0);
    assert!(engine.error_log().is_empty());
}

#[test]
fn test_loose_mode_continues_and_logs() {
    init_tracing();
    let mut engine = TransformEngine::new();
    engine.register_visitor(failing_element_visitor("broken", 10));
    engine.register_visitor(FnVisitor::new("ok").with_priority(1).on_element(|_, _| Ok(Some(json!({"ok": true})))));

    let out = engine
        .transform_with(&section_with_text("x"), &no_cache().loose())
        .unwrap();
    assert_eq!(out["children"][0]["ok"], true);

    let log = engine.take_error_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, ErrorRecordKind::VisitorFailed);
    assert_eq!(log[0].visitor.as_deref(), Some("broken"));
    assert_eq!(log[0].path.as_deref(), Some("document/element[section]"));
}

#[test]
fn test_panicking_visitor_is_a_failure() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(FnVisitor::new("panics").on_element(|_, _| panic!("exploded")));
    let err = engine
        .transform_with(&section_with_text("x"), &no_cache().strict())
        .unwrap_err();
    assert!(matches!(err, TransformError::Visitor { .. }));
    assert!(err.to_string().contains("panic: exploded"));
}

#[test]
fn test_output_adapter_runs_once_on_final_result() {
    let calls = Counter::new();
    let seen = calls.clone();
    let mut engine = TransformEngine::new();
    engine.set_output_adapter(
        move |v: serde_json::Value,
              _: &docweave::runtime::context::TransformContext|
              -> Result<serde_json::Value, docweave::BoxError> {
            seen.hit();
            Ok(json!({ "output": v["type"] }))
        },
    );
    let out = engine.transform(&section_with_text("x")).unwrap();
    assert_eq!(out, json!({"output": "document"}));
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_failing_adapter_follows_mode() {
    let mut engine = TransformEngine::new();
    engine.set_output_adapter(
        |_: serde_json::Value,
         _: &docweave::runtime::context::TransformContext|
         -> Result<serde_json::Value, docweave::BoxError> { Err("disk full".into()) },
    );
    let doc = section_with_text("x");

    let err = engine.transform_with(&doc, &no_cache().strict()).unwrap_err();
    assert!(err.is_adapter_error());

    let out = engine.transform_with(&doc, &no_cache()).unwrap();
    assert_eq!(out["type"], "document");
    assert_eq!(engine.error_log()[0].kind, ErrorRecordKind::AdapterFailed);
}

#[test]
fn test_variables_flow_into_context() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(
        FnVisitor::new("greeter").on_content(|c, ctx| Ok(Some(json!(ctx.interpolate(&c.value))))),
    );
    let options = no_cache().with_variable("user", json!({"name": "Ada"}));
    let out = engine
        .transform_with(&section_with_text("Hi ${user.name}"), &options)
        .unwrap();
    assert_eq!(out["children"][0]["children"][0], "Hi Ada");
}
