mod common;

use common::{failing_element_visitor, init_tracing, section_with_text};
use docweave::ast::builder::{document, element};
use docweave::ast::NodeType;
use docweave::diagnostics::ErrorRecordKind;
use docweave::runtime::options::ThresholdAction;
use docweave::visitor::{Flavor, FnVisitor};
use docweave::{TransformEngine, TransformOptions};
use serde_json::json;

fn disabled_records(engine: &TransformEngine) -> usize {
    engine
        .error_log()
        .iter()
        .filter(|r| r.kind == ErrorRecordKind::VisitorDisabled)
        .count()
}

#[test]
fn test_visitor_disabled_exactly_at_threshold() {
    init_tracing();
    let mut engine = TransformEngine::new();
    engine.register_visitor(failing_element_visitor("flaky", 0));
    let options = TransformOptions::new().with_cache(false).with_error_threshold(3);
    let doc = section_with_text("x");

    engine.transform_with(&doc, &options).unwrap();
    engine.transform_with(&doc, &options).unwrap();
    assert!(!engine.visitors().is_disabled("flaky"));
    assert_eq!(engine.visitors().error_count("flaky"), 2);
    assert_eq!(disabled_records(&engine), 0);

    engine.transform_with(&doc, &options).unwrap();
    assert!(engine.visitors().is_disabled("flaky"));
    assert_eq!(disabled_records(&engine), 1);
    assert!(engine
        .visitors()
        .visitors_for(NodeType::Element, Some("section"), Flavor::Sync)
        .is_empty());

    engine.transform_with(&doc, &options).unwrap();
    assert_eq!(disabled_records(&engine), 1);
    assert_eq!(engine.visitors().error_count("flaky"), 3);
}

#[test]
fn test_failures_within_one_transform_count() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(failing_element_visitor("flaky", 0));
    let doc = document()
        .child(element("a"))
        .child(element("b"))
        .child(element("c"))
        .child(element("d"))
        .build();
    engine
        .transform_with(&doc, &TransformOptions::new().with_error_threshold(2))
        .unwrap();

    let log = engine.error_log();
    let failed = log
        .iter()
        .filter(|r| r.kind == ErrorRecordKind::VisitorFailed)
        .count();
    assert_eq!(failed, 2);
    assert_eq!(disabled_records(&engine), 1);
}

#[test]
fn test_success_resets_the_count() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(FnVisitor::new("picky").on_element(|el, _| {
        if el.tag_name == "bad" {
            Err("bad tag".into())
        } else {
            Ok(None)
        }
    }));
    let doc = document()
        .child(element("bad"))
        .child(element("bad"))
        .child(element("good"))
        .child(element("bad"))
        .child(element("bad"))
        .build();
    engine
        .transform_with(&doc, &TransformOptions::new().with_error_threshold(3))
        .unwrap();
    assert!(!engine.visitors().is_disabled("picky"));
    assert_eq!(engine.visitors().error_count("picky"), 2);
}

#[test]
fn test_reenable_restores_dispatch() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(failing_element_visitor("flaky", 0));
    let options = TransformOptions::new().with_cache(false).with_error_threshold(1);
    engine.transform_with(&section_with_text("x"), &options).unwrap();
    assert!(engine.visitors().is_disabled("flaky"));

    assert!(engine.enable_visitor_by_name("flaky"));
    assert_eq!(engine.visitors().error_count("flaky"), 0);
    assert!(!engine.enable_visitor_by_name("flaky"));
    assert_eq!(
        engine
            .visitors()
            .visitors_for(NodeType::Element, None, Flavor::Sync)
            .len(),
        1
    );
}

#[test]
fn test_manual_disable_skips_visitor() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(FnVisitor::new("tagger").on_element(|_, _| Ok(Some(json!({"tagged": true})))));
    assert!(engine.disable_visitor_by_name("tagger"));
    assert!(!engine.disable_visitor_by_name("tagger"));
    let out = engine
        .transform_with(&section_with_text("x"), &TransformOptions::new().with_cache(false))
        .unwrap();
    assert!(out["children"][0].get("tagged").is_none());
}

#[test]
fn test_ignore_action_keeps_visitor_enabled() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(failing_element_visitor("flaky", 0));
    let options = TransformOptions::new()
        .with_cache(false)
        .with_error_threshold(1)
        .with_threshold_action(ThresholdAction::Ignore);
    engine.transform_with(&section_with_text("x"), &options).unwrap();
    engine.transform_with(&section_with_text("x"), &options).unwrap();
    assert!(!engine.visitors().is_disabled("flaky"));
    assert_eq!(engine.visitors().error_count("flaky"), 2);
    assert_eq!(disabled_records(&engine), 0);
}
