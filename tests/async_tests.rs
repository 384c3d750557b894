mod common;

use std::time::Duration;

use common::{failing_element_visitor, sample_document, section_with_text, Counter};
use docweave::ast::builder::{document, element, text};
use docweave::diagnostics::ErrorRecordKind;
use docweave::visitor::{FnVisitor, VisitResult};
use docweave::{TransformEngine, TransformOptions};
use serde_json::json;

fn no_cache() -> TransformOptions {
    TransformOptions::new().with_cache(false)
}

#[tokio::test]
async fn test_sync_only_visitors_give_identical_results() {
    let engine = TransformEngine::with_builtin_visitors();
    let doc = sample_document();
    let sync = engine.transform_with(&doc, &no_cache()).unwrap();
    let asynchronous = engine.transform_async_with(&doc, &no_cache()).await.unwrap();
    assert_eq!(sync, asynchronous);
}

#[tokio::test]
async fn test_async_handler_takes_precedence() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(
        FnVisitor::new("both")
            .on_content(|_, _| Ok(Some(json!("sync"))))
            .on_content_async(|c, _| async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(Some(json!(format!("async:{}", c.value))))
            }),
    );
    let doc = section_with_text("x");
    let out = engine.transform_async_with(&doc, &no_cache()).await.unwrap();
    assert_eq!(out["children"][0]["children"][0], "async:x");

    let out = engine.transform_with(&doc, &no_cache()).unwrap();
    assert_eq!(out["children"][0]["children"][0], "sync");
}

#[tokio::test]
async fn test_async_only_visitor_is_invisible_to_sync_path() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(
        FnVisitor::new("async-only").on_element_async(|el, _| async move {
            Ok(Some(json!({ "tag": el.tag_name })))
        }),
    );
    let doc = document().child(element("p")).build();
    let out = engine.transform_async_with(&doc, &no_cache()).await.unwrap();
    assert_eq!(out["children"][0]["tag"], "p");
    let out = engine.transform_with(&doc, &no_cache()).unwrap();
    assert!(out["children"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_children_keep_document_order() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(FnVisitor::new("slow-first").on_content_async(|c, ctx| async move {
        let delay = if c.value == "first" { 20 } else { 1 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(Some(json!({ "value": c.value, "path": ctx.path_string() })))
    }));
    let doc = document()
        .child(element("p").child(text("first")).child(text("second")))
        .build();
    let out = engine.transform_async(&doc).await.unwrap();
    let children = &out["children"][0]["children"];
    assert_eq!(children[0]["value"], "first");
    assert_eq!(children[1]["value"], "second");
    assert_eq!(children[1]["path"], "document/element[p]/content[1]");
}

#[tokio::test]
async fn test_strict_mode_async() {
    let mut engine = TransformEngine::new();
    engine.register_visitor(failing_element_visitor("broken", 0));
    let err = engine
        .transform_async_with(&section_with_text("x"), &no_cache().strict())
        .await
        .unwrap_err();
    assert!(err.is_visitor_error());

    let out = engine
        .transform_async_with(&section_with_text("x"), &no_cache())
        .await
        .unwrap();
    assert_eq!(out["type"], "document");
    assert_eq!(engine.error_log().len(), 1);
}

#[tokio::test]
async fn test_async_results_are_cached() {
    let engine = TransformEngine::with_builtin_visitors();
    let doc = sample_document();
    let first = engine.transform_async(&doc).await.unwrap();
    assert_eq!(engine.cache_len(), 1);
    let second = engine.transform(&doc).unwrap();
    assert_eq!(first, second);
}

fn yielding_failure(name: &str, calls: Counter) -> FnVisitor {
    FnVisitor::new(name).on_element_async(move |el, _| {
        let calls = calls.clone();
        async move {
            calls.hit();
            tokio::task::yield_now().await;
            let result: VisitResult = Err(format!("cannot process <{}>", el.tag_name).into());
            result
        }
    })
}

#[tokio::test]
async fn test_concurrent_siblings_stop_at_threshold() {
    let calls = Counter::new();
    let mut engine = TransformEngine::new();
    engine.register_visitor(yielding_failure("flaky", calls.clone()));
    let doc = (0..6)
        .fold(document(), |doc, _| doc.child(element("p")))
        .build();

    let out = engine.transform_async_with(&doc, &no_cache()).await.unwrap();
    assert_eq!(out["children"].as_array().unwrap().len(), 6);
    assert_eq!(calls.get(), 3);
    assert_eq!(engine.visitors().error_count("flaky"), 3);
    assert!(engine.visitors().is_disabled("flaky"));

    let log = engine.error_log();
    let count = |kind: ErrorRecordKind| log.iter().filter(|r| r.kind == kind).count();
    assert_eq!(count(ErrorRecordKind::VisitorFailed), 3);
    assert_eq!(count(ErrorRecordKind::VisitorDisabled), 1);
}

#[tokio::test]
async fn test_successful_async_visitor_runs_on_every_sibling() {
    let calls = Counter::new();
    let seen = calls.clone();
    let mut engine = TransformEngine::new();
    engine.register_visitor(FnVisitor::new("steady").on_element_async(move |el, _| {
        let seen = seen.clone();
        async move {
            seen.hit();
            tokio::task::yield_now().await;
            let result: VisitResult = Ok(Some(json!({ "tag": el.tag_name })));
            result
        }
    }));
    let doc = (0..6)
        .fold(document(), |doc, _| doc.child(element("li")))
        .build();

    let out = engine.transform_async_with(&doc, &no_cache()).await.unwrap();
    assert_eq!(calls.get(), 6);
    assert_eq!(out["children"][5]["tag"], "li");
    assert!(engine.error_log().is_empty());
}
