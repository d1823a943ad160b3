//! Integration tests for expression compilation and event routing
//!
//! These tests drive the public API end to end: surface text through the
//! translator, compiler and evaluator, and events through loader-built stages.

use branchline_rs::expression::{translate, CompiledExpression, Value};
use branchline_rs::pipeline::{ChannelSender, Event, ExpressionError, FieldMap, Processor};
use branchline_rs::stage::{
    BranchTable, Decision, ExpressionCache, StageLoader, WhenProcessor, PORT_SUCCESS, PORT_TRUNK,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

fn event(value: serde_json::Value) -> Event {
    Event::from_json(value).unwrap()
}

fn eval(surface: &str, value: serde_json::Value) -> Result<bool, ExpressionError> {
    CompiledExpression::compile_surface(surface)
        .unwrap()
        .evaluate_bool(&event(value))
}

fn table(branches: &[&str]) -> BranchTable {
    branches
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.to_string()))
        .collect()
}

// ============================================================================
// Expression Tests
// ============================================================================

#[test]
fn test_not_in_with_bare_field_name() {
    assert_eq!(
        eval("'_mumu' not in tags", json!({"tags": ["_grokparsefailure"]})),
        Ok(true)
    );
}

#[test]
fn test_chained_field_reference() {
    assert_eq!(
        eval(
            "[location][city] == 'Paris'",
            json!({"location": {"city": "Paris"}})
        ),
        Ok(true)
    );
}

#[test]
fn test_regex_branch() {
    let compiled = CompiledExpression::compile_surface("[way] =~ '(RECEIVE|SEND)'").unwrap();
    assert!(compiled
        .evaluate_bool(&event(json!({"way": "SEND"})))
        .unwrap());
    assert!(!compiled
        .evaluate_bool(&event(json!({"way": "OTHER"})))
        .unwrap());
}

#[test]
fn test_registered_len_builtin() {
    assert_eq!(eval("[testInt] == len(4)", json!({"testInt": 1})), Ok(true));
    assert_eq!(
        CompiledExpression::compile_surface("[testInt] == size(4)").unwrap_err(),
        ExpressionError::UnknownFunction {
            name: "size".to_string()
        }
    );
}

#[test]
fn test_not_in_equals_explicit_negation() {
    let data = json!({"x": 3, "tags": ["a", "b"]});
    for (implicit, explicit) in [
        ("[x] not in (1, 2)", "!([x] in (1, 2))"),
        ("'a' not in [tags]", "!('a' in [tags])"),
    ] {
        assert_eq!(translate(implicit).unwrap(), translate(explicit).unwrap());
        assert_eq!(eval(implicit, data.clone()), eval(explicit, data.clone()));
    }
}

#[test]
fn test_translation_is_idempotent_on_normalized_text() {
    for surface in [
        "[a][b] == \"x\" and not ([c] > 1)",
        "\"_mumu\" not in [tags] or [way] =~ /SEND/",
    ] {
        let once = translate(surface).unwrap();
        assert_eq!(translate(&once).unwrap(), once);
    }
}

#[test]
fn test_compile_once_evaluate_many() {
    let compiled = CompiledExpression::compile_surface("[status] >= 500 and [method] == 'GET'")
        .unwrap();
    assert_eq!(
        compiled.variables(),
        &["status".to_string(), "method".to_string()]
    );

    let cases = [
        (json!({"status": 503, "method": "GET"}), true),
        (json!({"status": 200, "method": "GET"}), false),
        (json!({"status": 500, "method": "POST"}), false),
    ];
    for (data, expected) in cases {
        assert_eq!(compiled.evaluate_bool(&event(data)).unwrap(), expected);
    }
}

#[test]
fn test_short_circuit_does_not_resolve_fields() {
    assert_eq!(eval("true || [absent] == 1", json!({})), Ok(true));
    assert_eq!(eval("false and [absent] == 1", json!({})), Ok(false));
    assert_eq!(
        eval("false || [absent] == 1", json!({})),
        Err(ExpressionError::FieldNotFound {
            path: "absent".to_string()
        })
    );
}

#[test]
fn test_trailing_operator_is_syntax_error() {
    for bad in ["[a] ==", "[a] == 1 and", "not", "[a] == (1"] {
        let err = CompiledExpression::compile_surface(bad).unwrap_err();
        assert!(err.is_compile_time(), "{} gave {:?}", bad, err);
    }
}

#[test]
fn test_field_map_and_hashmap_bindings_agree() {
    let compiled = CompiledExpression::compile("[x] * 2 > [y]").unwrap();

    let mut map = FieldMap::new();
    map.insert("x".to_string(), json!(6));
    map.insert("y".to_string(), json!(11));

    let mut bindings = HashMap::new();
    bindings.insert("x".to_string(), Value::Number(6.0));
    bindings.insert("y".to_string(), Value::Number(11.0));

    assert!(compiled.evaluate_bool(&map).unwrap());
    assert!(compiled.evaluate_bool(&bindings).unwrap());
}

// ============================================================================
// Router Tests
// ============================================================================

#[test]
fn test_router_ordering() {
    let when = WhenProcessor::configure("order", table(&["[x] > 10", "true"])).unwrap();
    assert_eq!(when.decide(&event(json!({"x": 20}))), Decision::Routed(0));
}

#[test]
fn test_router_fallthrough() {
    let when = WhenProcessor::configure("fall", table(&["[x] > 10"])).unwrap();
    assert_eq!(when.decide(&event(json!({"x": 5}))), Decision::Unmatched);
}

#[test]
fn test_load_and_run_when_stage() {
    let yaml = r#"
name: by-direction
kind: when
expressions:
  0: "[way] == \"RECEIVE\""
  1: "[way] =~ /SEND/ and \"_mumu\" not in [tags]"
"#;
    let def = StageLoader::parse_yaml(yaml).unwrap();
    let processor = StageLoader::new().build(&def).unwrap();
    let (sender, mut receivers) = ChannelSender::with_ports(processor.ports());

    for data in [
        json!({"message": "r", "way": "RECEIVE", "tags": []}),
        json!({"message": "s", "way": "SEND", "tags": ["web"]}),
        json!({"message": "x", "way": "SEND", "tags": ["_mumu"]}),
        json!({"message": "missing"}),
    ] {
        processor.receive(event(data), &sender).unwrap();
    }

    assert_eq!(receivers[0].try_recv().unwrap().message, "r");
    assert!(receivers[0].try_recv().is_err());
    assert_eq!(receivers[1].try_recv().unwrap().message, "s");
    assert!(receivers[1].try_recv().is_err());
}

#[test]
fn test_load_and_run_route_stage() {
    let yaml = r#"
name: errors
kind: route
condition: "[status] >= 500"
add_tag: ["routed_%{[host]}"]
add_field:
  routed_by: errors
"#;
    let def = StageLoader::parse_yaml(yaml).unwrap();
    let processor = StageLoader::new().build(&def).unwrap();
    let (sender, mut receivers) = ChannelSender::with_ports(2);

    processor
        .receive(event(json!({"status": 502, "host": "web1"})), &sender)
        .unwrap();
    processor
        .receive(event(json!({"status": 200, "host": "web2"})), &sender)
        .unwrap();

    let hit = receivers[PORT_SUCCESS].try_recv().unwrap();
    assert_eq!(hit.get("tags"), Some(&json!(["routed_web1"])));
    assert_eq!(hit.get("routed_by"), Some(&json!("errors")));

    let miss = receivers[PORT_TRUNK].try_recv().unwrap();
    assert_eq!(miss.get("host"), Some(&json!("web2")));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn test_shared_cache_across_threads() {
    let cache = Arc::new(ExpressionCache::new());
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                let compiled = cache.get_or_compile(0, "[n] % 2 == 0").unwrap();
                let data: FieldMap = [("n".to_string(), json!(i))].into_iter().collect();
                compiled.evaluate_bool(&data).unwrap() == (i % 2 == 0)
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_concurrent_routing() {
    let when = Arc::new(
        WhenProcessor::new("parallel", table(&["[n] < 50", "[n] < 100"])).unwrap(),
    );
    let (sender, mut receivers) = ChannelSender::with_ports(2);
    let sender = Arc::new(sender);

    let tasks: Vec<_> = (0..200)
        .map(|n| {
            let when = Arc::clone(&when);
            let sender = Arc::clone(&sender);
            tokio::task::spawn_blocking(move || {
                when.receive(event(json!({ "n": n })), sender.as_ref())
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    drop(sender);

    let mut counts = [0usize; 2];
    for (port, rx) in receivers.iter_mut().enumerate() {
        while let Some(e) = rx.recv().await {
            let n = e.get("n").and_then(|v| v.as_u64()).unwrap();
            assert!(if port == 0 { n < 50 } else { (50..100).contains(&n) });
            counts[port] += 1;
        }
    }
    assert_eq!(counts, [50, 50]);
}
