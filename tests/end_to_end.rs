//! End-to-end seed scenarios and round-trip/boundary properties, driven
//! entirely through `QueryEngine`/`StreamManager` rather than individual
//! operators — these are the six scenarios plus the invariants and
//! boundary behaviours.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use streamql::document::Document;
use streamql::stream::{Subscriber, SYSTEM_LOG_STREAM};
use streamql::{EngineError, QueryEngine, StreamManager};

fn engine_with_streams(names: &[&str]) -> QueryEngine {
    let streams = StreamManager::new();
    for name in names {
        streams.create_stream(name).unwrap();
    }
    QueryEngine::new(streams)
}

#[derive(Debug)]
struct CollectingSubscriber(Arc<Mutex<Vec<Document>>>);
impl Subscriber for CollectingSubscriber {
    fn on_document(&mut self, doc: &Document) {
        self.0.lock().push(doc.clone());
    }
}

fn subscribe(engine: &QueryEngine, stream: &str) -> Arc<Mutex<Vec<Document>>> {
    let results = Arc::new(Mutex::new(Vec::new()));
    engine
        .streams()
        .subscribe(stream, Arc::new(Mutex::new(CollectingSubscriber(results.clone()))))
        .unwrap();
    results
}

// ---------------------------------------------------------------------
// Seed scenario 1: where filter threshold
// ---------------------------------------------------------------------

#[test]
fn scenario_1_where_filter_threshold() {
    let engine = engine_with_streams(&["input", "output"]);
    let results = subscribe(&engine, "output");

    engine
        .execute_statement("input | where age >= 21 | insert_into(output)", |_| {})
        .unwrap();

    for doc in [
        json!({"name": "Under21", "age": 20}),
        json!({"name": "Exactly21", "age": 21}),
        json!({"name": "Over21", "age": 25}),
        json!({"name": "Under21_2", "age": 18}),
    ] {
        engine.streams().insert("input", doc).unwrap();
    }

    assert_eq!(
        *results.lock(),
        vec![
            json!({"name": "Exactly21", "age": 21}),
            json!({"name": "Over21", "age": 25}),
        ]
    );
}

// ---------------------------------------------------------------------
// Seed scenario 2: select exclusion
// ---------------------------------------------------------------------

#[test]
fn scenario_2_select_exclusion() {
    let engine = engine_with_streams(&["users", "safe_users"]);
    let results = subscribe(&engine, "safe_users");

    engine
        .execute_statement(
            "users | select { name, age, email } | insert_into(safe_users)",
            |_| {},
        )
        .unwrap();

    engine
        .streams()
        .insert(
            "users",
            json!({"name": "John", "age": 30, "email": "john@x", "password": "s", "ssn": 1}),
        )
        .unwrap();

    assert_eq!(
        *results.lock(),
        vec![json!({"name": "John", "age": 30, "email": "john@x"})]
    );
}

// ---------------------------------------------------------------------
// Seed scenario 3: project computation
// ---------------------------------------------------------------------

#[test]
fn scenario_3_project_computation() {
    let engine = engine_with_streams(&["orders", "priced"]);
    let results = subscribe(&engine, "priced");

    engine
        .execute_statement(
            "orders | select { product, quantity, price, total: quantity * price, tax: quantity * price * 0.1 } | insert_into(priced)",
            |_| {},
        )
        .unwrap();

    engine
        .streams()
        .insert("orders", json!({"product": "A", "quantity": 10, "price": 5.99}))
        .unwrap();
    engine
        .streams()
        .insert("orders", json!({"product": "B", "quantity": 3, "price": 12.5}))
        .unwrap();

    let got = results.lock();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0]["product"], json!("A"));
    assert!((got[0]["total"].as_f64().unwrap() - 59.9).abs() < 1e-9);
    assert!((got[0]["tax"].as_f64().unwrap() - 5.99).abs() < 1e-9);
    assert_eq!(got[1]["product"], json!("B"));
    assert!((got[1]["total"].as_f64().unwrap() - 37.5).abs() < 1e-9);
    assert!((got[1]["tax"].as_f64().unwrap() - 3.75).abs() < 1e-9);
}

// ---------------------------------------------------------------------
// Seed scenario 4: multi-stage pipeline
// ---------------------------------------------------------------------

#[test]
fn scenario_4_multi_stage_pipeline() {
    let engine = engine_with_streams(&["raw_orders", "processed"]);
    let results = subscribe(&engine, "processed");

    engine
        .execute_statement(
            r#"raw_orders
               | where status == "pending" && amount > 100
               | select { order_id, customer: customer_name, amount, priority: urgent || false }
               | select { order_id, customer, amount, priority, fee: amount * 0.03, total: amount + amount * 0.03 }
               | insert_into(processed)"#,
            |_| {},
        )
        .unwrap();

    for doc in [
        json!({"order_id": 1, "amount": 50, "status": "pending", "urgent": true, "customer_name": "A"}),
        json!({"order_id": 2, "amount": 150, "status": "completed", "urgent": true, "customer_name": "B"}),
        json!({"order_id": 3, "amount": 200, "status": "pending", "urgent": true, "customer_name": "C"}),
        json!({"order_id": 4, "amount": 300, "status": "pending", "urgent": false, "customer_name": "D"}),
    ] {
        engine.streams().insert("raw_orders", doc).unwrap();
    }

    let got = results.lock();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0]["order_id"], json!(3));
    assert_eq!(got[0]["priority"], json!(true));
    assert!((got[0]["total"].as_f64().unwrap() - 206.0).abs() < 1e-9);
    assert_eq!(got[1]["order_id"], json!(4));
    assert_eq!(got[1]["priority"], json!(false));
    assert!((got[1]["total"].as_f64().unwrap() - 309.0).abs() < 1e-9);
}

// ---------------------------------------------------------------------
// Seed scenario 5: summarize with tumbling window by group
// ---------------------------------------------------------------------

#[test]
fn scenario_5_summarize_tumbling_window_by_group() {
    let engine = engine_with_streams(&["sales", "summary"]);
    let results = subscribe(&engine, "summary");

    engine
        .execute_statement(
            "sales | summarize { total: sum(amount), count: count() } by product over w = tumbling_window(2) | insert_into(summary)",
            |_| {},
        )
        .unwrap();

    engine.streams().insert("sales", json!({"product": "laptop", "amount": 1200})).unwrap();
    engine.streams().insert("sales", json!({"product": "laptop", "amount": 1100})).unwrap();
    // only the second laptop doc is live so far — no emit yet.
    assert!(results.lock().is_empty());

    // mouse's first arrival crosses the window boundary, closing laptop's.
    engine.streams().insert("sales", json!({"product": "mouse", "amount": 25})).unwrap();
    {
        let got = results.lock();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["product"], json!("laptop"));
        assert_eq!(got[0]["total"], json!(2300.0));
        assert_eq!(got[0]["count"], json!(2));
    }

    engine.streams().insert("sales", json!({"product": "mouse", "amount": 30})).unwrap();
    // mouse's window is still open — no second emit until it closes or flushes.
    assert_eq!(results.lock().len(), 1);

    engine.flush_source("sales").unwrap();
    let got = results.lock();
    assert_eq!(got.len(), 2);
    assert_eq!(got[1]["product"], json!("mouse"));
    assert_eq!(got[1]["total"], json!(55.0));
    assert_eq!(got[1]["count"], json!(2));
}

// ---------------------------------------------------------------------
// Seed scenario 6: scan session
// ---------------------------------------------------------------------

#[test]
fn scenario_6_scan_session() {
    let engine = engine_with_streams(&["events", "sessions"]);
    let results = subscribe(&engine, "sessions");

    engine
        .execute_statement(
            r#"events | scan(
                step login: event_type == "login" => user_id = user_id, sid = matchId;
                step act: event_type == "action" => n = n + 1;
                step end: event_type == "logout" => emit({user_id, sid, n});
            ) | insert_into(sessions)"#,
            |_| {},
        )
        .unwrap();

    for doc in [
        json!({"event_type": "login", "user_id": "alice"}),
        json!({"event_type": "action"}),
        json!({"event_type": "action"}),
        json!({"event_type": "logout"}),
    ] {
        engine.streams().insert("events", doc).unwrap();
    }

    let got = results.lock();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0]["user_id"], json!("alice"));
    assert_eq!(got[0]["n"], json!(2.0));
    assert!(got[0]["sid"].is_number());
}

// ---------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------

#[test]
fn invariant_subscribers_receive_inserts_in_order() {
    let engine = engine_with_streams(&["s"]);
    let r1 = subscribe(&engine, "s");
    let r2 = subscribe(&engine, "s");

    for i in 0..5 {
        engine.streams().insert("s", json!({"i": i})).unwrap();
    }

    let expected: Vec<Document> = (0..5).map(|i| json!({"i": i})).collect();
    assert_eq!(*r1.lock(), expected);
    assert_eq!(*r2.lock(), expected);
}

#[test]
fn invariant_sum_and_count_match_their_definitions() {
    let engine = engine_with_streams(&["nums", "out"]);
    let results = subscribe(&engine, "out");

    engine
        .execute_statement(
            "nums | summarize { total: sum(x), n: count() } over w = tumbling_window(4) | insert_into(out)",
            |_| {},
        )
        .unwrap();

    for x in [1, 2, 3, 4] {
        engine.streams().insert("nums", json!({"x": x})).unwrap();
    }
    engine.flush_source("nums").unwrap();

    let got = results.lock();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0]["total"], json!(10.0));
    assert_eq!(got[0]["n"], json!(4));
}

#[test]
fn invariant_plan_building_is_deterministic() {
    let engine = engine_with_streams(&["s"]);
    let a = engine.explain_statement("s | where a > 1 | select { a }").unwrap();
    let b = engine.explain_statement("s | where a > 1 | select { a }").unwrap();
    assert_eq!(a, b);
}

// ---------------------------------------------------------------------
// Round-trip / idempotence
// ---------------------------------------------------------------------

#[test]
fn roundtrip_create_delete_recreate_stream_is_observably_identical() {
    let engine = engine_with_streams(&[]);
    engine.streams().create_stream("s").unwrap();
    assert!(engine.streams().stream_exists("s"));
    engine.delete_stream("s").unwrap();
    assert!(!engine.streams().stream_exists("s"));
    engine.streams().create_stream("s").unwrap();
    assert!(engine.streams().stream_exists("s"));
    assert!(engine.list_active_flows().is_empty());
}

#[test]
fn roundtrip_duplicate_insert_produces_two_events() {
    let engine = engine_with_streams(&["s"]);
    let results = subscribe(&engine, "s");
    let doc = json!({"a": 1});
    engine.streams().insert("s", doc.clone()).unwrap();
    engine.streams().insert("s", doc.clone()).unwrap();
    assert_eq!(*results.lock(), vec![doc.clone(), doc]);
}

#[test]
fn roundtrip_select_spread_is_identity_on_documents() {
    let engine = engine_with_streams(&["s", "out"]);
    let results = subscribe(&engine, "out");
    engine
        .execute_statement("s | select { ...item } | insert_into(out)", |_| {})
        .unwrap();
    let doc = json!({"a": 1, "b": "two", "c": [1, 2, 3]});
    engine.streams().insert("s", doc.clone()).unwrap();
    assert_eq!(*results.lock(), vec![doc]);
}

// ---------------------------------------------------------------------
// Boundary behaviours
// ---------------------------------------------------------------------

#[test]
fn boundary_array_indexing_out_of_range_is_null_not_dropped() {
    let engine = engine_with_streams(&["s", "out"]);
    let results = subscribe(&engine, "out");
    engine
        .execute_statement(
            "s | select { neg: items[-1], frac: items[1.5], big: items[99] } | insert_into(out)",
            |_| {},
        )
        .unwrap();
    engine.streams().insert("s", json!({"items": [1, 2, 3]})).unwrap();

    let got = results.lock();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0]["neg"], Document::Null);
    assert_eq!(got[0]["frac"], Document::Null);
    assert_eq!(got[0]["big"], Document::Null);
}

#[test]
fn boundary_or_and_and_short_circuit_with_left_operand() {
    let engine = engine_with_streams(&["s", "out"]);
    let results = subscribe(&engine, "out");
    engine
        .execute_statement(
            "s | select { a: x || y, b: null && true } | insert_into(out)",
            |_| {},
        )
        .unwrap();
    engine.streams().insert("s", json!({"x": "truthy", "y": "other"})).unwrap();

    let got = results.lock();
    assert_eq!(got[0]["a"], json!("truthy"));
    assert_eq!(got[0]["b"], Document::Null);
}

#[test]
fn boundary_empty_summarize_with_no_window_emits_once_on_flush() {
    let engine = engine_with_streams(&["s", "out"]);
    let results = subscribe(&engine, "out");
    engine
        .execute_statement("s | summarize {} | insert_into(out)", |_| {})
        .unwrap();

    engine.streams().insert("s", json!({})).unwrap();
    engine.streams().insert("s", json!({})).unwrap();
    assert!(results.lock().is_empty());

    engine.flush_source("s").unwrap();
    assert_eq!(*results.lock(), vec![json!({})]);
}

// ---------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------

#[test]
fn missing_insert_into_target_is_logged_and_dropped_not_fatal() {
    let engine = engine_with_streams(&["s"]);
    let log = subscribe(&engine, SYSTEM_LOG_STREAM);
    engine
        .execute_statement("s | insert_into(ghost)", |_| {})
        .unwrap();

    engine.streams().insert("s", json!({"a": 1})).unwrap();

    assert_eq!(log.lock().len(), 1);
    assert_eq!(log.lock()[0]["stream"], json!("ghost"));
}

#[test]
fn parse_error_has_no_side_effects() {
    let engine = engine_with_streams(&["s"]);
    let err = engine.execute_statement("s | bogus_operation", |_| {}).unwrap_err();
    assert!(matches!(err, EngineError::ParseError(_)));
    assert!(engine.list_active_flows().is_empty());
}

