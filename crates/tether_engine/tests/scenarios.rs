//! Engine scenarios against a scripted transport.

use serde_json::{json, Value};
use tether_engine::{
    EngineConfig, FlushOutcome, MockTransport, ResponseOutcome, SyncEngine, SyncState,
};
use tether_patch::{apply_patch, decode_patch, PatchOp, Pointer};
use tether_testkit::fixtures;
use tracing_subscriber::EnvFilter;

const URL: &str = "https://app.example.com/model";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ptr(s: &str) -> Pointer {
    Pointer::parse(s).unwrap()
}

fn ready_engine(config: EngineConfig, document: Value) -> SyncEngine<MockTransport> {
    init_tracing();
    let mut engine = SyncEngine::new(config, MockTransport::new());
    engine.initialize(|_| {}).unwrap();
    engine.transport().respond(document.to_string());
    assert_eq!(engine.pump().unwrap(), vec![ResponseOutcome::Ready]);
    engine
}

fn sent_patches(engine: &SyncEngine<MockTransport>) -> Vec<Vec<PatchOp>> {
    engine
        .transport()
        .patch_bodies()
        .iter()
        .map(|body| decode_patch(body).unwrap())
        .collect()
}

fn set(engine: &mut SyncEngine<MockTransport>, field: &str, value: Value) {
    engine.model_mut().unwrap()[field] = value;
}

#[test]
fn on_ready_receives_model() {
    init_tracing();
    let mut engine = SyncEngine::new(EngineConfig::new(URL), MockTransport::new());
    let seq = engine
        .initialize(|model| {
            assert_eq!(model["hello"], json!("world"));
        })
        .unwrap();

    assert_eq!(engine.state(), SyncState::AwaitingInitial);
    assert!(engine.model().is_none());
    let request = engine.transport().last_request().unwrap();
    assert_eq!(request.seq, seq);
    assert_eq!(request.url, URL);
    assert!(request.body.is_none());

    engine.transport().respond(r#"{"hello": "world"}"#);
    engine.pump().unwrap();
    assert_eq!(engine.model().unwrap(), &fixtures::greeting_document());
}

#[test]
fn deferred_policy_sends_final_value_once() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::form_document());
    let field = ptr("/hello");

    for value in ["H", "Hi", "Hi!"] {
        set(&mut engine, "hello", json!(value));
        assert_eq!(engine.input(&field).unwrap(), FlushOutcome::Held);
    }
    assert_eq!(engine.transport().request_count(), 1);
    assert_eq!(engine.pending().len(), 1);

    assert!(matches!(engine.commit().unwrap(), FlushOutcome::Sent(_)));
    assert_eq!(engine.transport().request_count(), 2);
    assert_eq!(
        sent_patches(&engine),
        vec![vec![PatchOp::replace(field, json!("Hi!"))]]
    );
}

#[test]
fn immediate_policy_sends_each_edit() {
    let field = ptr("/hello");
    let config = EngineConfig::new(URL).with_immediate(field.clone());
    let mut engine = ready_engine(config, fixtures::form_document());

    set(&mut engine, "hello", json!("H"));
    assert!(matches!(engine.input(&field).unwrap(), FlushOutcome::Sent(_)));
    engine.transport().respond("[]");
    engine.pump().unwrap();

    set(&mut engine, "hello", json!("Hi"));
    assert!(matches!(engine.input(&field).unwrap(), FlushOutcome::Sent(_)));

    assert_eq!(
        sent_patches(&engine),
        vec![
            vec![PatchOp::replace(field.clone(), json!("H"))],
            vec![PatchOp::replace(field, json!("Hi"))],
        ]
    );
}

#[test]
fn immediate_edit_during_round_follows_it() {
    let field = ptr("/hello");
    let config = EngineConfig::new(URL).with_immediate(field.clone());
    let mut engine = ready_engine(config, fixtures::form_document());

    set(&mut engine, "hello", json!("H"));
    assert!(matches!(engine.input(&field).unwrap(), FlushOutcome::Sent(_)));
    set(&mut engine, "hello", json!("Hi"));
    assert_eq!(engine.input(&field).unwrap(), FlushOutcome::Deferred);
    assert_eq!(engine.transport().request_count(), 2);

    engine.transport().respond("[]");
    engine.pump().unwrap();
    assert_eq!(engine.transport().request_count(), 3);
    assert_eq!(
        sent_patches(&engine)[1],
        vec![PatchOp::replace(field, json!("Hi"))]
    );
}

#[test]
fn other_fields_keep_default_policy() {
    let config = EngineConfig::new(URL).with_immediate(ptr("/hello"));
    let mut engine = ready_engine(config, fixtures::form_document());

    set(&mut engine, "name", json!("Ada"));
    assert_eq!(engine.input(&ptr("/name")).unwrap(), FlushOutcome::Held);
    assert_eq!(engine.transport().request_count(), 1);
}

#[test]
fn single_flight_coalesces_into_one_follow_up() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::form_document());

    set(&mut engine, "hello", json!("galaxy"));
    let Ok(FlushOutcome::Sent(first)) = engine.commit() else {
        panic!("expected a request");
    };

    for i in 0..5 {
        set(&mut engine, "name", json!(format!("n{i}")));
        assert_eq!(engine.commit().unwrap(), FlushOutcome::Deferred);
    }
    set(&mut engine, "email", json!("a@example.com"));
    assert_eq!(engine.send_local_change().unwrap(), FlushOutcome::Deferred);
    assert_eq!(engine.transport().request_count(), 2);
    assert_eq!(engine.state(), SyncState::Sending);

    assert_eq!(engine.transport().respond("[]"), Some(first));
    assert_eq!(
        engine.pump().unwrap(),
        vec![ResponseOutcome::Patched { applied: 0 }]
    );

    assert_eq!(engine.transport().request_count(), 3);
    assert_eq!(
        sent_patches(&engine)[1],
        vec![
            PatchOp::replace(ptr("/name"), json!("n4")),
            PatchOp::replace(ptr("/email"), json!("a@example.com")),
        ]
    );
    assert!(engine.is_in_flight());
    assert!(engine.pending().is_empty());
}

#[test]
fn empty_flush_issues_no_request() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::form_document());

    assert_eq!(engine.commit().unwrap(), FlushOutcome::Empty);
    assert_eq!(engine.send_local_change().unwrap(), FlushOutcome::Empty);
    assert_eq!(engine.flush().unwrap(), FlushOutcome::Empty);

    // A plain write of the value a field already holds is not detected;
    // actions that must reach the server use `touch`.
    set(&mut engine, "hello", json!("world"));
    assert_eq!(engine.commit().unwrap(), FlushOutcome::Empty);

    assert_eq!(engine.transport().request_count(), 1);
}

#[test]
fn server_patch_is_applied_and_not_echoed() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::greeting_document());

    set(&mut engine, "hello", json!("galaxy"));
    engine.commit().unwrap();
    assert_eq!(
        engine.transport().last_request().unwrap().body.as_deref(),
        Some(r#"[{"op":"replace","path":"/hello","value":"galaxy"}]"#)
    );

    engine
        .transport()
        .respond(r#"[{"op":"replace","path":"/hello","value":"universe"}]"#);
    assert_eq!(
        engine.pump().unwrap(),
        vec![ResponseOutcome::Patched { applied: 1 }]
    );
    assert_eq!(engine.model().unwrap()["hello"], json!("universe"));
    assert_eq!(engine.baseline().unwrap()["hello"], json!("universe"));

    assert_eq!(engine.commit().unwrap(), FlushOutcome::Empty);
    assert_eq!(engine.transport().request_count(), 2);
}

#[test]
fn unobserved_response_leaves_live_value() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::greeting_document());

    set(&mut engine, "hello", json!("galaxy"));
    engine.commit().unwrap();

    engine.unobserve();
    engine
        .transport()
        .respond(r#"[{"op":"replace","path":"/hello","value":"universe"}]"#);
    assert_eq!(engine.pump().unwrap(), vec![ResponseOutcome::Discarded]);
    assert_eq!(engine.model().unwrap()["hello"], json!("galaxy"));
    assert_eq!(engine.state(), SyncState::Ready);
    assert!(!engine.is_in_flight());
}

#[test]
fn reobserve_resumes_detection() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::greeting_document());

    set(&mut engine, "hello", json!("galaxy"));
    engine.commit().unwrap();
    engine.unobserve();
    engine
        .transport()
        .respond(r#"[{"op":"replace","path":"/hello","value":"universe"}]"#);
    engine.pump().unwrap();

    // Flush triggers are inert while unobserved.
    set(&mut engine, "hello", json!("stopped"));
    assert_eq!(engine.commit().unwrap(), FlushOutcome::Inert);
    assert_eq!(engine.input(&ptr("/hello")).unwrap(), FlushOutcome::Inert);

    engine.observe().unwrap();
    assert_eq!(engine.commit().unwrap(), FlushOutcome::Empty);

    set(&mut engine, "hello", json!("cosmos"));
    assert!(matches!(engine.commit().unwrap(), FlushOutcome::Sent(_)));
    assert_eq!(engine.transport().request_count(), 3);
    assert_eq!(
        engine.transport().last_request().unwrap().body.as_deref(),
        Some(r#"[{"op":"replace","path":"/hello","value":"cosmos"}]"#)
    );
}

#[test]
fn server_remove_reindexes_before_local_edits() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::todo_document());

    // The remove button writes the value the field already holds.
    engine.model_mut().unwrap()["items"][0]["remove$"] = Value::Null;
    assert!(matches!(
        engine.touch(&ptr("/items/0/remove$")).unwrap(),
        FlushOutcome::Sent(_)
    ));
    assert_eq!(engine.model().unwrap()["items"].as_array().unwrap().len(), 2);
    assert_eq!(
        sent_patches(&engine)[0],
        vec![PatchOp::replace(ptr("/items/0/remove$"), Value::Null)]
    );

    engine.transport().respond(
        r#"[
            {"op":"remove","path":"/items/1"},
            {"op":"replace","path":"/items/0/completed$","value":true},
            {"op":"replace","path":"/items/0/title$","value":"Test 2"}
        ]"#,
    );
    assert_eq!(
        engine.pump().unwrap(),
        vec![ResponseOutcome::Patched { applied: 3 }]
    );

    let items = engine.model().unwrap()["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title$"], json!("Test 2"));
    assert_eq!(items[0]["completed$"], json!(true));

    // Nothing the server did is sent back.
    assert_eq!(engine.commit().unwrap(), FlushOutcome::Empty);
    assert_eq!(engine.transport().request_count(), 2);

    engine.model_mut().unwrap()["items"][0]["remove$"] = json!("again");
    engine.commit().unwrap();
    assert_eq!(
        sent_patches(&engine)[1],
        vec![PatchOp::replace(ptr("/items/0/remove$"), json!("again"))]
    );
}

#[test]
fn edit_during_round_is_reindexed_past_server_removal() {
    let document = json!({"items": [{"t": "a"}, {"t": "b"}, {"t": "c"}]});
    let mut engine = ready_engine(EngineConfig::new(URL), document);

    engine.model_mut().unwrap()["items"][0]["t"] = json!("A");
    assert!(matches!(engine.commit().unwrap(), FlushOutcome::Sent(_)));
    engine.model_mut().unwrap()["items"][2]["t"] = json!("C");
    assert_eq!(engine.commit().unwrap(), FlushOutcome::Deferred);

    engine
        .transport()
        .respond(r#"[{"op":"remove","path":"/items/0"}]"#);
    engine.pump().unwrap();

    assert_eq!(
        engine.model().unwrap(),
        &json!({"items": [{"t": "b"}, {"t": "C"}]})
    );
    assert_eq!(
        sent_patches(&engine)[1],
        vec![PatchOp::replace(ptr("/items/1/t"), json!("C"))]
    );
    assert_eq!(
        engine.baseline().unwrap().value(),
        &json!({"items": [{"t": "b"}, {"t": "c"}]})
    );
}

#[test]
fn repeated_removals_replay_onto_sent_state() {
    let mut engine = ready_engine(
        EngineConfig::new(URL),
        json!({"x": 0, "l": ["a", "b", "c"]}),
    );

    set(&mut engine, "x", json!(1));
    assert!(matches!(engine.commit().unwrap(), FlushOutcome::Sent(_)));
    let mut server = engine.model().unwrap().clone();

    for _ in 0..2 {
        engine.model_mut().unwrap()["l"]
            .as_array_mut()
            .unwrap()
            .remove(1);
        engine.detect();
    }
    let mut replayed = server.clone();
    apply_patch(&mut replayed, engine.pending()).unwrap();
    assert_eq!(&replayed, engine.model().unwrap());

    engine.transport().respond("[]");
    engine.pump().unwrap();
    apply_patch(&mut server, &sent_patches(&engine)[1]).unwrap();
    assert_eq!(server, json!({"x": 1, "l": ["a"]}));
}

#[test]
fn full_document_response_resyncs() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::greeting_document());

    set(&mut engine, "hello", json!("galaxy"));
    engine.commit().unwrap();
    engine
        .transport()
        .respond(r#"{"hello": "galaxy", "extra": [1, 2]}"#);
    assert_eq!(engine.pump().unwrap(), vec![ResponseOutcome::Replaced]);

    assert_eq!(engine.model().unwrap()["extra"], json!([1, 2]));
    assert_eq!(engine.baseline().unwrap().value(), engine.model().unwrap());
    assert_eq!(engine.stats().full_resyncs, 1);
    assert_eq!(engine.commit().unwrap(), FlushOutcome::Empty);
}

#[test]
fn failed_round_can_be_retried() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::greeting_document());

    set(&mut engine, "hello", json!("galaxy"));
    engine.commit().unwrap();
    engine.transport().fail("gateway timeout");
    assert!(engine.pump().unwrap_err().is_retryable());
    assert_eq!(engine.pending().len(), 1);

    assert!(matches!(engine.commit().unwrap(), FlushOutcome::Sent(_)));
    assert_eq!(
        sent_patches(&engine),
        vec![
            vec![PatchOp::replace(ptr("/hello"), json!("galaxy"))],
            vec![PatchOp::replace(ptr("/hello"), json!("galaxy"))],
        ]
    );
}

#[test]
fn stats_track_rounds() {
    let mut engine = ready_engine(EngineConfig::new(URL), fixtures::form_document());

    set(&mut engine, "name", json!("Ada"));
    set(&mut engine, "email", json!("ada@example.com"));
    engine.commit().unwrap();
    engine
        .transport()
        .respond(r#"[{"op":"add","path":"/id","value":7}]"#);
    engine.pump().unwrap();

    let stats = engine.stats();
    assert_eq!(stats.requests_sent, 2);
    assert_eq!(stats.operations_sent, 2);
    assert_eq!(stats.operations_received, 1);
    assert_eq!(stats.responses_applied, 1);
    assert_eq!(stats.stale_responses, 0);
    assert!(stats.last_error.is_none());
}

#[test]
fn engines_are_independent() {
    let mut first = ready_engine(EngineConfig::new(URL), fixtures::greeting_document());
    let mut second = ready_engine(
        EngineConfig::new("https://app.example.com/other"),
        fixtures::greeting_document(),
    );

    set(&mut first, "hello", json!("galaxy"));
    first.commit().unwrap();

    assert_eq!(second.commit().unwrap(), FlushOutcome::Empty);
    assert_eq!(second.model().unwrap()["hello"], json!("world"));
    assert_eq!(first.transport().request_count(), 2);
    assert_eq!(second.transport().request_count(), 1);
}
