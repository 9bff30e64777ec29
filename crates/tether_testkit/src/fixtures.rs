//! Fixture documents.
//!
//! Small, recognisable documents used across the engine, server and
//! benchmark suites.

use serde_json::{json, Map, Value};

/// A single-field greeting document: `{"hello": "world"}`.
pub fn greeting_document() -> Value {
    json!({"hello": "world"})
}

/// A todo list with two items, each carrying bound fields.
pub fn todo_document() -> Value {
    json!({
        "items": [
            {"title$": "Task 1", "completed$": false, "remove$": null},
            {"title$": "Task 2", "completed$": true, "remove$": null}
        ]
    })
}

/// A form-like document with a few top-level fields.
pub fn form_document() -> Value {
    json!({"hello": "world", "name": "", "email": ""})
}

/// Form fields next to a three-item todo list, for edits that mix both.
pub fn board_document() -> Value {
    let mut doc = form_document();
    let mut list = todo_list(3);
    doc["items"] = list["items"].take();
    doc
}

/// Builds a nested object `depth` levels deep with `width` keys per level.
pub fn nested_document(depth: usize, width: usize) -> Value {
    if depth == 0 {
        return Value::String("leaf".into());
    }
    let mut map = Map::new();
    for i in 0..width {
        map.insert(format!("key_{}", i), nested_document(depth - 1, width));
    }
    Value::Object(map)
}

/// Builds a document holding a list of `len` todo items.
pub fn todo_list(len: usize) -> Value {
    let items: Vec<Value> = (0..len)
        .map(|i| {
            json!({"title$": format!("Task {}", i + 1), "completed$": i % 2 == 1, "remove$": null})
        })
        .collect();
    json!({ "items": items })
}
