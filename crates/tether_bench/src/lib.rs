//! Shared workloads for the tether benchmarks.

#![warn(missing_docs)]

use serde_json::{json, Value};

/// Returns a copy of `doc` with every `step`-th todo item toggled and renamed.
pub fn touch_items(doc: &Value, step: usize) -> Value {
    let mut edited = doc.clone();
    if let Some(items) = edited["items"].as_array_mut() {
        for (i, item) in items.iter_mut().enumerate().filter(|(i, _)| i % step.max(1) == 0) {
            item["completed$"] = json!(true);
            item["title$"] = json!(format!("Edited {}", i));
        }
    }
    edited
}

/// Returns a copy of `doc` with the last `count` todo items removed.
pub fn truncate_items(doc: &Value, count: usize) -> Value {
    let mut edited = doc.clone();
    if let Some(items) = edited["items"].as_array_mut() {
        let keep = items.len().saturating_sub(count);
        items.truncate(keep);
    }
    edited
}
