//! Minimal diff between two JSON documents.

use crate::operation::PatchOp;
use crate::pointer::Pointer;
use serde_json::{Map, Value};

/// Computes the ordered patch that turns `before` into `after`.
///
/// Traversal is depth-first in lock-step. Objects are walked in `before`'s
/// key order (recursing into shared keys, removing missing ones), then keys
/// that exist only in `after` are added in `after`'s order. Arrays recurse
/// positionally over the shared prefix, remove surplus elements from the
/// highest index down and append new elements in ascending order, so every
/// index is valid against the document as it stands when the op is applied.
///
/// Returns an empty patch when the documents are deep-equal. Cyclic input is
/// not representable in `serde_json::Value`.
pub fn diff(before: &Value, after: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    let mut path = Pointer::root();
    diff_at(&mut ops, &mut path, before, after);
    ops
}

fn diff_at(ops: &mut Vec<PatchOp>, path: &mut Pointer, before: &Value, after: &Value) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => diff_object(ops, path, b, a),
        (Value::Array(b), Value::Array(a)) => diff_array(ops, path, b, a),
        _ => ops.push(PatchOp::replace(path.clone(), after.clone())),
    }
}

fn diff_object(
    ops: &mut Vec<PatchOp>,
    path: &mut Pointer,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) {
    for (key, old) in before {
        match after.get(key) {
            Some(new) => {
                path.push(key.clone());
                diff_at(ops, path, old, new);
                path.pop();
            }
            None => ops.push(PatchOp::remove(path.child(key.clone()))),
        }
    }
    for (key, new) in after {
        if !before.contains_key(key) {
            ops.push(PatchOp::add(path.child(key.clone()), new.clone()));
        }
    }
}

fn diff_array(ops: &mut Vec<PatchOp>, path: &mut Pointer, before: &[Value], after: &[Value]) {
    let shared = before.len().min(after.len());
    for (i, (old, new)) in before.iter().zip(after).enumerate() {
        path.push(i.to_string());
        diff_at(ops, path, old, new);
        path.pop();
    }
    for i in (shared..before.len()).rev() {
        ops.push(PatchOp::remove(path.child(i.to_string())));
    }
    for (i, new) in after.iter().enumerate().skip(shared) {
        ops.push(PatchOp::add(path.child(i.to_string()), new.clone()));
    }
}
