//! Pending change queue.

use std::collections::HashMap;
use tether_patch::{OpKind, PatchOp, Pointer};

/// Ordered operations waiting to be sent.
///
/// Replaying the queue in order onto the state it was recorded against
/// yields the state after the last recorded operation.
///
/// # Invariants
///
/// - A later write to a queued path takes the earlier entry's position,
///   unless an entry in between changes what that path addresses
/// - Array insertions and removals are never merged with each other
#[derive(Debug, Default)]
pub struct ChangeQueue {
    ops: Vec<PatchOp>,
    positions: HashMap<Pointer, usize>,
}

impl ChangeQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records operations, coalescing writes to paths already queued.
    ///
    /// An `add` superseded by a `replace` stays an `add` carrying the new
    /// value, since the receiver has never seen the key. A write that cannot
    /// be moved to the earlier entry's position is appended instead.
    pub fn record(&mut self, ops: impl IntoIterator<Item = PatchOp>) {
        for op in ops {
            match self.positions.get(op.path()).copied() {
                Some(pos) if self.can_merge(pos, &op) => {
                    let merged = coalesce(&self.ops[pos], op);
                    self.ops[pos] = merged;
                }
                _ => {
                    self.positions.insert(op.path().clone(), self.ops.len());
                    self.ops.push(op);
                }
            }
        }
    }

    /// Drains the queue in order.
    pub fn flush(&mut self) -> Vec<PatchOp> {
        self.positions.clear();
        std::mem::take(&mut self.ops)
    }

    /// Puts the operations of an undelivered request back at the front.
    ///
    /// Entries queued since then supersede restored entries for the same path.
    pub fn restore(&mut self, ops: Vec<PatchOp>) {
        let newer = self.flush();
        self.record(ops);
        self.record(newer);
    }

    /// Replaces the queue's content with `ops`.
    pub fn reset(&mut self, ops: impl IntoIterator<Item = PatchOp>) {
        self.flush();
        self.record(ops);
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns the queued operations in order.
    pub fn as_slice(&self) -> &[PatchOp] {
        &self.ops
    }

    /// Iterates over the queued operations in order.
    pub fn iter(&self) -> impl Iterator<Item = &PatchOp> {
        self.ops.iter()
    }

    fn can_merge(&self, pos: usize, op: &PatchOp) -> bool {
        compatible(&self.ops[pos], op)
            && self.ops[pos + 1..].iter().all(|later| {
                !overlaps(later.path(), op.path())
                    && !shifts(later, op.path())
                    && !shifts(op, later.path())
            })
    }
}

fn coalesce(existing: &PatchOp, newer: PatchOp) -> PatchOp {
    match (existing, newer) {
        (PatchOp::Add { .. }, PatchOp::Replace { path, value }) => PatchOp::Add { path, value },
        (_, newer) => newer,
    }
}

/// Returns true if `newer` can take the place of `existing` on the same path.
///
/// On an array index, only writes that keep the element count can merge.
fn compatible(existing: &PatchOp, newer: &PatchOp) -> bool {
    if !names_element(newer.path()) {
        return true;
    }
    matches!(
        (existing.kind(), newer.kind()),
        (OpKind::Replace, OpKind::Replace | OpKind::Remove) | (OpKind::Add, OpKind::Replace)
    )
}

fn overlaps(a: &Pointer, b: &Pointer) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Returns true if `op` inserts or deletes an array element that moves `path`.
fn shifts(op: &PatchOp, path: &Pointer) -> bool {
    if op.kind() == OpKind::Replace || !names_element(op.path()) {
        return false;
    }
    op.path()
        .parent()
        .is_some_and(|(array, _)| path.len() > array.len() && path.starts_with(&array))
}

/// Returns true if the last segment could be an array index.
fn names_element(path: &Pointer) -> bool {
    path.last()
        .is_some_and(|s| s == "-" || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())))
}
