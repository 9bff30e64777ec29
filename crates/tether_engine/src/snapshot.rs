//! Baseline snapshots.

use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

/// An immutable deep copy of the model.
///
/// Cloning a snapshot shares the underlying value.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Arc<Value>);

impl Snapshot {
    /// Takes a snapshot of `value`.
    pub fn of(value: &Value) -> Self {
        Self(Arc::new(value.clone()))
    }

    /// Returns the captured value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl Deref for Snapshot {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Holds the last state known to be consistent with the server.
///
/// A snapshot is never mutated; each successful round replaces it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Option<Snapshot>,
    generation: u64,
}

impl SnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from the initial load.
    pub fn seed(&mut self, value: &Value) {
        self.current = Some(Snapshot::of(value));
        self.generation = 1;
    }

    /// Replaces the baseline after a successful round.
    pub fn replace(&mut self, value: &Value) {
        self.current = Some(Snapshot::of(value));
        self.generation += 1;
    }

    /// Returns the current baseline.
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Returns how many baselines have been taken since seeding.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drops the baseline.
    pub fn clear(&mut self) {
        self.current = None;
        self.generation = 0;
    }
}
