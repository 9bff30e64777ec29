//! Dirty-checking change observer.

use serde_json::Value;
use tether_patch::{diff, PatchOp};

/// Detects model mutations by diffing against a reference copy.
///
/// Nothing intercepts writes to the model. The observer keeps the state it
/// last accounted for (the baseline plus every change already detected) and
/// diffs the live model against it when asked.
#[derive(Debug, Default)]
pub struct ChangeObserver {
    armed: bool,
    reference: Option<Value>,
}

impl ChangeObserver {
    /// Creates a disarmed observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms observation from the current state of `model`.
    ///
    /// Mutations made while the observer was stopped become part of the
    /// reference and are never reported.
    pub fn start(&mut self, model: &Value) {
        self.armed = true;
        self.reference = Some(model.clone());
    }

    /// Re-arms a stopped observer at the current state of `model`.
    ///
    /// Returns the mutations made while it was stopped. They become part of
    /// the reference and are never reported. An armed observer is left as is.
    pub fn resume(&mut self, model: &Value) -> Vec<PatchOp> {
        if self.armed {
            return Vec::new();
        }
        let skipped = self
            .reference
            .as_ref()
            .map(|reference| diff(reference, model))
            .unwrap_or_default();
        self.start(model);
        skipped
    }

    /// Disarms observation.
    pub fn stop(&mut self) {
        self.armed = false;
    }

    /// Returns true while observation is armed.
    pub fn is_observing(&self) -> bool {
        self.armed
    }

    /// Returns the changes made to `model` since the reference point.
    ///
    /// Pure: calling it again without mutating `model` yields the same ops.
    /// A disarmed observer reports nothing.
    pub fn materialize(&self, model: &Value) -> Vec<PatchOp> {
        match (&self.reference, self.armed) {
            (Some(reference), true) => diff(reference, model),
            _ => Vec::new(),
        }
    }

    /// Returns the state last accounted for, if any.
    pub fn reference(&self) -> Option<&Value> {
        self.reference.as_ref()
    }

    /// Moves the reference point to the current state of `model`.
    pub fn advance(&mut self, model: &Value) {
        self.reference = Some(model.clone());
    }

    /// Drops the reference and disarms.
    pub fn reset(&mut self) {
        self.armed = false;
        self.reference = None;
    }
}
