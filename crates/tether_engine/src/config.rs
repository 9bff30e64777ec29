//! Configuration for the sync engine.

use std::collections::HashMap;
use tether_patch::Pointer;

/// When a detected change to a field is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPolicy {
    /// Changes accumulate until a commit signal (blur, pointer-up).
    #[default]
    Deferred,
    /// Every input event on the field flushes at once.
    Immediate,
}

/// Configuration for a sync engine instance.
///
/// Field policies are fixed once the engine is built.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// URL the model is loaded from and patched against.
    pub source_url: String,
    /// Policy for fields without an explicit entry.
    pub default_policy: FlushPolicy,
    /// Per-field policies keyed by pointer.
    pub field_policies: HashMap<Pointer, FlushPolicy>,
}

impl EngineConfig {
    /// Creates a new engine configuration.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            default_policy: FlushPolicy::Deferred,
            field_policies: HashMap::new(),
        }
    }

    /// Sets the policy for fields without an explicit entry.
    pub fn with_default_policy(mut self, policy: FlushPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Sets the policy for one field.
    pub fn with_field_policy(mut self, field: Pointer, policy: FlushPolicy) -> Self {
        self.field_policies.insert(field, policy);
        self
    }

    /// Marks a field as flushing on every input event.
    pub fn with_immediate(self, field: Pointer) -> Self {
        self.with_field_policy(field, FlushPolicy::Immediate)
    }

    /// Returns the policy that applies to `field`.
    pub fn policy_for(&self, field: &Pointer) -> FlushPolicy {
        self.field_policies
            .get(field)
            .copied()
            .unwrap_or(self.default_policy)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("")
    }
}
