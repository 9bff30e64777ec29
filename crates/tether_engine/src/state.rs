//! Sync engine state machine.

use crate::config::{EngineConfig, FlushPolicy};
use crate::error::{SyncError, SyncResult};
use crate::observer::ChangeObserver;
use crate::queue::ChangeQueue;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::transport::{SyncRequest, SyncTransport};
use serde_json::Value;
use tether_patch::{apply_op, diff, encode_patch, resolve, PatchError, PatchOp, Pointer};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No model; `initialize` has not been called or the engine was shut down.
    Idle,
    /// The initial load is in flight.
    AwaitingInitial,
    /// A model is loaded and no request is in flight.
    Ready,
    /// A patch request is in flight.
    Sending,
}

impl SyncState {
    /// Returns true if a request is outstanding.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::AwaitingInitial | SyncState::Sending)
    }

    /// Returns true once the initial load has completed.
    pub fn has_model(&self) -> bool {
        matches!(self, SyncState::Ready | SyncState::Sending)
    }
}

/// Statistics about sync rounds.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Requests handed to the transport, including the initial load.
    pub requests_sent: u64,
    /// Local operations sent.
    pub operations_sent: u64,
    /// Server operations applied.
    pub operations_received: u64,
    /// Responses applied after the initial load.
    pub responses_applied: u64,
    /// Full-document responses after the initial load.
    pub full_resyncs: u64,
    /// Completions ignored because they did not match the in-flight request.
    pub stale_responses: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// A patch request was sent with this sequence number.
    Sent(u64),
    /// Nothing was queued; no request was made.
    Empty,
    /// A request is in flight; the queue is kept for the next opportunity.
    Deferred,
    /// The field flushes on commit only; the change stays queued.
    Held,
    /// No model is loaded or observation is stopped.
    Inert,
}

/// Result of handling a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The initial load completed and the model is live.
    Ready,
    /// A server patch was applied.
    Patched {
        /// Number of operations applied.
        applied: usize,
    },
    /// A full document replaced the model.
    Replaced,
    /// Observation was stopped; the round completed without applying the payload.
    Discarded,
    /// The completion did not match the in-flight request and was ignored.
    Stale,
}

enum Payload {
    Document(Value),
    Patch(Vec<PatchOp>),
}

fn parse_payload(body: &str) -> SyncResult<Payload> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| SyncError::MalformedResponse(e.to_string()))?;
    match value {
        Value::Object(_) => Ok(Payload::Document(value)),
        Value::Array(items) => {
            let ops = items
                .iter()
                .enumerate()
                .map(|(i, item)| PatchOp::from_value(item).map_err(|e| e.at_operation(i)))
                .collect::<Result<Vec<_>, PatchError>>()?;
            Ok(Payload::Patch(ops))
        }
        other => Err(SyncError::MalformedResponse(format!(
            "expected an object or a patch array, got {other}"
        ))),
    }
}

/// Applies the operations that still apply to `doc` and skips the rest.
fn absorb(doc: &mut Value, ops: &[PatchOp]) {
    for op in ops {
        if let Err(e) = apply_op(doc, op) {
            debug!(path = %op.path(), error = %e, "operation skipped");
        }
    }
}

struct InFlight {
    seq: u64,
    ops: Vec<PatchOp>,
    /// Expected server state before this request.
    base: Option<Value>,
    actions: Vec<Pointer>,
}

type ReadyCallback = Box<dyn FnOnce(&mut Value) + Send>;

/// Keeps a JSON model in sync with a server through JSON patches.
///
/// The engine never blocks: requests go out through [`SyncTransport::send`]
/// and their outcomes come back through [`SyncEngine::receive`] or
/// [`SyncEngine::pump`].
///
/// Besides the model, the engine tracks the state the server will hold once
/// the in-flight request lands. Server patches are applied to both, and the
/// pending operations are recomputed against that state after every round,
/// so local edits made during a round are re-indexed past the server's
/// changes.
///
/// # Invariants
///
/// - At most one request is in flight
/// - The baseline is only replaced after a response has been fully applied
/// - A completion is accepted only for the in-flight sequence number
/// - The pending operations replayed onto the expected server state give the
///   model as last detected
pub struct SyncEngine<T: SyncTransport> {
    config: EngineConfig,
    transport: T,
    state: SyncState,
    model: Option<Value>,
    shadow: Option<Value>,
    snapshots: SnapshotStore,
    observer: ChangeObserver,
    queue: ChangeQueue,
    actions: Vec<Pointer>,
    in_flight: Option<InFlight>,
    next_seq: u64,
    on_ready: Option<ReadyCallback>,
    stats: SyncStats,
}

impl<T: SyncTransport> SyncEngine<T> {
    /// Creates a new sync engine.
    pub fn new(config: EngineConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            state: SyncState::Idle,
            model: None,
            shadow: None,
            snapshots: SnapshotStore::new(),
            observer: ChangeObserver::new(),
            queue: ChangeQueue::new(),
            actions: Vec::new(),
            in_flight: None,
            next_seq: 0,
            on_ready: None,
            stats: SyncStats::default(),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Gets the current stats.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Gets the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Gets the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the live model.
    pub fn model(&self) -> Option<&Value> {
        self.model.as_ref()
    }

    /// Returns the live model for editing.
    ///
    /// Edits are picked up at the next `input`, `commit` or `detect`.
    pub fn model_mut(&mut self) -> Option<&mut Value> {
        self.model.as_mut()
    }

    /// Returns the last state known to match the server.
    pub fn baseline(&self) -> Option<&Snapshot> {
        self.snapshots.current()
    }

    /// Returns the operations waiting to be sent.
    pub fn pending(&self) -> &[PatchOp] {
        self.queue.as_slice()
    }

    /// Returns true while a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns true while changes are being observed.
    pub fn is_observing(&self) -> bool {
        self.observer.is_observing()
    }

    fn set_state(&mut self, state: SyncState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "state transition");
        }
        self.state = state;
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn record_error(&mut self, error: SyncError) -> SyncError {
        self.stats.last_error = Some(error.to_string());
        error
    }

    /// Returns to `Ready`, or to `Idle` when no model was ever loaded.
    fn settle(&mut self) {
        let state = if self.model.is_some() {
            SyncState::Ready
        } else {
            SyncState::Idle
        };
        self.set_state(state);
    }

    /// Starts the initial load.
    ///
    /// `on_ready` runs once with the live model when the load completes.
    /// Returns the request's sequence number.
    pub fn initialize<F>(&mut self, on_ready: F) -> SyncResult<u64>
    where
        F: FnOnce(&mut Value) + Send + 'static,
    {
        if self.state != SyncState::Idle {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", SyncState::AwaitingInitial),
            });
        }

        let seq = self.next_seq();
        let request = SyncRequest::fetch(seq, self.config.source_url.clone());
        if let Err(e) = self.transport.send(&request) {
            return Err(self.record_error(e));
        }

        self.stats.requests_sent += 1;
        self.on_ready = Some(Box::new(on_ready));
        self.in_flight = Some(InFlight {
            seq,
            ops: Vec::new(),
            base: None,
            actions: Vec::new(),
        });
        self.set_state(SyncState::AwaitingInitial);
        info!(seq, url = %self.config.source_url, "initial load requested");
        Ok(seq)
    }

    /// Resumes observation from the model's current state.
    ///
    /// Edits made while observation was stopped are never sent: they are
    /// treated as if the server already had them.
    pub fn observe(&mut self) -> SyncResult<()> {
        let model = self.model.as_ref().ok_or(SyncError::NotReady)?;
        if self.observer.is_observing() {
            return Ok(());
        }
        let skipped = self.observer.resume(model);
        if !skipped.is_empty() {
            if let Some(shadow) = self.shadow.as_mut() {
                absorb(shadow, &skipped);
            }
            if let Some(base) = self.in_flight.as_mut().and_then(|f| f.base.as_mut()) {
                absorb(base, &skipped);
            }
            self.rebuild_queue();
        }
        debug!(skipped = skipped.len(), "observation started");
        Ok(())
    }

    /// Stops observation. Flush triggers are inert until `observe`.
    ///
    /// A request already in flight still completes.
    pub fn unobserve(&mut self) {
        if self.observer.is_observing() {
            self.observer.stop();
            debug!("observation stopped");
        }
    }

    /// Moves model edits made since the last detection into the queue.
    ///
    /// Returns the number of operations detected.
    pub fn detect(&mut self) -> usize {
        let Some(model) = self.model.as_ref() else {
            return 0;
        };
        let ops = self.observer.materialize(model);
        if ops.is_empty() {
            return 0;
        }

        let count = ops.len();
        self.queue.record(ops);
        self.observer.advance(model);
        debug!(ops = count, pending = self.queue.len(), "changes detected");
        count
    }

    /// Recomputes the queue against the expected server state.
    ///
    /// Fields touched since the last flush stay queued even when unchanged.
    fn rebuild_queue(&mut self) {
        let (Some(shadow), Some(reference)) = (&self.shadow, self.observer.reference()) else {
            return;
        };
        let mut ops = diff(shadow, reference);
        for field in &self.actions {
            if ops.iter().any(|op| op.path() == field) {
                continue;
            }
            if let Some(value) = resolve(reference, field) {
                ops.push(PatchOp::replace(field.clone(), value.clone()));
            }
        }
        self.queue.reset(ops);
    }

    /// Sends the queued operations unless a request is already in flight.
    pub fn flush(&mut self) -> SyncResult<FlushOutcome> {
        if !self.state.has_model() || !self.observer.is_observing() {
            return Ok(FlushOutcome::Inert);
        }
        if self.queue.is_empty() {
            return Ok(FlushOutcome::Empty);
        }
        if let Some(in_flight) = &self.in_flight {
            debug!(
                in_flight = in_flight.seq,
                pending = self.queue.len(),
                "flush deferred"
            );
            return Ok(FlushOutcome::Deferred);
        }

        let ops = self.queue.flush();
        let body = match encode_patch(&ops) {
            Ok(body) => body,
            Err(e) => {
                self.queue.restore(ops);
                return Err(self.record_error(SyncError::Codec(e.to_string())));
            }
        };

        let seq = self.next_seq();
        let request = SyncRequest::patch(seq, self.config.source_url.clone(), body);
        if let Err(e) = self.transport.send(&request) {
            warn!(seq, error = %e, "send failed; operations kept");
            self.queue.restore(ops);
            return Err(self.record_error(e));
        }

        self.stats.requests_sent += 1;
        self.stats.operations_sent += ops.len() as u64;
        info!(seq, ops = ops.len(), "patch sent");
        let base = std::mem::replace(&mut self.shadow, self.observer.reference().cloned());
        self.in_flight = Some(InFlight {
            seq,
            ops,
            base,
            actions: std::mem::take(&mut self.actions),
        });
        self.set_state(SyncState::Sending);
        Ok(FlushOutcome::Sent(seq))
    }

    /// Handles a commit signal: detects edits and flushes.
    pub fn commit(&mut self) -> SyncResult<FlushOutcome> {
        self.detect();
        self.flush()
    }

    /// Forces detection and a flush.
    pub fn send_local_change(&mut self) -> SyncResult<FlushOutcome> {
        self.commit()
    }

    /// Handles an input event on `field`.
    ///
    /// Edits are always detected; they are flushed at once only when the
    /// field's policy is [`FlushPolicy::Immediate`].
    pub fn input(&mut self, field: &Pointer) -> SyncResult<FlushOutcome> {
        if !self.state.has_model() || !self.observer.is_observing() {
            return Ok(FlushOutcome::Inert);
        }
        self.detect();
        match self.config.policy_for(field) {
            FlushPolicy::Immediate => self.flush(),
            FlushPolicy::Deferred => Ok(FlushOutcome::Held),
        }
    }

    /// Sends `field` with its current value, even if it did not change.
    ///
    /// A button press writes a value the field may already hold, which no
    /// diff reports. Edits made so far are detected and sent along.
    pub fn touch(&mut self, field: &Pointer) -> SyncResult<FlushOutcome> {
        if !self.state.has_model() || !self.observer.is_observing() {
            return Ok(FlushOutcome::Inert);
        }
        self.detect();
        let current = self
            .model
            .as_ref()
            .and_then(|model| resolve(model, field))
            .cloned();
        let Some(value) = current else {
            return Err(self.record_error(SyncError::UnknownField(field.to_string())));
        };
        self.queue.record([PatchOp::replace(field.clone(), value)]);
        if !self.actions.contains(field) {
            self.actions.push(field.clone());
        }
        debug!(path = %field, "field touched");
        self.flush()
    }

    /// Handles the completion of request `seq`.
    ///
    /// A failed request returns its operations to the queue. After a response
    /// is fully applied the baseline is replaced, and anything queued in the
    /// meantime is flushed; an error from that flush is returned even though
    /// the response itself was applied.
    pub fn receive(&mut self, seq: u64, result: SyncResult<String>) -> SyncResult<ResponseOutcome> {
        let in_flight = match self.in_flight.take() {
            Some(in_flight) if in_flight.seq == seq => in_flight,
            other => {
                self.in_flight = other;
                self.stats.stale_responses += 1;
                warn!(seq, "ignoring stale response");
                return Ok(ResponseOutcome::Stale);
            }
        };

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                warn!(seq, ops = in_flight.ops.len(), error = %e, "request failed");
                if in_flight.base.is_some() {
                    self.shadow = in_flight.base;
                }
                self.queue.restore(in_flight.ops);
                let newer = std::mem::replace(&mut self.actions, in_flight.actions);
                for field in newer {
                    if !self.actions.contains(&field) {
                        self.actions.push(field);
                    }
                }
                self.settle();
                return Err(self.record_error(e));
            }
        };

        if self.state == SyncState::AwaitingInitial {
            self.complete_initial(seq, &body)
        } else {
            self.complete_round(seq, &body)
        }
    }

    /// Drains finished requests from the transport.
    pub fn pump(&mut self) -> SyncResult<Vec<ResponseOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(completion) = self.transport.poll() {
            outcomes.push(self.receive(completion.seq, completion.result)?);
        }
        Ok(outcomes)
    }

    fn complete_initial(&mut self, seq: u64, body: &str) -> SyncResult<ResponseOutcome> {
        let document = match parse_payload(body) {
            Ok(Payload::Document(document)) => document,
            Ok(Payload::Patch(_)) => {
                self.settle();
                return Err(self.record_error(SyncError::MalformedResponse(
                    "initial load must be a JSON object".into(),
                )));
            }
            Err(e) => {
                self.settle();
                return Err(self.record_error(e));
            }
        };

        self.snapshots.seed(&document);
        self.observer.start(&document);
        self.shadow = Some(document.clone());
        let model = self.model.insert(document);
        if let Some(on_ready) = self.on_ready.take() {
            on_ready(model);
        }
        self.set_state(SyncState::Ready);
        info!(seq, "model ready");
        Ok(ResponseOutcome::Ready)
    }

    fn complete_round(&mut self, seq: u64, body: &str) -> SyncResult<ResponseOutcome> {
        let payload = match parse_payload(body) {
            Ok(payload) => payload,
            Err(e) => {
                self.settle();
                return Err(self.record_error(e));
            }
        };

        if !self.observer.is_observing() {
            if let Some(shadow) = &self.shadow {
                self.snapshots.replace(shadow);
            }
            self.settle();
            info!(seq, "response discarded while unobserved");
            return Ok(ResponseOutcome::Discarded);
        }

        self.detect();
        let outcome = match payload {
            Payload::Document(document) => {
                self.resync(seq, document);
                self.stats.full_resyncs += 1;
                ResponseOutcome::Replaced
            }
            Payload::Patch(ops) => {
                if let Err(e) = self.apply_server_patch(seq, &ops) {
                    self.rebuild_queue();
                    warn!(seq, error = %e, "server patch failed; baseline kept");
                    self.settle();
                    return Err(self.record_error(e.into()));
                }
                self.stats.operations_received += ops.len() as u64;
                ResponseOutcome::Patched { applied: ops.len() }
            }
        };

        self.rebuild_queue();
        if let Some(shadow) = &self.shadow {
            self.snapshots.replace(shadow);
        }
        self.stats.responses_applied += 1;
        self.settle();
        info!(
            seq,
            generation = self.snapshots.generation(),
            pending = self.queue.len(),
            "round complete"
        );

        if !self.queue.is_empty() {
            self.flush()?;
        }
        Ok(outcome)
    }

    /// Applies server operations to the expected server state and the model.
    ///
    /// An operation the expected state rejects fails the round, leaving the
    /// operations before it applied. One that only conflicts with a local
    /// edit is skipped on the model, and the local edit stays pending.
    fn apply_server_patch(&mut self, seq: u64, ops: &[PatchOp]) -> Result<(), PatchError> {
        let (Some(shadow), Some(model)) = (self.shadow.as_mut(), self.model.as_mut()) else {
            return Ok(());
        };
        let mut result = Ok(());
        for (i, op) in ops.iter().enumerate() {
            if let Err(e) = apply_op(shadow, op) {
                result = Err(e.at_operation(i));
                break;
            }
            if let Err(e) = apply_op(model, op) {
                warn!(
                    seq,
                    path = %op.path(),
                    error = %e,
                    "server operation conflicts with a local edit"
                );
            }
        }
        self.observer.advance(model);
        result
    }

    /// Replaces the model with a full document and re-applies pending edits.
    ///
    /// Queued operations that no longer apply are dropped.
    fn resync(&mut self, seq: u64, document: Value) {
        let mut model = document.clone();
        for op in self.queue.flush() {
            if let Err(e) = apply_op(&mut model, &op) {
                warn!(seq, path = %op.path(), error = %e, "dropping queued operation");
            }
        }
        self.observer.advance(&model);
        self.shadow = Some(document);
        self.model = Some(model);
    }

    /// Stops observation, drops the model and closes the transport.
    pub fn shutdown(&mut self) -> SyncResult<()> {
        self.observer.reset();
        self.queue.flush();
        self.actions.clear();
        self.shadow = None;
        self.in_flight = None;
        self.on_ready = None;
        self.model = None;
        self.snapshots.clear();
        self.set_state(SyncState::Idle);
        info!("engine shut down");
        self.transport.close()
    }
}
