//! # Tether Sync Engine
//!
//! Client-side engine that keeps a JSON model in sync with a server by
//! exchanging JSON patches.
//!
//! This crate provides:
//! - Sync state machine (idle → awaiting initial → ready ⇄ sending)
//! - Baseline snapshots and dirty-checking change detection
//! - A pending queue that coalesces repeated writes to a path
//! - Per-field flush policies (on commit, or on every input), plus `touch`
//!   for actions that write a value a field already holds
//! - Transport abstraction with an HTTP implementation
//!
//! ## Architecture
//!
//! The engine is sans-IO. The host owns the model's lifecycle and drives
//! the engine with events:
//! 1. `initialize` requests the document; its response seeds the baseline
//! 2. `input` and `commit` diff the live model against the last accounted
//!    state and queue the resulting operations
//! 3. `flush` sends the queue as one patch when no request is in flight
//! 4. `receive` (or `pump`) applies the server's answer to the model and to
//!    the expected server state, re-computes what is still pending against
//!    that state, and re-baselines
//!
//! ## Key Invariants
//!
//! - At most one request is in flight
//! - Pending operations always apply to the expected server state
//! - The baseline changes only after a response is fully applied
//! - An empty queue never produces a request

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod observer;
mod queue;
mod snapshot;
mod state;
mod transport;

pub use config::{EngineConfig, FlushPolicy};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer};
pub use observer::ChangeObserver;
pub use queue::ChangeQueue;
pub use snapshot::{Snapshot, SnapshotStore};
pub use state::{FlushOutcome, ResponseOutcome, SyncEngine, SyncState, SyncStats};
pub use transport::{Completion, MockTransport, SyncRequest, SyncTransport, PATCH_MEDIA_TYPE};
