//! Transport layer abstraction for sync requests.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Media type of an outbound patch body.
pub const PATCH_MEDIA_TYPE: &str = "application/json-patch+json";

/// An outbound request.
///
/// A request without a body is the initial load; every other request carries
/// a JSON array of patch operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Sequence number, strictly increasing per engine.
    pub seq: u64,
    /// Target URL.
    pub url: String,
    /// Serialized patch, absent for the initial load.
    pub body: Option<String>,
}

impl SyncRequest {
    /// Creates a bodyless initial-load request.
    pub fn fetch(seq: u64, url: impl Into<String>) -> Self {
        Self {
            seq,
            url: url.into(),
            body: None,
        }
    }

    /// Creates a patch request.
    pub fn patch(seq: u64, url: impl Into<String>, body: String) -> Self {
        Self {
            seq,
            url: url.into(),
            body: Some(body),
        }
    }

    /// Returns true for the bodyless initial load.
    pub fn is_fetch(&self) -> bool {
        self.body.is_none()
    }
}

/// The outcome of a request, delivered after `send` has returned.
#[derive(Debug)]
pub struct Completion {
    /// Sequence number of the request this answers.
    pub seq: u64,
    /// Response body, or the reason the request did not complete.
    pub result: SyncResult<String>,
}

impl Completion {
    /// Creates a successful completion.
    pub fn ok(seq: u64, body: impl Into<String>) -> Self {
        Self {
            seq,
            result: Ok(body.into()),
        }
    }

    /// Creates a failed completion.
    pub fn failed(seq: u64, error: SyncError) -> Self {
        Self {
            seq,
            result: Err(error),
        }
    }
}

/// A sync transport carries requests to the server.
///
/// `send` only dispatches; it must not wait for the response. Responses are
/// handed back either by the host calling `SyncEngine::receive`, or by the
/// transport queueing them for `poll` so `SyncEngine::pump` can drain them.
pub trait SyncTransport: Send + Sync {
    /// Dispatches a request.
    fn send(&self, request: &SyncRequest) -> SyncResult<()>;

    /// Returns the next finished request, if any.
    fn poll(&self) -> Option<Completion>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> SyncResult<()>;
}

/// A mock transport for testing.
///
/// Records every request and leaves it unanswered until the test responds,
/// in the order the requests were sent.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    sent: Mutex<Vec<SyncRequest>>,
    unanswered: Mutex<VecDeque<u64>>,
    completions: Mutex<VecDeque<Completion>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
            unanswered: Mutex::new(VecDeque::new()),
            completions: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.sent.lock().clone()
    }

    /// Returns the number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> Option<SyncRequest> {
        self.sent.lock().last().cloned()
    }

    /// Returns the bodies of all patch requests, in order.
    pub fn patch_bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|r| r.body.clone())
            .collect()
    }

    /// Returns the number of requests still waiting for a response.
    pub fn unanswered(&self) -> usize {
        self.unanswered.lock().len()
    }

    /// Answers the oldest unanswered request with `body`.
    ///
    /// Returns the answered sequence number.
    pub fn respond(&self, body: impl Into<String>) -> Option<u64> {
        let seq = self.unanswered.lock().pop_front()?;
        self.completions.lock().push_back(Completion::ok(seq, body));
        Some(seq)
    }

    /// Fails the oldest unanswered request with a retryable transport error.
    pub fn fail(&self, message: &str) -> Option<u64> {
        let seq = self.unanswered.lock().pop_front()?;
        self.completions
            .lock()
            .push_back(Completion::failed(seq, SyncError::transport_retryable(message)));
        Some(seq)
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTransport for MockTransport {
    fn send(&self, request: &SyncRequest) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::transport_retryable("not connected"));
        }
        self.sent.lock().push(request.clone());
        self.unanswered.lock().push_back(request.seq);
        Ok(())
    }

    fn poll(&self) -> Option<Completion> {
        self.completions.lock().pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
