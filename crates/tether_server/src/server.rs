//! The document server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tether_patch::{apply_op, apply_patch, decode_patch, encode_patch, PatchOp};
use tracing::{debug, info, warn};

/// Serves one JSON document to sync clients.
///
/// A client patch is applied atomically: either every operation lands or the
/// document is left as it was. Changes made on the server side wait in an
/// outbox. They are applied right after the next client patch and returned
/// as its answer, so client and server apply the same operations in the same
/// order.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tether_server::{DocumentServer, ServerConfig};
///
/// let server = DocumentServer::new(ServerConfig::default(), json!({"hello": "world"}));
/// let answer = server
///     .handle_patch(r#"[{"op":"replace","path":"/hello","value":"galaxy"}]"#)
///     .unwrap();
/// assert_eq!(answer, "[]");
/// assert_eq!(server.document(), json!({"hello": "galaxy"}));
/// ```
pub struct DocumentServer {
    config: ServerConfig,
    document: RwLock<Value>,
    outbox: Mutex<Vec<PatchOp>>,
    resync: AtomicBool,
    requests: AtomicU64,
}

impl DocumentServer {
    /// Creates a server holding `document`.
    pub fn new(config: ServerConfig, document: Value) -> Self {
        Self {
            config,
            document: RwLock::new(document),
            outbox: Mutex::new(Vec::new()),
            resync: AtomicBool::new(false),
            requests: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns true if `path` addresses the served document.
    pub fn serves(&self, path: &str) -> bool {
        path == self.config.document_path
    }

    /// Answers a load with the full document, including waiting server changes.
    pub fn handle_get(&self) -> String {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut outbox = self.outbox.lock();
        let mut document = self.document.write();
        for op in outbox.drain(..) {
            if let Err(e) = apply_op(&mut document, &op) {
                warn!(path = %op.path(), error = %e, "dropping server change");
            }
        }
        debug!("document requested");
        document.to_string()
    }

    /// Applies a client patch and returns the answer body.
    ///
    /// The answer is the full document if a resync was scheduled, otherwise
    /// the server-side operations queued since the last answer.
    pub fn handle_patch(&self, body: &str) -> ServerResult<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let ops = decode_patch(body)?;
        if ops.len() > self.config.max_ops_per_request {
            return Err(ServerError::TooManyOperations {
                count: ops.len(),
                max: self.config.max_ops_per_request,
            });
        }

        let mut outbox = self.outbox.lock();
        let mut document = self.document.write();
        let mut next = document.clone();
        apply_patch(&mut next, &ops)?;
        info!(ops = ops.len(), "client patch applied");

        let mut outgoing = Vec::with_capacity(outbox.len());
        for op in outbox.drain(..) {
            match apply_op(&mut next, &op) {
                Ok(()) => outgoing.push(op),
                Err(e) => warn!(path = %op.path(), error = %e, "dropping server change"),
            }
        }
        *document = next;

        if self.resync.swap(false, Ordering::SeqCst) {
            debug!("answering with full document");
            return Ok(document.to_string());
        }
        debug!(ops = outgoing.len(), "answering with server changes");
        Ok(encode_patch(&outgoing)?)
    }

    /// Queues a server-side change for the next answer.
    ///
    /// The change must apply to the document as it will stand once the
    /// changes already queued have landed.
    pub fn push_change(&self, op: PatchOp) -> ServerResult<()> {
        let mut outbox = self.outbox.lock();
        let mut preview = self.document.read().clone();
        apply_patch(&mut preview, &outbox)?;
        apply_op(&mut preview, &op)?;
        debug!(path = %op.path(), "server change queued");
        outbox.push(op);
        Ok(())
    }

    /// Makes the next answer carry the full document.
    pub fn schedule_resync(&self) {
        self.resync.store(true, Ordering::SeqCst);
    }

    /// Returns a copy of the document, without server changes still queued.
    pub fn document(&self) -> Value {
        self.document.read().clone()
    }

    /// Returns the number of requests handled.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Returns the number of server changes waiting for a client.
    pub fn queued_changes(&self) -> usize {
        self.outbox.lock().len()
    }
}
