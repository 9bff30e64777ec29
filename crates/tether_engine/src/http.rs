//! HTTP transport implementation.
//!
//! The initial load is a `GET` of the model URL; every later round is a
//! `PATCH` carrying a JSON patch body. The actual HTTP client is abstracted
//! via a trait so any blocking or callback-driven client can back it.

use crate::error::{SyncError, SyncResult};
use crate::transport::{Completion, SyncRequest, SyncTransport, PATCH_MEDIA_TYPE};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    fn get(&self, url: &str) -> Result<String, String>;

    /// Sends a PATCH request and returns the response body.
    fn patch(&self, url: &str, content_type: &str, body: &str) -> Result<String, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based sync transport.
///
/// Each response is queued as a [`Completion`] for the engine to pick up
/// through `SyncEngine::pump`.
pub struct HttpTransport<C: HttpClient> {
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
    completions: Mutex<VecDeque<Completion>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(client: C) -> Self {
        Self {
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
            completions: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the number of completions not yet polled.
    pub fn queued(&self) -> usize {
        self.completions.lock().len()
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn send(&self, request: &SyncRequest) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::transport_retryable("not connected"));
        }

        let response = match &request.body {
            None => self.client.get(&request.url),
            Some(body) => self.client.patch(&request.url, PATCH_MEDIA_TYPE, body),
        };
        debug!(seq = request.seq, ok = response.is_ok(), "http round finished");

        let completion = match response {
            Ok(body) => {
                *self.last_error.write() = None;
                Completion::ok(request.seq, body)
            }
            Err(e) => {
                *self.last_error.write() = Some(e.clone());
                Completion::failed(request.seq, SyncError::transport_retryable(e))
            }
        };
        self.completions.lock().push_back(completion);
        Ok(())
    }

    fn poll(&self) -> Option<Completion> {
        self.completions.lock().pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a GET request and returns the response body.
    fn handle_get(&self, path: &str) -> Result<String, String>;

    /// Handles a PATCH request and returns the response body.
    fn handle_patch(&self, path: &str, body: &str) -> Result<String, String>;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server this client talks to.
    pub fn server(&self) -> &S {
        &self.server
    }
}

fn path_of(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        }
        None => url,
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str) -> Result<String, String> {
        self.server.handle_get(path_of(url))
    }

    fn patch(&self, url: &str, content_type: &str, body: &str) -> Result<String, String> {
        if content_type != PATCH_MEDIA_TYPE {
            return Err(format!("unsupported media type: {content_type}"));
        }
        self.server.handle_patch(path_of(url), body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestClient {
        response: RwLock<Option<String>>,
        healthy: AtomicBool,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                healthy: AtomicBool::new(true),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn set_response(&self, resp: &str) {
            *self.response.write() = Some(resp.to_string());
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }

        fn answer(&self) -> Result<String, String> {
            self.response
                .read()
                .clone()
                .ok_or_else(|| "No response set".into())
        }
    }

    impl HttpClient for TestClient {
        fn get(&self, _url: &str) -> Result<String, String> {
            self.calls.lock().push(("GET".into(), None));
            self.answer()
        }

        fn patch(&self, _url: &str, content_type: &str, body: &str) -> Result<String, String> {
            assert_eq!(content_type, PATCH_MEDIA_TYPE);
            self.calls.lock().push(("PATCH".into(), Some(body.to_string())));
            self.answer()
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn transport_disconnect() {
        let transport = HttpTransport::new(TestClient::new());
        assert!(transport.is_connected());
        transport.close().unwrap();
        assert!(!transport.is_connected());

        let result = transport.send(&SyncRequest::fetch(1, "https://app.example.com/model"));
        assert!(matches!(result, Err(SyncError::Transport { .. })));
    }

    #[test]
    fn transport_unhealthy_client() {
        let client = TestClient::new();
        client.set_healthy(false);
        let transport = HttpTransport::new(client);
        assert!(!transport.is_connected());
    }

    #[test]
    fn fetch_is_get_and_patch_is_patch() {
        let client = TestClient::new();
        client.set_response("[]");
        let transport = HttpTransport::new(client);

        transport
            .send(&SyncRequest::fetch(1, "https://app.example.com/model"))
            .unwrap();
        transport
            .send(&SyncRequest::patch(2, "https://app.example.com/model", "[]".into()))
            .unwrap();

        let calls = transport.client().calls.lock().clone();
        assert_eq!(calls[0], ("GET".to_string(), None));
        assert_eq!(calls[1], ("PATCH".to_string(), Some("[]".to_string())));
        assert_eq!(transport.queued(), 2);
        assert_eq!(transport.poll().unwrap().seq, 1);
        assert_eq!(transport.poll().unwrap().seq, 2);
        assert!(transport.poll().is_none());
    }

    #[test]
    fn client_failure_becomes_failed_completion() {
        let transport = HttpTransport::new(TestClient::new());
        transport
            .send(&SyncRequest::fetch(7, "https://app.example.com/model"))
            .unwrap();

        let completion = transport.poll().unwrap();
        assert_eq!(completion.seq, 7);
        assert!(completion.result.unwrap_err().is_retryable());
        assert_eq!(transport.last_error().as_deref(), Some("No response set"));
        assert!(transport.is_connected());
    }

    #[test]
    fn loopback_paths() {
        assert_eq!(path_of("https://app.example.com/model"), "/model");
        assert_eq!(path_of("http://localhost:8080"), "/");
        assert_eq!(path_of("/model"), "/model");
    }
}
