//! Server configuration.

/// Configuration for the document server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path the document is served at.
    pub document_path: String,
    /// Maximum operations accepted in one request.
    pub max_ops_per_request: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(document_path: impl Into<String>) -> Self {
        Self {
            document_path: document_path.into(),
            max_ops_per_request: 1000,
        }
    }

    /// Sets the maximum operations per request.
    pub fn with_max_ops_per_request(mut self, max: usize) -> Self {
        self.max_ops_per_request = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("/model")
    }
}
