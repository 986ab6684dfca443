//! Server configuration.

use waymark_core::BodyPolicy;

use crate::network::axum_host::DEFAULT_BODY_LIMIT;

/// Top-level configuration for a bootstrapped server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    /// Maximum accepted request body size in bytes.
    pub body_limit_bytes: usize,
    /// Whether falsy JSON bodies (`false`, `0`, `""`) reach handlers.
    pub body_policy: BodyPolicy,
}

impl ServerConfig {
    /// `host:port` as passed to the listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            body_limit_bytes: DEFAULT_BODY_LIMIT,
            body_policy: BodyPolicy::DropFalsy,
        }
    }
}
