//! Errors raised while declaring services and while starting and stopping a
//! server.

use tokio::task::JoinError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server is not running")]
    NotRunning,
    #[error("server task failed: {0}")]
    Join(#[from] JoinError),
}

/// Rejected declaration or resolution of a service type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("declarations for {service} are frozen")]
    Frozen { service: &'static str },
    #[error("declarations for {service} are being resolved")]
    Resolving { service: &'static str },
    #[error("stored declarations for {service} have an unexpected type")]
    TypeMismatch { service: &'static str },
}
