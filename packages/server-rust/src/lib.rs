//! Waymark Server: declarative endpoint registration compiled into axum
//! handler chains.

pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod service;

pub use config::ServerConfig;
pub use error::{RegistryError, ServerError};
pub use network::{AxumHost, HostRouter, Request, ResponseWriter, ServerHandle, ServerModule};
pub use service::{Declare, DeclarationRegistry, ServiceConfiguration};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
