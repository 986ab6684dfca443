//! Server bootstrap: collects services, compiles them into a host, and owns
//! the running server.
//!
//! The lifecycle has three steps:
//! 1. `new()` -- allocates the declaration registry
//! 2. `service()` / `declared_service()` -- binds service instances to their
//!    frozen declarations
//! 3. `configure()` wires everything into an external host, or `start()`
//!    builds the axum router, binds the listener, and returns a
//!    [`ServerHandle`]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use waymark_core::BodyPolicy;

use super::axum_host::AxumHost;
use super::host::HostRouter;
use super::middleware::build_http_layers;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::service::compiler::compile;
use crate::service::registry::{Declare, DeclarationRegistry};

type Installer = Box<dyn FnOnce(&mut dyn HostRouter, BodyPolicy) -> usize + Send>;

/// Collects service instances and turns them into a running server.
pub struct ServerModule {
    config: ServerConfig,
    registry: Arc<DeclarationRegistry>,
    installers: Vec<Installer>,
}

impl ServerModule {
    /// Creates a module with its own empty declaration registry.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, Arc::new(DeclarationRegistry::new()))
    }

    /// Creates a module that resolves declarations from a shared registry.
    #[must_use]
    pub fn with_registry(config: ServerConfig, registry: Arc<DeclarationRegistry>) -> Self {
        Self {
            config,
            registry,
            installers: Vec::new(),
        }
    }

    /// Returns a shared reference to the declaration registry.
    #[must_use]
    pub fn registry(&self) -> Arc<DeclarationRegistry> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Adds a service whose type describes its own endpoints.
    #[must_use]
    pub fn service<S: Declare>(self, instance: S) -> Self {
        self.service_arc(Arc::new(instance))
    }

    /// Like [`service`](Self::service) for an instance that is shared
    /// elsewhere.
    ///
    /// A type that cannot be resolved (see [`DeclarationRegistry::resolve`])
    /// is skipped with a warning.
    #[must_use]
    pub fn service_arc<S: Declare>(mut self, instance: Arc<S>) -> Self {
        match self.registry.resolve::<S>() {
            Ok(config) => self.installers.push(Box::new(
                move |host: &mut dyn HostRouter, policy: BodyPolicy| {
                    compile(&instance, &config, policy, host)
                },
            )),
            Err(err) => warn!(
                service = std::any::type_name::<S>(),
                error = %err,
                "Service skipped"
            ),
        }
        self
    }

    /// Adds a service declared only through [`registry`](Self::registry).
    /// A type with no declarations registers nothing.
    #[must_use]
    pub fn declared_service<S>(mut self, instance: Arc<S>) -> Self
    where
        S: Send + Sync + 'static,
    {
        match self.registry.finalize::<S>() {
            Some(config) => self.installers.push(Box::new(
                move |host: &mut dyn HostRouter, policy: BodyPolicy| {
                    compile(&instance, &config, policy, host)
                },
            )),
            None => warn!(
                service = std::any::type_name::<S>(),
                "Service has no declarations; nothing to register"
            ),
        }
        self
    }

    /// Registers every collected service with `host`, in the order the
    /// services were added. Returns the number of registrations.
    pub fn configure(&mut self, host: &mut dyn HostRouter) -> usize {
        let policy = self.config.body_policy;
        let mut registered = 0;
        for install in self.installers.drain(..) {
            registered += install(&mut *host, policy);
        }
        registered
    }

    /// Compiles all services into an axum router wrapped in the HTTP layers.
    #[must_use]
    pub fn build_router(mut self) -> Router {
        let mut host = AxumHost::new(self.config.body_limit_bytes);
        let registered = self.configure(&mut host);
        info!(routes = registered, "Router built");
        host.into_router().layer(build_http_layers(&self.config))
    }

    /// Binds the configured address and starts serving in a background task.
    ///
    /// Port 0 binds an OS-assigned port; read it back with
    /// [`ServerHandle::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let router = self.build_router();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Server listening on {}", local_addr);

        Ok(ServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// A running server.
///
/// Dropping the handle without calling [`stop`](Self::stop) also triggers
/// graceful shutdown, but nothing waits for it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Signals graceful shutdown and waits for in-flight requests to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotRunning`] if the server was already stopped,
    /// or the error the serve loop ended with.
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        let (Some(shutdown), Some(task)) = (self.shutdown.take(), self.task.take()) else {
            return Err(ServerError::NotRunning);
        };
        let _ = shutdown.send(());
        task.await??;
        info!("Server on {} stopped", self.local_addr);
        Ok(())
    }
}
