use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use waymark_core::{normalize_base_route, EndpointDeclaration};

use super::endpoint::EndpointSpec;
use super::handler::{Handler, HandlerRef};
use super::middleware::{ErrorHandler, ErrorHandlers, Middleware, Middlewares};
use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A declaration paired with the typed handler it dispatches to.
#[derive(Debug)]
pub struct Endpoint<S> {
    pub declaration: EndpointDeclaration,
    pub handler: HandlerRef<S>,
}

// ---------------------------------------------------------------------------
// ServiceConfiguration
// ---------------------------------------------------------------------------

/// Everything declared for one service type.
///
/// Built incrementally at declaration time and frozen behind an `Arc` when
/// the service is bootstrapped.
pub struct ServiceConfiguration<S> {
    base_route: String,
    endpoints: Vec<Endpoint<S>>,
    class_middleware: Vec<Arc<dyn Middleware>>,
    endpoint_middleware: HashMap<String, Vec<Arc<dyn Middleware>>>,
    class_error_handlers: Vec<Arc<dyn ErrorHandler>>,
    endpoint_error_handlers: HashMap<String, Vec<Arc<dyn ErrorHandler>>>,
}

impl<S: 'static> ServiceConfiguration<S> {
    /// Creates an empty configuration with the empty base route.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_route: String::new(),
            endpoints: Vec::new(),
            class_middleware: Vec::new(),
            endpoint_middleware: HashMap::new(),
            class_error_handlers: Vec::new(),
            endpoint_error_handlers: HashMap::new(),
        }
    }

    /// Sets the base route prefixed to every endpoint. Repeated calls
    /// overwrite.
    pub fn declare_route(&mut self, route: &str) -> &mut Self {
        self.base_route = normalize_base_route(route);
        self
    }

    /// Appends an endpoint. Declaration order is registration order.
    pub fn declare_endpoint<H, T>(
        &mut self,
        spec: EndpointSpec,
        handler_name: &str,
        handler: H,
    ) -> &mut Self
    where
        H: Handler<S, T>,
        T: 'static,
    {
        self.endpoints.push(Endpoint {
            declaration: spec.declare(handler_name),
            handler: HandlerRef::new(handler),
        });
        self
    }

    /// Attaches middleware.
    ///
    /// With a handler name the middleware is appended to that endpoint's
    /// list. Without one, the class-level list is replaced wholesale: a second
    /// class-level declaration overwrites the first.
    pub fn declare_middleware(
        &mut self,
        middleware: impl Into<Middlewares>,
        handler_name: Option<&str>,
    ) -> &mut Self {
        let Middlewares(list) = middleware.into();
        match handler_name {
            Some(name) => self
                .endpoint_middleware
                .entry(name.to_string())
                .or_default()
                .extend(list),
            None => self.class_middleware = list,
        }
        self
    }

    /// Attaches error handlers, with the same append/replace rules as
    /// [`declare_middleware`](Self::declare_middleware).
    pub fn declare_error_handler(
        &mut self,
        handlers: impl Into<ErrorHandlers>,
        handler_name: Option<&str>,
    ) -> &mut Self {
        let ErrorHandlers(list) = handlers.into();
        match handler_name {
            Some(name) => self
                .endpoint_error_handlers
                .entry(name.to_string())
                .or_default()
                .extend(list),
            None => self.class_error_handlers = list,
        }
        self
    }
}

impl<S> ServiceConfiguration<S> {
    #[must_use]
    pub fn base_route(&self) -> &str {
        &self.base_route
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint<S>] {
        &self.endpoints
    }

    #[must_use]
    pub fn class_middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.class_middleware
    }

    #[must_use]
    pub fn endpoint_middleware(&self, handler_name: &str) -> &[Arc<dyn Middleware>] {
        self.endpoint_middleware
            .get(handler_name)
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn class_error_handlers(&self) -> &[Arc<dyn ErrorHandler>] {
        &self.class_error_handlers
    }

    #[must_use]
    pub fn endpoint_error_handlers(&self, handler_name: &str) -> &[Arc<dyn ErrorHandler>] {
        self.endpoint_error_handlers
            .get(handler_name)
            .map_or(&[], Vec::as_slice)
    }
}

impl<S: 'static> Default for ServiceConfiguration<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Declare trait
// ---------------------------------------------------------------------------

/// Implemented by service types that describe their own endpoints.
///
/// `declare` runs at most once per registry, the first time the type is
/// resolved.
pub trait Declare: Send + Sync + Sized + 'static {
    fn declare(config: &mut ServiceConfiguration<Self>);
}

// ---------------------------------------------------------------------------
// DeclarationRegistry
// ---------------------------------------------------------------------------

/// Per-type declaration store.
///
/// Configurations are keyed by the `TypeId` of the service type. While
/// declarations are still accumulating a slot is pending; resolving the type
/// moves its configuration behind an `Arc`, after which it is read-only and
/// shared. Declaring anything for a resolved type is rejected.
///
/// Resolution is serialized: concurrent `resolve`/`finalize` calls for the
/// same type run [`Declare::declare`] once and all observe the same `Arc`.
pub struct DeclarationRegistry {
    slots: DashMap<TypeId, Slot>,
    resolving: ReentrantMutex<()>,
}

enum Slot {
    Pending(Box<dyn Any + Send + Sync>),
    Resolving,
    Frozen(Arc<dyn Any + Send + Sync>),
}

impl DeclarationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            resolving: ReentrantMutex::new(()),
        }
    }

    /// Runs `f` against the pending configuration of `S`, creating it on
    /// first use. `f` runs under the slot's shard lock and must not call
    /// back into the registry.
    fn with<S>(&self, f: impl FnOnce(&mut ServiceConfiguration<S>)) -> Result<(), RegistryError>
    where
        S: Send + Sync + 'static,
    {
        let service = std::any::type_name::<S>();
        let mut slot = self
            .slots
            .entry(TypeId::of::<S>())
            .or_insert_with(|| Slot::Pending(Box::new(ServiceConfiguration::<S>::new())));
        match slot.value_mut() {
            Slot::Pending(boxed) => {
                let config = boxed
                    .downcast_mut::<ServiceConfiguration<S>>()
                    .ok_or(RegistryError::TypeMismatch { service })?;
                f(config);
                Ok(())
            }
            Slot::Resolving => Err(RegistryError::Resolving { service }),
            Slot::Frozen(_) => Err(RegistryError::Frozen { service }),
        }
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] once `S` has been resolved.
    pub fn declare_route<S>(&self, route: &str) -> Result<(), RegistryError>
    where
        S: Send + Sync + 'static,
    {
        self.with::<S>(|config| {
            config.declare_route(route);
        })
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] once `S` has been resolved.
    pub fn declare_endpoint<S, H, T>(
        &self,
        spec: EndpointSpec,
        handler_name: &str,
        handler: H,
    ) -> Result<(), RegistryError>
    where
        S: Send + Sync + 'static,
        H: Handler<S, T>,
        T: 'static,
    {
        self.with::<S>(|config| {
            config.declare_endpoint(spec, handler_name, handler);
        })
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] once `S` has been resolved.
    pub fn declare_middleware<S>(
        &self,
        middleware: impl Into<Middlewares>,
        handler_name: Option<&str>,
    ) -> Result<(), RegistryError>
    where
        S: Send + Sync + 'static,
    {
        let middleware = middleware.into();
        self.with::<S>(|config| {
            config.declare_middleware(middleware, handler_name);
        })
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] once `S` has been resolved.
    pub fn declare_error_handler<S>(
        &self,
        handlers: impl Into<ErrorHandlers>,
        handler_name: Option<&str>,
    ) -> Result<(), RegistryError>
    where
        S: Send + Sync + 'static,
    {
        let handlers = handlers.into();
        self.with::<S>(|config| {
            config.declare_error_handler(handlers, handler_name);
        })
    }

    /// Returns `true` if anything has been declared for `S`, frozen or not.
    #[must_use]
    pub fn contains<S: 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<S>())
    }

    /// Freezes and returns the configuration of `S` built from explicit
    /// declarations only. Returns `None` if nothing was declared.
    pub fn finalize<S>(&self) -> Option<Arc<ServiceConfiguration<S>>>
    where
        S: Send + Sync + 'static,
    {
        let _resolving = self.resolving.lock();
        let mut slot = self.slots.get_mut(&TypeId::of::<S>())?;
        match std::mem::replace(slot.value_mut(), Slot::Resolving) {
            Slot::Pending(boxed) => {
                let config: Arc<dyn Any + Send + Sync> = Arc::from(boxed);
                *slot.value_mut() = Slot::Frozen(Arc::clone(&config));
                config.downcast().ok()
            }
            Slot::Frozen(config) => {
                *slot.value_mut() = Slot::Frozen(Arc::clone(&config));
                config.downcast().ok()
            }
            Slot::Resolving => None,
        }
    }

    /// Freezes and returns the configuration of `S`, running
    /// [`Declare::declare`] on top of any explicit declarations the first
    /// time the type is resolved.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Resolving`] when called for `S` from inside
    /// its own `declare`.
    pub fn resolve<S: Declare>(&self) -> Result<Arc<ServiceConfiguration<S>>, RegistryError> {
        let service = std::any::type_name::<S>();
        let key = TypeId::of::<S>();
        let _resolving = self.resolving.lock();

        let pending = match self.slots.entry(key) {
            Entry::Occupied(mut slot) => {
                if let Slot::Frozen(config) = slot.get() {
                    return Arc::clone(config)
                        .downcast()
                        .map_err(|_| RegistryError::TypeMismatch { service });
                }
                match slot.insert(Slot::Resolving) {
                    Slot::Pending(boxed) => Some(boxed),
                    _ => return Err(RegistryError::Resolving { service }),
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Slot::Resolving);
                None
            }
        };

        let mut config = match pending {
            Some(boxed) => *boxed
                .downcast::<ServiceConfiguration<S>>()
                .map_err(|_| RegistryError::TypeMismatch { service })?,
            None => ServiceConfiguration::new(),
        };
        S::declare(&mut config);

        let frozen = Arc::new(config);
        self.slots
            .insert(key, Slot::Frozen(frozen.clone() as Arc<dyn Any + Send + Sync>));
        Ok(frozen)
    }
}

impl Default for DeclarationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use waymark_core::HttpMethod;

    use super::*;
    use crate::service::endpoint::{get, post};
    use crate::service::middleware::{error_handler_fn, middleware_fn, Flow, Recovery};

    struct TestService;

    impl TestService {
        fn get_message(&self) -> &'static str {
            "hello!"
        }

        fn set_message(&self, _message: String) {}

        fn hello(&self, name: String, message: String) -> String {
            format!("{message} {name}")
        }
    }

    fn pass() -> Arc<dyn Middleware> {
        middleware_fn(|_, _| Flow::Continue)
    }

    fn forward() -> Arc<dyn ErrorHandler> {
        error_handler_fn(|failure, _, _| Recovery::Forward(failure))
    }

    #[test]
    fn endpoints_keep_declaration_order() {
        let mut config = ServiceConfiguration::<TestService>::new();
        config
            .declare_endpoint(get(""), "get_message", TestService::get_message)
            .declare_endpoint(post(""), "set_message", TestService::set_message)
            .declare_endpoint(get("/hello/:name").query(["message"]), "hello", TestService::hello);

        let names: Vec<_> = config
            .endpoints()
            .iter()
            .map(|e| e.declaration.handler_name.as_str())
            .collect();
        assert_eq!(names, vec!["get_message", "set_message", "hello"]);
        assert_eq!(config.endpoints()[1].declaration.http_method, HttpMethod::Post);
        assert_eq!(config.endpoints()[2].declaration.path_param_names, vec!["name"]);
    }

    #[test]
    fn base_route_defaults_empty_and_is_overwritten() {
        let mut config = ServiceConfiguration::<TestService>::new();
        assert_eq!(config.base_route(), "");
        config.declare_route("/hi");
        config.declare_route("/");
        assert_eq!(config.base_route(), "");
        config.declare_route("hello/");
        assert_eq!(config.base_route(), "/hello");
    }

    #[test]
    fn class_middleware_is_replaced_not_appended() {
        let mut config = ServiceConfiguration::<TestService>::new();
        config.declare_middleware(vec![pass(), pass()], None);
        config.declare_middleware(pass(), None);
        assert_eq!(config.class_middleware().len(), 1);
    }

    #[test]
    fn endpoint_middleware_is_appended() {
        let mut config = ServiceConfiguration::<TestService>::new();
        config.declare_middleware(pass(), Some("set_message"));
        config.declare_middleware(vec![pass(), pass()], Some("set_message"));
        assert_eq!(config.endpoint_middleware("set_message").len(), 3);
        assert!(config.endpoint_middleware("get_message").is_empty());
    }

    #[test]
    fn error_handlers_follow_the_same_rules() {
        let mut config = ServiceConfiguration::<TestService>::new();
        config.declare_error_handler(vec![forward(), forward()], None);
        config.declare_error_handler(forward(), None);
        config.declare_error_handler(forward(), Some("hello"));
        config.declare_error_handler(forward(), Some("hello"));
        assert_eq!(config.class_error_handlers().len(), 1);
        assert_eq!(config.endpoint_error_handlers("hello").len(), 2);
    }

    #[test]
    fn registry_accumulates_per_type() {
        let registry = DeclarationRegistry::new();
        assert!(!registry.contains::<TestService>());

        registry.declare_route::<TestService>("/hi").unwrap();
        registry
            .declare_endpoint::<TestService, _, _>(get(""), "get_message", TestService::get_message)
            .unwrap();
        registry.declare_middleware::<TestService>(pass(), None).unwrap();
        registry
            .declare_error_handler::<TestService>(forward(), Some("get_message"))
            .unwrap();
        assert!(registry.contains::<TestService>());

        let config = registry.finalize::<TestService>().unwrap();
        assert_eq!(config.base_route(), "/hi");
        assert_eq!(config.endpoints().len(), 1);
        assert_eq!(config.class_middleware().len(), 1);
        assert_eq!(config.endpoint_error_handlers("get_message").len(), 1);

        let again = registry.finalize::<TestService>().unwrap();
        assert!(Arc::ptr_eq(&config, &again));
    }

    #[test]
    fn finalize_without_declarations_is_none() {
        let registry = DeclarationRegistry::new();
        assert!(registry.finalize::<TestService>().is_none());
    }

    #[test]
    fn declaring_after_freeze_is_rejected() {
        let registry = DeclarationRegistry::new();
        registry.declare_route::<TestService>("/hi").unwrap();
        let config = registry.finalize::<TestService>().unwrap();

        let err = registry.declare_route::<TestService>("/other").unwrap_err();
        assert!(matches!(err, RegistryError::Frozen { .. }));
        assert!(err.to_string().contains("TestService"));
        assert!(registry
            .declare_middleware::<TestService>(pass(), None)
            .is_err());

        let again = registry.finalize::<TestService>().unwrap();
        assert!(Arc::ptr_eq(&config, &again));
        assert_eq!(again.base_route(), "/hi");
        assert!(again.class_middleware().is_empty());
    }

    static DECLARE_CALLS: AtomicU32 = AtomicU32::new(0);

    struct SelfDeclared;

    impl SelfDeclared {
        fn ping(&self) -> &'static str {
            "pong"
        }
    }

    impl Declare for SelfDeclared {
        fn declare(config: &mut ServiceConfiguration<Self>) {
            DECLARE_CALLS.fetch_add(1, Ordering::SeqCst);
            config
                .declare_route("/svc")
                .declare_endpoint(get("/ping"), "ping", SelfDeclared::ping);
        }
    }

    #[test]
    fn resolve_declares_once_after_explicit_declarations() {
        let registry = DeclarationRegistry::new();
        registry
            .declare_middleware::<SelfDeclared>(pass(), Some("ping"))
            .unwrap();

        let first = registry.resolve::<SelfDeclared>().unwrap();
        let second = registry.resolve::<SelfDeclared>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(DECLARE_CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(first.base_route(), "/svc");
        assert_eq!(first.endpoints().len(), 1);
        assert_eq!(first.endpoint_middleware("ping").len(), 1);
    }

    static RACED_DECLARE_CALLS: AtomicU32 = AtomicU32::new(0);

    struct Raced;

    impl Raced {
        fn ping(&self) -> &'static str {
            "pong"
        }
    }

    impl Declare for Raced {
        fn declare(config: &mut ServiceConfiguration<Self>) {
            RACED_DECLARE_CALLS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(10));
            config.declare_endpoint(get("/ping"), "ping", Raced::ping);
        }
    }

    #[test]
    fn concurrent_resolution_declares_once() {
        let registry = DeclarationRegistry::new();
        registry
            .declare_middleware::<Raced>(pass(), Some("ping"))
            .unwrap();

        let resolved: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.resolve::<Raced>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(RACED_DECLARE_CALLS.load(Ordering::SeqCst), 1);
        assert!(resolved.iter().all(|config| Arc::ptr_eq(config, &resolved[0])));
        assert_eq!(resolved[0].endpoint_middleware("ping").len(), 1);
        assert_eq!(resolved[0].endpoints().len(), 1);
    }
}
