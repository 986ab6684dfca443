//! Declarations and their compilation into request-handling chains.
//!
//! 1. **Endpoints** (`endpoint`): verb/route/parameter specifications
//! 2. **Registry** (`registry`): per-type `ServiceConfiguration` accumulation
//! 3. **Handlers** (`handler`, `args`, `outcome`): typed method binding and
//!    result classification
//! 4. **Middleware** (`middleware`): middleware and error-handler contracts
//! 5. **Compiler** (`compiler`): synthesizes chains and registers them with a
//!    host router

pub mod args;
pub mod compiler;
pub mod endpoint;
pub mod handler;
pub mod middleware;
pub mod outcome;
pub mod registry;

// Re-export key types for convenient access.
pub use args::{Arg, ArgumentError, Args, FromArg};
pub use compiler::{compile, EndpointHandler};
pub use endpoint::{delete, get, post, put, request_mapping, EndpointSpec};
pub use handler::{Handler, HandlerRef};
pub use middleware::{
    error_handler_fn, middleware_fn, DefaultErrorHandler, ErrorHandler, ErrorHandlers, Flow,
    Middleware, Middlewares, Recovery,
};
pub use outcome::{defer, respond, Deferred, IntoOutcome, Outcome};
pub use registry::{Declare, DeclarationRegistry, Endpoint, ServiceConfiguration};
