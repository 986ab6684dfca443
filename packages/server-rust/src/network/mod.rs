//! Request/response model, host-router interface, chain execution, the axum
//! adapter, and the server bootstrap.

pub mod axum_host;
pub mod chain;
pub mod host;
pub mod middleware;
pub mod module;
pub mod request;
pub mod response;

pub use axum_host::AxumHost;
pub use host::{ChainLink, HostRouter, RecordingHost, RequestHandler};
pub use middleware::build_http_layers;
pub use module::{ServerHandle, ServerModule};
pub use request::Request;
pub use response::{ByteStream, ResponseBody, ResponseWriter};
