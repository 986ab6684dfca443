/// Errors raised while interpreting route declarations.
///
/// The registry itself never fails; these only surface from explicit parsing
/// helpers such as `HttpMethod::from_str`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("unknown http method: {method}")]
    UnknownMethod { method: String },
}
