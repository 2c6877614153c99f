use http::StatusCode;
use shared::config::ValidationError;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
    #[error("Se requiere un endpoint")]
    MissingEndpoint,
    #[error("invalid proxy request: {0}")]
    InvalidRequest(String),
    #[error("failed to read request body: {0}")]
    RequestBody(String),
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("not found")]
    NotFound,
    #[error("invalid upstream URL: {0}")]
    InvalidUpstreamUrl(#[from] url::ParseError),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl ProxyError {
    /// Status code the proxy answers with when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingEndpoint | ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
