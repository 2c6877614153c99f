use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API responded with status {0}")]
    Status(StatusCode),
    #[error("proxy responded with status {status}: {body}")]
    Proxy { status: StatusCode, body: String },
    #[error("no request strategies configured")]
    NoStrategies,
}
