use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Upstream URL must use http or https: {0}")]
    InvalidUpstreamScheme(Url),
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Where the content API lives.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL every endpoint is appended to, e.g.
    /// `https://taita-api.onrender.com/api`.
    ///
    /// Note: Uses the `url::Url` type so invalid URLs are rejected during
    /// config deserialization.
    #[serde(default = "default_api_url")]
    pub api_url: Url,
}

fn default_api_url() -> Url {
    Url::parse("https://taita-api.onrender.com/api").expect("default API URL is valid")
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.api_url.scheme() {
            "http" | "https" => Ok(()),
            _ => Err(ValidationError::InvalidUpstreamScheme(self.api_url.clone())),
        }
    }

    /// Joins the base URL and an endpoint without dropping the base path.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        let base = self.api_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{}", crate::api::normalize_endpoint(endpoint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_upstream() {
        let config = UpstreamConfig::default();
        assert_eq!(config.api_url.host_str(), Some("taita-api.onrender.com"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let config: UpstreamConfig =
            serde_yaml::from_str("api_url: http://127.0.0.1:3000/api/").unwrap();
        assert_eq!(
            config.endpoint_url("posts/public").unwrap().as_str(),
            "http://127.0.0.1:3000/api/posts/public"
        );
        assert_eq!(
            config.endpoint_url("/posts/uuid/abc?x=1").unwrap().as_str(),
            "http://127.0.0.1:3000/api/posts/uuid/abc?x=1"
        );
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            Listener::new("0.0.0.0", 0).validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let config: UpstreamConfig = serde_yaml::from_str("api_url: ftp://example.com/api").unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidUpstreamScheme(_)
        ));

        assert!(serde_yaml::from_str::<UpstreamConfig>("api_url: not-a-url").is_err());
    }
}
