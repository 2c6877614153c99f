use serde::Deserialize;
use shared::config::{UpstreamConfig, ValidationError};
use shared::site::SiteIdentity;
use std::fs::File;
use std::path::Path;
use url::Url;

/// Overrides `upstream.api_url`, the way the static site picks its API.
pub const API_URL_ENV: &str = "PUBLIC_API_URL";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub site: SiteIdentity,
    #[serde(default)]
    pub tenant: tenant::config::Config,
    #[serde(default)]
    pub proxy: proxy::config::Config,
    #[serde(default)]
    pub client: client::config::Config,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Reads the file when one is given, applies environment overrides and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.upstream.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.upstream.api_url =
                Url::parse(api_url.trim()).map_err(|e| ConfigError::InvalidApiUrl(api_url, e))?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid PUBLIC_API_URL value {0:?}: {1}")]
    InvalidApiUrl(String, url::ParseError),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}
