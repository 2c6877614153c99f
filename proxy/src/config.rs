use serde::Deserialize;
use shared::config::{Listener, ValidationError};

/// Proxy endpoint configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for proxied requests
    #[serde(default = "default_listener")]
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    /// Path the proxy endpoint is mounted on
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listener() -> Listener {
    Listener::new("0.0.0.0", 4321)
}

fn default_admin_listener() -> Listener {
    Listener::new("127.0.0.1", 4322)
}

fn default_path() -> String {
    "/api/proxy".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listener: default_listener(),
            admin_listener: default_admin_listener(),
            path: default_path(),
        }
    }
}

impl Config {
    /// Validates the proxy configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if !self.path.starts_with('/') {
            return Err(ValidationError::InvalidPath(self.path.clone()));
        }

        Ok(())
    }
}
