use serde::Deserialize;
use url::Url;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Same-origin proxy endpoint used when a direct call fails
    #[serde(default = "default_proxy_url")]
    pub proxy_url: Url,
}

fn default_proxy_url() -> Url {
    Url::parse("http://127.0.0.1:4321/api/proxy").expect("default proxy URL is valid")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config: Config =
            serde_yaml::from_str("proxy_url: https://acme.taita.blog/api/proxy").unwrap();
        assert_eq!(config.proxy_url.path(), "/api/proxy");

        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());

        assert!(serde_yaml::from_str::<Config>("proxy_url: /api/proxy").is_err());
    }
}
