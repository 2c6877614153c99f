use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Bare domain the blog platform itself is served from. The root and its
    /// `www.` variant resolve to the demo tenant.
    #[serde(default = "default_root_domain")]
    pub root_domain: String,
}

fn default_root_domain() -> String {
    "taita.blog".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_domain: default_root_domain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str("root_domain: example.org").unwrap();
        assert_eq!(config.root_domain, "example.org");

        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }
}
