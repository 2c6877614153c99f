use crate::config::Config;
use serde::Serialize;
use shared::site::{DEFAULT_SUBDOMAIN, SUBDOMAIN_PARAM};
use url::Url;

/// Subdomain used for custom domains that carry no tenant label.
pub const FALLBACK_SUBDOMAIN: &str = "default";

/// Tenant derived from a single inbound request. Never persisted.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    pub subdomain: String,
    pub domain: String,
    pub host: String,
    pub is_localhost: bool,
}

pub struct TenantResolver {
    root_domain: String,
}

impl TenantResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            root_domain: config.root_domain.to_ascii_lowercase(),
        }
    }

    /// Resolves the tenant from the `Host` header and the request URL.
    ///
    /// Rules are evaluated in order and the first match wins. Resolution
    /// never fails: an unparseable URL on localhost falls back to the demo
    /// tenant, and an unrecognized host leaves everything but `host` empty.
    pub fn resolve(&self, host: &str, request_url: &str) -> TenantInfo {
        let mut info = TenantInfo {
            host: host.to_string(),
            ..Default::default()
        };

        if is_loopback(host) {
            info.is_localhost = true;
            info.subdomain = query_subdomain(request_url).unwrap_or_else(|| DEFAULT_SUBDOMAIN.into());
            return info;
        }

        let bare = strip_port(host).to_ascii_lowercase();
        let www_root = format!("www.{}", self.root_domain);
        if !self.root_domain.is_empty() && (bare == self.root_domain || bare == www_root) {
            info.subdomain = DEFAULT_SUBDOMAIN.into();
            info.domain = bare;
            return info;
        }

        let labels: Vec<&str> = bare.split('.').collect();
        match labels.as_slice() {
            [first, rest @ ..] if rest.len() >= 2 && *first != "www" => {
                info.subdomain = first.to_string();
                info.domain = rest.join(".");
            }
            [_, _] => {
                info.subdomain = FALLBACK_SUBDOMAIN.into();
                info.domain = bare.clone();
            }
            ["www", rest @ ..] if rest.len() >= 2 => {
                info.subdomain = FALLBACK_SUBDOMAIN.into();
                info.domain = rest.join(".");
            }
            _ => {
                tracing::debug!(host, "host does not identify a tenant");
            }
        }

        info
    }
}

/// Lightweight derivation used where only the subdomain matters: the first
/// label of a dotted host unless it starts with `www.`, and the demo tenant
/// on localhost. Returns an empty string when nothing applies.
pub fn subdomain_from_host(host: &str) -> String {
    let bare = strip_port(host).to_ascii_lowercase();

    if bare.contains('.') && !bare.starts_with("www.") && !bare.starts_with("localhost") {
        match bare.split('.').next() {
            Some(first) if !is_loopback(&bare) => first.to_string(),
            _ => DEFAULT_SUBDOMAIN.into(),
        }
    } else if bare.contains("localhost") {
        DEFAULT_SUBDOMAIN.into()
    } else {
        String::new()
    }
}

fn is_loopback(host: &str) -> bool {
    host.contains("localhost") || host.contains("127.0.0.1")
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn query_subdomain(request_url: &str) -> Option<String> {
    let url = Url::parse(request_url)
        .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(request_url)))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == SUBDOMAIN_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
