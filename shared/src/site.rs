//! Headers identifying the tenant and the canonical site to the upstream API.
//!
//! The upstream gates responses on `Origin`/`Referer`/`User-Agent` and routes
//! tenants by `Host` plus the custom subdomain header.

use http::HeaderMap;
use http::header::{ACCEPT, CONTENT_TYPE, HOST, HeaderName, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;

pub const SUBDOMAIN_HEADER: HeaderName = HeaderName::from_static("x-taita-subdomain");
pub const SUBDOMAIN_PARAM: &str = "subdomain";
pub const DEFAULT_SUBDOMAIN: &str = "demo";

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SiteIdentity {
    /// Canonical origin of the blog, e.g. `https://taita.blog`
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_origin() -> String {
    "https://taita.blog".into()
}

fn default_user_agent() -> String {
    concat!(
        "Mozilla/5.0 (compatible; taita-blog-edge/",
        env!("CARGO_PKG_VERSION"),
        "; +https://taita.blog)"
    )
    .into()
}

impl Default for SiteIdentity {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            user_agent: default_user_agent(),
        }
    }
}

impl SiteIdentity {
    pub fn referer(&self) -> String {
        format!("{}/", self.origin.trim_end_matches('/'))
    }

    /// Headers sent with every upstream call, direct or proxied.
    ///
    /// Empty `host` or `subdomain` values are left out. Values that are not
    /// valid header text are skipped with a warning.
    pub fn tenant_headers(&self, host: &str, subdomain: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let referer = self.referer();
        let dynamic: [(HeaderName, &str); 5] = [
            (HOST, host),
            (SUBDOMAIN_HEADER, subdomain),
            (ORIGIN, &self.origin),
            (REFERER, &referer),
            (USER_AGENT, &self.user_agent),
        ];

        for (name, value) in dynamic {
            if value.is_empty() {
                continue;
            }
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(name, v);
                }
                Err(_) => tracing::warn!(header = %name, value, "skipping invalid header value"),
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_headers() {
        let site = SiteIdentity::default();
        let headers = site.tenant_headers("demo.taita.blog", "demo");

        assert_eq!(headers.get(HOST).unwrap(), "demo.taita.blog");
        assert_eq!(headers.get(&SUBDOMAIN_HEADER).unwrap(), "demo");
        assert_eq!(headers.get(ORIGIN).unwrap(), "https://taita.blog");
        assert_eq!(headers.get(REFERER).unwrap(), "https://taita.blog/");
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert!(headers.contains_key(USER_AGENT));
    }

    #[test]
    fn test_tenant_headers_skip_empty() {
        let site = SiteIdentity::default();
        let headers = site.tenant_headers("", "");
        assert!(!headers.contains_key(HOST));
        assert!(!headers.contains_key(&SUBDOMAIN_HEADER));
        assert!(headers.contains_key(ORIGIN));
    }
}
