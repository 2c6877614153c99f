use crate::error::ClientError;
use serde_json::Value;
use shared::config::UpstreamConfig;
use shared::site::{DEFAULT_SUBDOMAIN, SUBDOMAIN_PARAM, SiteIdentity};
use tenant::TenantInfo;

/// Server-side reads against the content API.
///
/// Used while rendering a page, where the tenant is already known and there
/// is no proxy to fall back to. Failures are logged and collapse to empty
/// results so a page can still render.
#[derive(Clone)]
pub struct DirectApi {
    http: reqwest::Client,
    upstream: UpstreamConfig,
    site: SiteIdentity,
}

impl DirectApi {
    pub fn new(upstream: UpstreamConfig, site: SiteIdentity) -> Self {
        Self {
            http: reqwest::Client::new(),
            upstream,
            site,
        }
    }

    pub async fn public_posts(&self, subdomain: &str) -> Vec<Value> {
        self.public_list("/posts/public", subdomain).await
    }

    pub async fn public_menu(&self, subdomain: &str) -> Vec<Value> {
        self.public_list("/menu/public", subdomain).await
    }

    pub async fn public_categories(&self, subdomain: &str) -> Vec<Value> {
        self.public_list("/categories/public", subdomain).await
    }

    /// Fetches `endpoint` for a resolved tenant, or `None` on any failure.
    pub async fn fetch_tenant_data(&self, endpoint: &str, tenant: &TenantInfo) -> Option<Value> {
        let subdomain = effective(&tenant.subdomain);
        match self.get_json(endpoint, &tenant.host, subdomain).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    endpoint,
                    host = %tenant.host,
                    subdomain,
                    error = %e,
                    "tenant data request failed"
                );
                None
            }
        }
    }

    async fn public_list(&self, endpoint: &str, subdomain: &str) -> Vec<Value> {
        let subdomain = effective(subdomain);
        match self.get_json(endpoint, "", subdomain).await {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                tracing::warn!(endpoint, subdomain, "expected a list from the content API");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(endpoint, subdomain, error = %e, "public content request failed");
                Vec::new()
            }
        }
    }

    async fn get_json(&self, endpoint: &str, host: &str, subdomain: &str) -> Result<Value, ClientError> {
        let mut url = self.upstream.endpoint_url(endpoint)?;
        url.query_pairs_mut().append_pair(SUBDOMAIN_PARAM, subdomain);

        let response = self
            .http
            .get(url)
            .headers(self.site.tenant_headers(host, subdomain))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        Ok(response.json().await?)
    }
}

fn effective(subdomain: &str) -> &str {
    if subdomain.is_empty() {
        DEFAULT_SUBDOMAIN
    } else {
        subdomain
    }
}
