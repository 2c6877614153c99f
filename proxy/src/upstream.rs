use crate::errors::ProxyError;
use crate::metrics_defs::UPSTREAM_ERRORS;
use http::header::CONTENT_TYPE;
use shared::api::{ApiRequestSpec, ApiResponse};
use shared::config::UpstreamConfig;
use shared::counter;
use shared::site::SiteIdentity;
use url::Url;

/// Re-issues proxy requests against the content API.
#[derive(Clone)]
pub struct Upstream {
    client: reqwest::Client,
    config: UpstreamConfig,
    site: SiteIdentity,
}

impl Upstream {
    pub fn new(config: UpstreamConfig, site: SiteIdentity) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            site,
        }
    }

    /// API base + endpoint + the serialized query parameters.
    pub fn build_url(&self, spec: &ApiRequestSpec) -> Result<Url, ProxyError> {
        let mut url = self.config.endpoint_url(&spec.endpoint)?;
        if !spec.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(spec.query_params.iter());
        }
        Ok(url)
    }

    pub async fn send(
        &self,
        spec: &ApiRequestSpec,
        host: &str,
        subdomain: &str,
    ) -> Result<ApiResponse, ProxyError> {
        let url = self.build_url(spec)?;
        tracing::info!(
            url = %url,
            method = %spec.method,
            host,
            subdomain,
            "proxying request upstream"
        );

        let mut request = self
            .client
            .request(spec.method.into(), url)
            .headers(self.site.tenant_headers(host, subdomain));

        if spec.method.has_body()
            && let Some(body) = &spec.body
        {
            request = request.json(body);
        }

        let response = request.send().await.inspect_err(|e| {
            counter!(UPSTREAM_ERRORS).increment(1);
            tracing::error!(error = %e, "upstream request failed");
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        Ok(ApiResponse::new(status, content_type.as_deref(), &body))
    }
}
