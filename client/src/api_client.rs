use crate::config::Config;
use crate::error::ClientError;
use crate::metrics_defs::STRATEGY_FAILURES;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde_json::Value;
use shared::api::{ApiRequestSpec, HttpMethod, Payload, normalize_body};
use shared::config::UpstreamConfig;
use shared::counter;
use shared::site::{DEFAULT_SUBDOMAIN, SUBDOMAIN_PARAM, SiteIdentity};
use tenant::subdomain_from_host;

/// Ways of reaching the content API, tried in order until one succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Straight to the upstream API.
    Direct,
    /// Through the same-origin proxy endpoint.
    Proxy,
}

impl Strategy {
    pub const fn name(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Proxy => "proxy",
        }
    }
}

const DEFAULT_STRATEGIES: [Strategy; 2] = [Strategy::Direct, Strategy::Proxy];

/// The host this client runs on and the tenant it implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostInfo {
    pub host: String,
    pub subdomain: String,
}

impl HostInfo {
    /// Without a host (server side) the client acts as the demo tenant on
    /// localhost.
    pub fn from_host(host: &str) -> Self {
        if host.is_empty() {
            return Self {
                host: "localhost".into(),
                subdomain: DEFAULT_SUBDOMAIN.into(),
            };
        }

        Self {
            host: host.to_string(),
            subdomain: subdomain_from_host(host),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    pub method: HttpMethod,
    pub body: Option<Value>,
    /// Extra headers for the direct attempt, applied after the tenant headers.
    pub headers: HeaderMap,
}

impl FetchOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn with_body(method: HttpMethod, body: Value) -> Self {
        Self {
            method,
            body: Some(body),
            headers: HeaderMap::new(),
        }
    }
}

/// Client for the content API with a proxy fallback.
///
/// The upstream isolates tenants by inspecting `Host` and the subdomain
/// header, which does not survive every cross-origin path. A failed direct
/// call is therefore re-expressed as an [`ApiRequestSpec`] and posted to the
/// proxy endpoint, which sets those headers server-side.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    upstream: UpstreamConfig,
    config: Config,
    site: SiteIdentity,
    host: HostInfo,
    strategies: Vec<Strategy>,
}

impl ApiClient {
    pub fn new(upstream: UpstreamConfig, config: Config, site: SiteIdentity, host: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            upstream,
            config,
            site,
            host: HostInfo::from_host(host),
            strategies: DEFAULT_STRATEGIES.to_vec(),
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Runs the strategies in order and returns the first success. When all
    /// of them fail the error of the last one is returned.
    pub async fn fetch(&self, endpoint: &str, options: FetchOptions) -> Result<Payload, ClientError> {
        let mut last_error = None;

        for strategy in &self.strategies {
            let result = match strategy {
                Strategy::Direct => self.fetch_direct(endpoint, &options).await,
                Strategy::Proxy => self.fetch_via_proxy(endpoint, &options).await,
            };

            match result {
                Ok(payload) => {
                    tracing::debug!(strategy = strategy.name(), endpoint, "request succeeded");
                    return Ok(payload);
                }
                Err(e) => {
                    counter!(STRATEGY_FAILURES, "strategy" => strategy.name()).increment(1);
                    tracing::warn!(
                        strategy = strategy.name(),
                        endpoint,
                        error = %e,
                        "request strategy failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::NoStrategies))
    }

    async fn fetch_direct(&self, endpoint: &str, options: &FetchOptions) -> Result<Payload, ClientError> {
        let mut url = self.upstream.endpoint_url(endpoint)?;
        let has_subdomain = url.query_pairs().any(|(key, _)| key == SUBDOMAIN_PARAM);
        if !has_subdomain && !self.host.subdomain.is_empty() {
            url.query_pairs_mut()
                .append_pair(SUBDOMAIN_PARAM, &self.host.subdomain);
        }

        let mut headers = self.site.tenant_headers(&self.host.host, &self.host.subdomain);
        headers.extend(options.headers.clone());

        let mut request = self
            .http
            .request(options.method.into(), url)
            .headers(headers);

        if options.method.has_body()
            && let Some(body) = &options.body
        {
            request = match body {
                Value::String(raw) => request.body(raw.clone()),
                other => request.json(other),
            };
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }

        read_payload(response).await
    }

    async fn fetch_via_proxy(&self, endpoint: &str, options: &FetchOptions) -> Result<Payload, ClientError> {
        let spec = ApiRequestSpec::from_endpoint(
            endpoint,
            options.method,
            options.body.clone(),
            &self.host.subdomain,
        );
        tracing::info!(endpoint = %spec.endpoint, proxy = %self.config.proxy_url, "requesting through proxy");

        let response = self
            .http
            .post(self.config.proxy_url.clone())
            .headers(self.site.tenant_headers(&self.host.host, &self.host.subdomain))
            .json(&spec)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Proxy { status, body });
        }

        read_payload(response).await
    }

    pub async fn posts(&self) -> Result<Payload, ClientError> {
        self.fetch("/posts/public", FetchOptions::get()).await
    }

    pub async fn post_by_slug(&self, slug: &str) -> Result<Payload, ClientError> {
        self.fetch(&format!("/posts/public/slug/{slug}"), FetchOptions::get())
            .await
    }

    pub async fn categories(&self) -> Result<Payload, ClientError> {
        self.fetch("/categories/public", FetchOptions::get()).await
    }

    pub async fn menu(&self) -> Result<Payload, ClientError> {
        self.fetch("/menu/public", FetchOptions::get()).await
    }

    pub async fn settings(&self) -> Result<Payload, ClientError> {
        self.fetch("/settings/public", FetchOptions::get()).await
    }
}

async fn read_payload(response: reqwest::Response) -> Result<Payload, ClientError> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.bytes().await?;
    let (payload, _) = normalize_body(content_type.as_deref(), &body);
    Ok(payload)
}
