use crate::errors::ProxyError;
use shared::api::{ApiRequestSpec, HttpMethod};
use shared::site::DEFAULT_SUBDOMAIN;
use tenant::subdomain_from_host;

/// Parses a POST body carrying an [`ApiRequestSpec`].
pub fn from_json_body(body: &[u8]) -> Result<ApiRequestSpec, ProxyError> {
    let spec: ApiRequestSpec =
        serde_json::from_slice(body).map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    require_endpoint(spec)
}

/// Parses the GET form: `endpoint`, `method` and `subdomain` are reserved,
/// every other parameter is forwarded upstream.
pub fn from_query(query: Option<&str>) -> Result<ApiRequestSpec, ProxyError> {
    let mut spec = ApiRequestSpec::default();

    for (key, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "endpoint" => spec.endpoint = value.into_owned(),
            "method" => {
                spec.method = value
                    .parse::<HttpMethod>()
                    .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?
            }
            "subdomain" => spec.subdomain = value.into_owned(),
            _ => {
                spec.query_params.insert(key.into_owned(), value.into_owned());
            }
        }
    }

    require_endpoint(spec)
}

fn require_endpoint(spec: ApiRequestSpec) -> Result<ApiRequestSpec, ProxyError> {
    if spec.endpoint.trim().is_empty() {
        return Err(ProxyError::MissingEndpoint);
    }
    Ok(spec)
}

/// An explicit subdomain wins, then the inbound host, then the demo tenant.
pub fn effective_subdomain(explicit: &str, host: &str) -> String {
    if !explicit.is_empty() {
        return explicit.to_string();
    }

    match subdomain_from_host(host) {
        derived if derived.is_empty() => DEFAULT_SUBDOMAIN.to_string(),
        derived => derived,
    }
}
