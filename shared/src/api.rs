//! Data model shared by the API client and the proxy endpoint.
//!
//! Both sides speak the same proxy request shape ([`ApiRequestSpec`]) and
//! run upstream bodies through the same [`normalize_body`] so a response
//! looks identical whether it came back directly or through the proxy.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Methods the upstream API accepts through this frontend.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
}

impl HttpMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Only POST, PUT and PATCH carry a request body.
    pub const fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("unsupported method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
        }
    }
}

/// A logical upstream request as sent to the proxy endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequestSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: HttpMethod,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default, deserialize_with = "lenient_query_params")]
    pub query_params: IndexMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subdomain: String,
}

impl ApiRequestSpec {
    /// Builds a spec from an endpoint that may carry its own query string.
    /// The query string moves into `query_params`.
    pub fn from_endpoint(
        endpoint: &str,
        method: HttpMethod,
        body: Option<Value>,
        subdomain: &str,
    ) -> Self {
        let path = normalize_endpoint(endpoint);
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path.to_string(), query),
            None => (path, ""),
        };

        let query_params = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        Self {
            endpoint: path,
            method,
            body,
            query_params,
            subdomain: subdomain.to_string(),
        }
    }
}

/// Ensures the endpoint starts with `/`.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Null values are dropped and scalars are stringified, the way a browser
// URLSearchParams would treat them.
fn lenient_query_params<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();

    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

/// A normalized response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    /// Non-JSON bodies that are not valid UTF-8, such as images.
    Binary(Vec<u8>),
}

impl Payload {
    fn raw(body: &[u8]) -> Self {
        match String::from_utf8(body.to_vec()) {
            Ok(text) => Payload::Text(text),
            Err(e) => Payload::Binary(e.into_bytes()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Payload::Json(value) => value.to_string().into_bytes(),
            Payload::Text(text) => text.clone().into_bytes(),
            Payload::Binary(bytes) => bytes.clone(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(value) => write!(f, "{value}"),
            Payload::Text(text) => f.write_str(text),
            Payload::Binary(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// A response as returned to callers of the client or the proxy.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: String,
    pub payload: Payload,
}

impl ApiResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: &[u8]) -> Self {
        let (payload, content_type) = normalize_body(content_type, body);
        Self {
            status,
            content_type,
            payload,
        }
    }
}

/// Decides between JSON and text from the upstream content type.
///
/// A JSON content type whose body does not parse degrades to text rather
/// than failing. Other bodies keep their bytes untouched: valid UTF-8
/// becomes text, anything else stays binary. Returns the payload together
/// with the content type the caller should advertise for it.
pub fn normalize_body(content_type: Option<&str>, body: &[u8]) -> (Payload, String) {
    match content_type {
        Some(ct) if ct.contains(JSON_CONTENT_TYPE) => match serde_json::from_slice(body) {
            Ok(value) => (Payload::Json(value), JSON_CONTENT_TYPE.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "upstream sent invalid JSON, passing through as text");
                (Payload::raw(body), TEXT_CONTENT_TYPE.to_string())
            }
        },
        Some(ct) => (Payload::raw(body), ct.to_string()),
        None => (Payload::raw(body), TEXT_CONTENT_TYPE.to_string()),
    }
}
