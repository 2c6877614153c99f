use crate::errors::ProxyError;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::request;
use crate::upstream::Upstream;
use http::header::HOST;
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use hyper::service::Service as HyperService;
use hyper::{Method, Request, Response, StatusCode};
use shared::api::ApiResponse;
use shared::http::{ResponseBody, make_error_response, make_json_error_response, make_response};
use shared::{gauge, histogram};
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Same-origin endpoint that re-issues a described request to the content
/// API with tenant headers injected.
///
/// Every failure is turned into a response: 400 for a request without an
/// endpoint, the mirrored upstream status otherwise, and a JSON
/// `{"error": ...}` with 500 when the upstream cannot be reached.
#[derive(Clone)]
pub struct ProxyService {
    path: Arc<str>,
    upstream: Upstream,
}

impl ProxyService {
    pub fn new(path: &str, upstream: Upstream) -> Self {
        Self {
            path: path.into(),
            upstream,
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        let start = Instant::now();
        gauge!(REQUESTS_INFLIGHT).increment(1.0);

        let response = match self.dispatch(req).await {
            Ok(response) => response,
            Err(ProxyError::NotFound) => make_error_response(StatusCode::NOT_FOUND),
            Err(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!(error = %e, "proxy request failed");
                } else {
                    tracing::warn!(error = %e, status = %status, "rejected proxy request");
                }
                make_json_error_response(status, &e.to_string())
            }
        };

        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
        histogram!(REQUEST_DURATION, "status" => response.status().as_str().to_owned())
            .record(start.elapsed().as_secs_f64());

        response
    }

    async fn dispatch<B>(&self, req: Request<B>) -> Result<Response<ResponseBody>, ProxyError>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Display,
    {
        if req.uri().path() != &*self.path {
            return Err(ProxyError::NotFound);
        }

        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
            .to_string();

        let spec = match *req.method() {
            Method::POST => {
                let body = req
                    .into_body()
                    .collect()
                    .await
                    .map_err(|e| ProxyError::RequestBody(e.to_string()))?
                    .to_bytes();
                request::from_json_body(&body)?
            }
            Method::GET => request::from_query(req.uri().query())?,
            _ => return Err(ProxyError::MethodNotAllowed),
        };

        let subdomain = request::effective_subdomain(&spec.subdomain, &host);
        let upstream_response = self.upstream.send(&spec, &host, &subdomain).await?;

        Ok(into_http_response(upstream_response))
    }
}

/// Mirrors the upstream status with the normalized body and content type.
fn into_http_response(upstream: ApiResponse) -> Response<ResponseBody> {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    make_response(status, &upstream.content_type, upstream.payload.to_bytes())
}

impl HyperService<Request<Incoming>> for ProxyService {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
