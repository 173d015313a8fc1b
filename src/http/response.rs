//! Response handling and transformation.
//!
//! # Responsibilities
//! - Build the uniform failure responses
//! - Strip hop-by-hop headers from anything crossing the proxy
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the upstream body
//! - Retry/failover detail never appears in what the client sees

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Response, StatusCode};

use crate::observability::metrics;

/// Body of every 503 the balancer produces itself.
pub const UNAVAILABLE_BODY: &str = "Service not available";

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// The uniform "no backend could serve this" response.
pub fn service_unavailable() -> Response<Body> {
    metrics::record_unavailable();
    plain(StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_BODY)
}

/// Request body exceeded the buffering limit.
pub fn payload_too_large() -> Response<Body> {
    plain(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("proxy-connection");
}
