//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Buffer the body so the dispatcher can replay it
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing, and forwarded upstream
//! - Body size limit enforced while buffering

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::dispatch::ReplayableRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID generator for `tower_http::request_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the whole body (up to `limit` bytes) into a replayable request.
pub async fn buffer_request(
    request: Request<Body>,
    client: Option<SocketAddr>,
    limit: usize,
) -> Result<ReplayableRequest, axum::Error> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, limit).await?;

    Ok(ReplayableRequest {
        method: parts.method,
        uri: parts.uri,
        version: parts.version,
        headers: parts.headers,
        body,
        client_ip: client.map(|addr| addr.ip()),
    })
}
