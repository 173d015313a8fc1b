//! Forwarding capability.
//!
//! # Responsibilities
//! - Hold an inbound request in a form that can be sent more than once
//! - Rewrite it onto a backend URL (scheme, authority, joined path and query)
//! - Send it upstream and hand back the response or a transport error
//!
//! # Design Decisions
//! - The body is buffered so retries and failover can replay it
//! - Only transport errors are failures; any HTTP response is a success here
//! - Hop-by-hop headers are stripped in both directions

use std::net::IpAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, Uri, Version};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::http::response::strip_hop_by_hop;

/// Error type for a single forward.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to build upstream request: {0}")]
    Build(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    pub fn upstream(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ForwardError::Upstream(Box::new(err))
    }
}

/// "Forward this request to this upstream."
pub trait Forwarder: Send + Sync {
    fn forward<'a>(
        &'a self,
        target: &'a Url,
        request: &'a ReplayableRequest,
    ) -> BoxFuture<'a, Result<Response<Body>, ForwardError>>;
}

/// An inbound request with its body buffered.
#[derive(Debug, Clone)]
pub struct ReplayableRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<IpAddr>,
}

impl ReplayableRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            client_ip: None,
        }
    }

    /// Build the upstream request for `target`.
    pub fn to_upstream(&self, target: &Url) -> Result<Request<Body>, ForwardError> {
        let uri = upstream_uri(target, &self.uri)?;

        let mut headers = self.headers.clone();
        strip_hop_by_hop(&mut headers);
        if let Some(ip) = self.client_ip {
            append_forwarded_for(&mut headers, ip);
        }

        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .version(Version::HTTP_11);
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }

        builder
            .body(Body::from(self.body.clone()))
            .map_err(|e| ForwardError::Build(e.to_string()))
    }
}

/// Join the inbound path and query onto the backend URL.
///
/// Paths are joined with exactly one slash between them; queries are joined
/// with `&` when both sides have one.
pub fn upstream_uri(target: &Url, inbound: &Uri) -> Result<Uri, ForwardError> {
    let authority = match target.port() {
        Some(port) => format!("{}:{}", target.host_str().unwrap_or_default(), port),
        None => target.host_str().unwrap_or_default().to_string(),
    };
    if authority.is_empty() {
        return Err(ForwardError::Build(format!("backend {} has no host", target)));
    }

    let path = single_joining_slash(target.path(), inbound.path());
    let query = match (target.query().filter(|q| !q.is_empty()), inbound.query()) {
        (Some(a), Some(b)) if !b.is_empty() => Some(format!("{}&{}", a, b)),
        (Some(a), _) => Some(a.to_string()),
        (None, Some(b)) if !b.is_empty() => Some(b.to_string()),
        _ => None,
    };

    let path_and_query = match query {
        Some(q) => format!("{}?{}", path, q),
        None => path,
    };

    Uri::builder()
        .scheme(target.scheme())
        .authority(authority.as_str())
        .path_and_query(path_and_query.as_str())
        .build()
        .map_err(|e| ForwardError::Build(e.to_string()))
}

fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, ip),
        None => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Forwarder backed by a pooled hyper client.
///
/// Each forward is bounded by `response_timeout`, covering connect and the
/// wait for response headers.
#[derive(Clone)]
pub struct HyperForwarder {
    client: Client<HttpConnector, Body>,
    response_timeout: Duration,
}

impl HyperForwarder {
    pub fn new(connect_timeout: Duration, response_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            response_timeout,
        }
    }
}

impl Forwarder for HyperForwarder {
    fn forward<'a>(
        &'a self,
        target: &'a Url,
        request: &'a ReplayableRequest,
    ) -> BoxFuture<'a, Result<Response<Body>, ForwardError>> {
        Box::pin(async move {
            let upstream = request.to_upstream(target)?;
            let response = tokio::time::timeout(self.response_timeout, self.client.request(upstream))
                .await
                .map_err(|_| ForwardError::Timeout(self.response_timeout))?
                .map_err(ForwardError::upstream)?;

            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Ok(Response::from_parts(parts, Body::new(body)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn uri(target: &str, inbound: &str) -> String {
        let target = Url::parse(target).unwrap();
        let inbound: Uri = inbound.parse().unwrap();
        upstream_uri(&target, &inbound).unwrap().to_string()
    }

    #[test]
    fn joins_paths_with_one_slash() {
        assert_eq!(uri("http://10.0.0.1:8080", "/users"), "http://10.0.0.1:8080/users");
        assert_eq!(uri("http://10.0.0.1:8080/api/", "/users"), "http://10.0.0.1:8080/api/users");
        assert_eq!(uri("http://10.0.0.1:8080/api", "/users"), "http://10.0.0.1:8080/api/users");
        assert_eq!(uri("http://10.0.0.1", "/"), "http://10.0.0.1/");
    }

    #[test]
    fn merges_queries() {
        assert_eq!(uri("http://h:1/?a=1", "/x?b=2"), "http://h:1/x?a=1&b=2");
        assert_eq!(uri("http://h:1/", "/x?b=2"), "http://h:1/x?b=2");
        assert_eq!(uri("http://h:1/?a=1", "/x"), "http://h:1/x?a=1");
    }

    #[test]
    fn upstream_request_carries_headers_and_forwarded_for() {
        let mut inbound = ReplayableRequest::new(Method::POST, "/submit?x=1".parse().unwrap());
        inbound.headers.insert("x-custom", HeaderValue::from_static("yes"));
        inbound.headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        inbound.body = Bytes::from_static(b"payload");
        inbound.client_ip = Some("192.0.2.1".parse().unwrap());

        let target = Url::parse("http://127.0.0.1:9000/base").unwrap();
        let upstream = inbound.to_upstream(&target).unwrap();

        assert_eq!(upstream.method(), Method::POST);
        assert_eq!(upstream.uri(), "http://127.0.0.1:9000/base/submit?x=1");
        assert_eq!(upstream.headers()["x-custom"], "yes");
        assert!(upstream.headers().get(header::CONNECTION).is_none());
        assert_eq!(upstream.headers()[X_FORWARDED_FOR], "203.0.113.7, 192.0.2.1");
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold connections without ever answering.
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let forwarder = HyperForwarder::new(Duration::from_secs(1), Duration::from_millis(200));
        let target = Url::parse(&format!("http://{addr}")).unwrap();
        let request = ReplayableRequest::new(Method::GET, "/".parse().unwrap());

        let err = forwarder.forward(&target, &request).await.unwrap_err();
        assert!(matches!(err, ForwardError::Timeout(_)), "unexpected error: {err}");
        holder.abort();
    }
}
