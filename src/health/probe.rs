//! Connectivity probe.
//!
//! A backend counts as reachable when a TCP connection to its host and port
//! can be opened within the timeout. Nothing is sent over the connection.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::net::TcpStream;
use tokio::time;
use url::Url;

/// "Can I open a connection to this address within a timeout?"
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, url: &'a Url, timeout: Duration) -> BoxFuture<'a, bool>;
}

/// Plain TCP connect probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProber;

impl Prober for TcpProber {
    fn probe<'a>(&'a self, url: &'a Url, timeout: Duration) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let Some(target) = host_port(url) else {
                tracing::warn!(url = %url, "Backend url has no host to probe");
                return false;
            };

            match time::timeout(timeout, TcpStream::connect(target.as_str())).await {
                Ok(Ok(_stream)) => true,
                Ok(Err(e)) => {
                    tracing::debug!(url = %url, error = %e, "Site unreachable");
                    false
                }
                Err(_) => {
                    tracing::debug!(url = %url, timeout = ?timeout, "Site unreachable: timeout");
                    false
                }
            }
        })
    }
}

/// `host:port` for a backend URL, filling in the scheme's default port.
pub fn host_port(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    if host.contains(':') && !host.starts_with('[') {
        Some(format!("[{}]:{}", host, port))
    } else {
        Some(format!("{}:{}", host, port))
    }
}
