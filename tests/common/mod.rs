//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use layer7_lb::config::{BackendConfig, BalancerConfig};
use layer7_lb::{BackendPool, HttpServer, Shutdown};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Start a mock backend answering every request with `status` and `body`.
///
/// Successful responses carry the `Status: 200 OK` header the default error
/// signal looks for.
pub async fn start_mock_backend_on(listener: TcpListener, status: u16, body: String) -> SocketAddr {
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let body = body.clone();
                    tokio::spawn(serve_one(socket, status, body));
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn serve_one(mut socket: TcpStream, status: u16, body: String) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let status_line = match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        _ => "503 Service Unavailable",
    };
    let status_header = if status == 200 { "Status: 200 OK\r\n" } else { "" };
    let response = format!(
        "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        status_header,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Start a backend on an ephemeral port that answers 200 with its name.
pub async fn start_named_backend(name: &str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    start_mock_backend_on(listener, 200, name.to_string()).await
}

/// Start a backend on an ephemeral port that always answers `status`.
pub async fn start_status_backend(status: u16) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    start_mock_backend_on(listener, status, "failure".to_string()).await
}

/// Start a backend that accepts connections and never answers.
pub async fn start_hanging_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config for the given backends with background tasks off and fast retries.
pub fn test_config(backends: &[SocketAddr]) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.backends = backends
        .iter()
        .map(|addr| BackendConfig::new(format!("http://{addr}")))
        .collect();
    config.health_check.enabled = false;
    config.stats.enabled = false;
    config.retries.backoff_ms = 1;
    config
}

/// A balancer running in the background.
pub struct RunningBalancer {
    pub addr: SocketAddr,
    pub pool: Arc<BackendPool>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl RunningBalancer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server and its tasks to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("balancer did not shut down")
            .unwrap();
    }
}

/// Start the balancer on an ephemeral port.
pub async fn spawn_balancer(config: BalancerConfig) -> RunningBalancer {
    let server = HttpServer::new(config).unwrap();
    let pool = server.pool().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    RunningBalancer {
        addr,
        pool,
        shutdown,
        handle,
    }
}

/// Client that opens a fresh connection per request.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
