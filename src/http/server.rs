//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bound each request by the whole-request deadline, answering 503 when it passes
//! - Start background tasks (health monitor, stats sink, admin API)
//! - Serve until shutdown, then wait for background tasks to finish

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::BalancerConfig;
use crate::dispatch::{Dispatcher, Forwarder, HyperForwarder};
use crate::health::HealthMonitor;
use crate::http::request::{buffer_request, UuidRequestId};
use crate::http::response::{payload_too_large, service_unavailable};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendPool, PoolError};
use crate::resilience::RetryPolicy;
use crate::stats::StatsReporter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    pool: Arc<BackendPool>,
}

impl HttpServer {
    /// Create a server with a pool built from `config` and a hyper forwarder.
    pub fn new(config: BalancerConfig) -> Result<Self, PoolError> {
        let pool = Arc::new(BackendPool::from_config(&config)?);
        let forwarder = Arc::new(HyperForwarder::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.response_secs),
        ));
        Ok(Self::with_parts(config, pool, forwarder))
    }

    /// Create a server around an existing pool and forwarding capability.
    pub fn with_parts(
        config: BalancerConfig,
        pool: Arc<BackendPool>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(
            pool.clone(),
            forwarder,
            RetryPolicy::from(&config.retries),
            config.stats.error_signal,
        ));

        let state = AppState {
            dispatcher,
            max_body_bytes: config.limits.max_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(state);
        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The shared backend pool.
    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            method = %self.config.balancer.method,
            backends = self.pool.len(),
            "Load Balancer started"
        );

        let background = self.spawn_background(&shutdown).await?;

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut server_shutdown = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");

        for handle in background {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }
        Ok(())
    }

    async fn spawn_background(
        &self,
        shutdown: &Shutdown,
    ) -> Result<Vec<JoinHandle<()>>, std::io::Error> {
        let mut handles = Vec::new();

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(self.pool.clone(), &self.config.health_check);
            handles.push(tokio::spawn(monitor.run(shutdown.subscribe())));
        } else {
            tracing::info!("Active health checks disabled");
        }

        if self.config.stats.enabled {
            let reporter = StatsReporter::to_file(self.pool.clone(), &self.config.stats);
            handles.push(tokio::spawn(reporter.run(shutdown.subscribe())));
        }

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let router = admin::setup_admin_router(self.pool.clone(), &self.config.admin);
            let mut admin_shutdown = shutdown.subscribe();
            tracing::info!(address = %self.config.admin.bind_address, "Admin API listening");
            handles.push(tokio::spawn(async move {
                let served = axum::serve(admin_listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API failed");
                }
            }));
        }

        Ok(handles)
    }
}

/// Main proxy handler.
/// Buffers the request and hands it to the dispatcher, within the request deadline.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let request_id = request
        .headers()
        .get(crate::http::X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        client = %client,
        "Proxying request"
    );

    let deadline = state.request_timeout;
    let handled = tokio::time::timeout(deadline, async {
        let request = match buffer_request(request, Some(client), state.max_body_bytes).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
                return payload_too_large();
            }
        };
        state.dispatcher.route(&request).await
    })
    .await;

    match handled {
        Ok(response) => response.into_response(),
        Err(_) => {
            tracing::warn!(request_id = %request_id, deadline = ?deadline, "Request deadline exceeded");
            service_unavailable().into_response()
        }
    }
}
