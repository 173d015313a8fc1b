//! Read-only admin API, served on its own listener.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;
use crate::load_balancer::BackendPool;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<BackendPool>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(pool: Arc<BackendPool>, config: &AdminConfig) -> Router {
    let state = AdminState {
        pool,
        api_key: Arc::from(config.api_key.as_str()),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
