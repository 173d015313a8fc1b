use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::load_balancer::StatsSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub backends: usize,
    pub alive: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let alive = state.pool.backends().iter().filter(|b| b.is_alive()).count();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if alive > 0 { "operational" } else { "unavailable" },
        backends: state.pool.len(),
        alive,
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<StatsSnapshot>> {
    Json(state.pool.snapshot())
}
