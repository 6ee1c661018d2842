//! HTTP route handlers.

pub mod game;

use crate::state::AppState;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// All game endpoints. Each takes its parameters from the query string and
/// answers both GET and POST.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user", get(game::user).post(game::user))
        .route("/newGame", get(game::new_game).post(game::new_game))
        .route("/start", get(game::start).post(game::start))
        .route("/action", get(game::action).post(game::action))
        .route("/save", get(game::save).post(game::save))
        .route("/health", get(health))
}
