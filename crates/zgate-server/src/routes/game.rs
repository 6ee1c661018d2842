//! Game session routes.

use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use zgate_core::ZgateError;
use zgate_types::{ActionResponse, NewGameResponse, Profile, StartResponse, UserResponse};

type ApiError = (StatusCode, String);

/// Query parameters shared by the game endpoints; each handler requires
/// the ones it uses.
#[derive(Debug, Default, Deserialize)]
pub struct GameParams {
    pub email: Option<String>,
    pub title: Option<String>,
    pub save: Option<String>,
    pub action: Option<String>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Missing parameter '{}'", name)))
}

fn error_response(e: ZgateError) -> ApiError {
    let status = match &e {
        ZgateError::InvalidLabel { .. } | ZgateError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
        e if e.is_protocol_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(target: "zgate::api", "Request failed: {}", e);
    } else {
        warn!(target: "zgate::api", "Request rejected: {}", e);
    }
    (status, e.to_string())
}

fn load_profile(state: &AppState, email: &str) -> Result<Profile, ApiError> {
    state
        .profiles
        .get(email)
        .map_err(error_response)?
        .ok_or((StatusCode::NOT_FOUND, format!("Profile not found: {}", email)))
}

fn store_profile(state: &AppState, profile: &Profile) -> Result<(), ApiError> {
    state
        .profiles
        .put(&profile.email, profile)
        .map_err(error_response)
}

/// Run a blocking orchestrator call off the async runtime.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> zgate_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!(target: "zgate::api", "Session task panicked: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Session task failed".to_string())
        })?
        .map_err(error_response)
}

pub async fn user(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GameParams>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = required(&params.email, "email")?;
    let (profile, new_user) = state.profiles.get_or_create(email).map_err(error_response)?;

    Ok(Json(UserResponse { new_user, profile }))
}

pub async fn new_game(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GameParams>,
) -> Result<Json<NewGameResponse>, ApiError> {
    let email = required(&params.email, "email")?;
    let title = required(&params.title, "title")?.to_string();
    let profile = load_profile(&state, email)?;

    info!(target: "zgate::api", "New game of {} for {}", title, email);
    let orchestrator = state.orchestrator.clone();
    let response = run_blocking(move || orchestrator.new_game(profile, &title)).await?;
    store_profile(&state, &response.user_profile)?;

    Ok(Json(response))
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GameParams>,
) -> Result<Json<StartResponse>, ApiError> {
    let email = required(&params.email, "email")?;
    let title = required(&params.title, "title")?.to_string();
    let label = required(&params.save, "save")?.to_string();
    let profile = load_profile(&state, email)?;

    info!(target: "zgate::api", "Resuming {} from '{}' for {}", title, label, email);
    let orchestrator = state.orchestrator.clone();
    let response =
        run_blocking(move || orchestrator.start_from_save(profile, &title, &label)).await?;
    store_profile(&state, &response.user_profile)?;

    Ok(Json(response))
}

pub async fn action(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GameParams>,
) -> Result<Json<ActionResponse>, ApiError> {
    let email = required(&params.email, "email")?;
    let title = required(&params.title, "title")?.to_string();
    let action = required(&params.action, "action")?.to_string();
    let profile = load_profile(&state, email)?;

    let orchestrator = state.orchestrator.clone();
    let response = run_blocking(move || orchestrator.act(profile, &title, &action)).await?;
    store_profile(&state, &response.user_profile)?;

    Ok(Json(response))
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GameParams>,
) -> Result<Json<Profile>, ApiError> {
    let email = required(&params.email, "email")?;
    let title = required(&params.title, "title")?.to_string();
    let label = required(&params.save, "save")?.to_string();
    let profile = load_profile(&state, email)?;

    let orchestrator = state.orchestrator.clone();
    let profile = run_blocking(move || orchestrator.save_as(profile, &title, &label)).await?;
    store_profile(&state, &profile)?;

    Ok(Json(profile))
}
