use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use taski_core::user::{RegisterResponse, TokenPair};
use tracing::info;

use super::{AppState, CurrentUser};
use crate::error::ApiError;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register/", post(register))
        .route("/api/auth/refresh/", post(refresh))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/api/auth/user/", get(current_user))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct Registration {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct RefreshBody {
    refresh: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<TokenPair>, ApiError> {
    let mut data = state.data();
    let user_id = data
        .authenticate(&body.username, &body.password)
        .ok_or_else(|| {
            ApiError::unauthorized("No active account found with the given credentials")
        })?;
    info!("login: {}", body.username);
    Ok(Json(data.issue_tokens(user_id)))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<Registration>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let mut data = state.data();
    let user = data.create_user(&body.username, &body.email, &body.password)?;
    let tokens = data.issue_tokens(user.id);
    info!("registered user {}", user.username);
    Ok((StatusCode::CREATED, Json(RegisterResponse { user, tokens })))
}

async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<Value>, ApiError> {
    let raw = body.refresh.ok_or_else(|| ApiError::required("refresh"))?;
    match state.data().refresh(&raw) {
        Some(access) => Ok(Json(json!({ "access": access }))),
        None => Err(ApiError::Detail(
            StatusCode::UNAUTHORIZED,
            "Token is invalid or expired".into(),
        )),
    }
}

async fn current_user(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .user(user_id)
        .map(|u| Json(json!(u)))
        .ok_or_else(ApiError::not_found)
}
