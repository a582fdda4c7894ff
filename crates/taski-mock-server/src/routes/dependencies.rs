use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{created, AppState, CurrentUser};
use crate::error::ApiError;
use crate::store::DependencyBody;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tasks/{task_id}/dependencies/",
            get(list_dependencies).post(create_dependency),
        )
        .route(
            "/api/tasks/{task_id}/dependencies/{id}/",
            patch(update_dependency)
                .put(update_dependency)
                .delete(delete_dependency),
        )
        .route(
            "/api/tasks/{task_id}/dependencies/{id}/toggle/",
            post(toggle_dependency),
        )
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    notes: Option<String>,
    active: Option<bool>,
}

async fn list_dependencies(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .list_dependencies(user, task_id)
        .map(|d| Json(json!(d)))
}

async fn create_dependency(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
    Json(body): Json<DependencyBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .data()
        .create_dependency(user, task_id, body)
        .map(|d| created(&d))
}

async fn update_dependency(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .update_dependency(user, task_id, id, body.notes, body.active)
        .map(|d| Json(json!(d)))
}

async fn delete_dependency(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .data()
        .delete_dependency(user, task_id, id)
        .map(|()| StatusCode::NO_CONTENT)
}

async fn toggle_dependency(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .toggle_dependency(user, task_id, id)
        .map(|d| Json(json!(d)))
}
