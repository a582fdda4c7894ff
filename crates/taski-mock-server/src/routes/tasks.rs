use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};

use super::{created, AppState, CurrentUser};
use crate::error::ApiError;
use crate::store::{TaskBody, TaskQuery};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks/", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}/",
            get(get_task)
                .put(update_task)
                .patch(update_task)
                .delete(delete_task),
        )
        .route("/api/tasks/{id}/blockers/", get(list_blockers))
        .route("/api/tasks/{id}/blocked/", get(list_blocked))
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<Value>, ApiError> {
    state.data().list_tasks(user, &q).map(|t| Json(json!(t)))
}

async fn get_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.data().get_task(user, id).map(|t| Json(json!(t)))
}

async fn create_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<TaskBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state.data().create_task(user, body).map(|t| created(&t))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<TaskBody>,
) -> Result<Json<Value>, ApiError> {
    state.data().update_task(user, id, body).map(|t| Json(json!(t)))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .data()
        .delete_task(user, id)
        .map(|()| StatusCode::NO_CONTENT)
}

async fn list_blockers(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.data().blockers(user, id).map(|t| Json(json!(t)))
}

async fn list_blocked(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.data().blocked(user, id).map(|t| Json(json!(t)))
}
