use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{created, AppState, CurrentUser};
use crate::error::ApiError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tasks/{task_id}/comments/",
            get(list_comments).post(create_comment),
        )
        .route(
            "/api/tasks/{task_id}/comments/{id}/",
            put(update_comment)
                .patch(update_comment)
                .delete(delete_comment),
        )
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    content: Option<String>,
}

async fn list_comments(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .list_comments(user, task_id)
        .map(|c| Json(json!(c)))
}

async fn create_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
    Json(body): Json<CommentBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .data()
        .create_comment(user, task_id, body.content)
        .map(|c| created(&c))
}

async fn update_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
    Json(body): Json<CommentBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .update_comment(user, task_id, id, body.content)
        .map(|c| Json(json!(c)))
}

async fn delete_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .data()
        .delete_comment(user, task_id, id)
        .map(|()| StatusCode::NO_CONTENT)
}
