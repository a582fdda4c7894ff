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

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tasks/{task_id}/checklist/",
            get(list_items).post(create_item),
        )
        .route(
            "/api/tasks/{task_id}/checklist/reorder/",
            post(reorder_items),
        )
        .route(
            "/api/tasks/{task_id}/checklist/{id}/",
            patch(update_item).put(update_item).delete(delete_item),
        )
        .route(
            "/api/tasks/{task_id}/checklist/{id}/complete/",
            post(complete_item),
        )
        .route(
            "/api/tasks/{task_id}/checklist/{id}/incomplete/",
            post(incomplete_item),
        )
}

#[derive(Debug, Deserialize)]
struct ItemBody {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReorderBody {
    order: Option<Vec<i64>>,
}

async fn list_items(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .list_checklist(user, task_id)
        .map(|items| Json(json!(items)))
}

async fn create_item(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
    Json(body): Json<ItemBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .data()
        .create_checklist_item(user, task_id, body.text)
        .map(|item| created(&item))
}

async fn update_item(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
    Json(body): Json<ItemBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .update_checklist_item(user, task_id, id, body.text)
        .map(|item| Json(json!(item)))
}

async fn delete_item(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .data()
        .delete_checklist_item(user, task_id, id)
        .map(|()| StatusCode::NO_CONTENT)
}

async fn complete_item(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .set_checklist_completed(user, task_id, id, true)
        .map(|item| Json(json!(item)))
}

async fn incomplete_item(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((task_id, id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .set_checklist_completed(user, task_id, id, false)
        .map(|item| Json(json!(item)))
}

async fn reorder_items(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(task_id): Path<i64>,
    Json(body): Json<ReorderBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .data()
        .reorder_checklist(user, task_id, body.order)
        .map(|items| Json(json!(items)))
}
