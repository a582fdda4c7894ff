pub mod auth;
pub mod checklist;
pub mod comments;
pub mod dependencies;
pub mod tasks;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tracing::debug;

use crate::auth::auth_middleware;
use crate::store::{MockData, RecordedRequest};

pub struct InnerAppState {
    pub data: Mutex<MockData>,
}

impl InnerAppState {
    /// A panicking handler must not wedge the whole server.
    pub fn data(&self) -> MutexGuard<'_, MockData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub type AppState = Arc<InnerAppState>;

/// The user resolved from the bearer token by `auth_middleware`.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

pub fn build_router(state: AppState) -> Router {
    let public = Router::new().merge(auth::public_routes());

    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(tasks::routes())
        .merge(comments::routes())
        .merge(checklist::routes())
        .merge(dependencies::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), record_requests))
        .with_state(state)
}

/// Log every request and serve any failure queued for it.
async fn record_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let uri = request.uri();
    let path = uri.path().strip_prefix("/api").unwrap_or(uri.path()).to_string();
    let full_path = match uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path.clone(),
    };
    let authorization = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    debug!("{method} {full_path}");

    let injected = {
        let mut data = state.data();
        data.record(RecordedRequest {
            method: method.clone(),
            path: full_path,
            authorization,
        });
        data.take_failure(&method, &path)
    };
    if let Some(status) = injected {
        return (status, Json(json!({ "detail": "Injected failure" }))).into_response();
    }
    next.run(request).await
}

pub(crate) fn created<T: serde::Serialize>(value: &T) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::CREATED, Json(json!(value)))
}
