use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::routes::{AppState, CurrentUser};

/// Resolve `Authorization: Bearer <access>` to a user and attach it to the
/// request. Unknown or expired tokens get the same 401 the real backend sends.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let token = match token {
        Some(t) => t.to_string(),
        None => {
            return ApiError::unauthorized("Authentication credentials were not provided.")
                .into_response();
        }
    };

    let user_id = state.data().user_for_access_token(&token);
    match user_id {
        Some(id) => {
            request.extensions_mut().insert(CurrentUser(id));
            next.run(request).await
        }
        None => ApiError::unauthorized("Given token not valid for any token type").into_response(),
    }
}
