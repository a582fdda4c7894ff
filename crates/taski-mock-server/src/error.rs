use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

/// Error bodies shaped the way the real backend shapes them.
#[derive(Debug)]
pub enum ApiError {
    /// `{"detail": "..."}`
    Detail(StatusCode, String),
    /// `{"<field>": ["..."]}`, always 400.
    Field(&'static str, String),
    /// `{"error": "..."}`, always 400. Used by registration.
    Plain(String),
}

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::Detail(StatusCode::NOT_FOUND, "Not found.".into())
    }

    pub fn unauthorized(msg: &str) -> Self {
        ApiError::Detail(StatusCode::UNAUTHORIZED, msg.to_string())
    }

    pub fn forbidden() -> Self {
        ApiError::Detail(
            StatusCode::FORBIDDEN,
            "You do not have permission to perform this action.".into(),
        )
    }

    pub fn required(field: &'static str) -> Self {
        ApiError::Field(field, "This field is required.".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body): (StatusCode, Value) = match self {
            ApiError::Detail(status, msg) => (status, json!({ "detail": msg })),
            ApiError::Field(field, msg) => {
                let mut body = Map::new();
                body.insert(field.to_string(), json!([msg]));
                (StatusCode::BAD_REQUEST, Value::Object(body))
            }
            ApiError::Plain(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        };
        (status, Json(body)).into_response()
    }
}
