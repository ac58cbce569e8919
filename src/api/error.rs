//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::export::RenderError;
use crate::models::{FieldError, ValidationError};
use crate::range_table::StoreError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Administrator role required")]
    Forbidden,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    RenderFailed(#[from] RenderError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut fields = Vec::new();
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Administrator role required".to_string(),
            ),
            ApiError::Validation(err) => {
                fields = err.fields;
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_FAILED",
                    "One or more fields are invalid".to_string(),
                )
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail),
            ApiError::Unavailable(detail) => {
                tracing::error!(detail, "Range table unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "Staging rules are temporarily unavailable".to_string(),
                )
            }
            ApiError::RenderFailed(err) => {
                tracing::warn!(error = %err, "Export render failed");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "RENDER_FAILED",
                    err.to_string(),
                )
            }
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                fields,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => ApiError::Validation(e),
            StoreError::NotFound(id) => ApiError::NotFound(format!("Staging rule {id} not found")),
            StoreError::Unavailable(detail) => ApiError::Unavailable(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::time::Duration;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
        assert!(json["error"].get("fields").is_none());
    }

    #[tokio::test]
    async fn forbidden_returns_403() {
        let response = ApiError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn validation_lists_fields() {
        let err = ValidationError::single("egfr_high", "must be greater than egfr_low");
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(json["error"]["fields"][0]["field"], "egfr_high");
    }

    #[tokio::test]
    async fn store_errors_map_to_status() {
        let not_found: ApiError = StoreError::NotFound(uuid::Uuid::nil()).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let unavailable: ApiError = StoreError::Unavailable("disk I/O error".into()).into();
        let response = unavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "STORE_UNAVAILABLE");
        // Storage details stay in the log
        assert!(!json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("disk"));
    }

    #[tokio::test]
    async fn render_failure_returns_422() {
        let err: ApiError = RenderError::TimedOut(Duration::from_millis(5)).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "RENDER_FAILED");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }
}
