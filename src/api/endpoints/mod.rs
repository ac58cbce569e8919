//! API endpoint handlers.
//!
//! Handlers validate at the boundary and delegate to the core modules;
//! none of them holds a store lock across an await.

pub mod egfr;
pub mod health;
pub mod reports;
pub mod rules;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::api::error::ApiError;

pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {what} ID: {e}")))
}

/// Unwrap a JSON body, reporting malformed payloads as 400.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}
