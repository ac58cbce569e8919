//! Bearer token authentication and role checks.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it through the
//! configured `SessionGate`, and injects the `Principal` into request
//! extensions for downstream handlers. No handler runs for an
//! unauthenticated request.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Principal};

/// Require a bearer token known to the session gate.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `Principal` and adds `Cache-Control: no-store`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;

    let principal = match ctx.gate.authenticate(token) {
        Some(principal) => principal,
        None => {
            tracing::warn!(path = req.uri().path(), "Rejected unknown bearer token");
            return Err(ApiError::Unauthorized);
        }
    };

    req.extensions_mut().insert(principal);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}

/// Require an administrator. Runs inside `require_auth`.
pub async fn require_admin(req: Request<axum::body::Body>, next: Next) -> Response {
    match req.extensions().get::<Principal>() {
        Some(p) if p.is_admin() => next.run(req).await,
        Some(p) => {
            tracing::warn!(subject = %p.subject, path = req.uri().path(), "Admin route denied");
            ApiError::Forbidden.into_response()
        }
        None => ApiError::Unauthorized.into_response(),
    }
}

fn bearer_token<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
