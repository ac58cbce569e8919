//! Audit logging middleware.
//!
//! Logs every API request with principal, method, path, and response
//! status. Runs innermost (after auth has injected the `Principal`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::Principal;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let subject = req
        .extensions()
        .get::<Principal>()
        .map(|p| format!("{}:{}", p.role, p.subject))
        .unwrap_or_else(|| "anonymous".to_string());

    let response = next.run(req).await;

    tracing::info!(
        target: "kidneycare::audit",
        %subject,
        %method,
        %path,
        status = response.status().as_u16(),
        "API access"
    );

    response
}
