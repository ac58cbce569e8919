//! Stored reports and their export.
//!
//! `GET /api/reports/:id` and
//! `GET /api/reports/:id/export?format=pdf|text&fallback=text`.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::egfr::ReportView;
use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Principal};
use crate::export::{self, ExportArtifact, RenderError};
use crate::models::ArtifactFormat;
use crate::report::Report;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<ArtifactFormat>,
    pub fallback: Option<ArtifactFormat>,
}

fn lookup(ctx: &ApiContext, id: &Uuid, principal: &Principal) -> Result<Report, ApiError> {
    let reports = ctx
        .reports
        .lock()
        .map_err(|_| ApiError::Internal("report cache lock".into()))?;
    reports
        .get(id, &principal.subject)
        .ok_or_else(|| ApiError::NotFound("Report not found or expired".into()))
}

/// `GET /api/reports/:id` — owner only.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Path(report_id): Path<String>,
) -> Result<Json<ReportView>, ApiError> {
    let id = parse_id(&report_id, "report")?;
    let report = lookup(&ctx, &id, &principal)?;
    Ok(Json(ReportView::new(id, report)))
}

/// `GET /api/reports/:id/export` — defaults to PDF. A retryable render
/// failure is retried once; a failed render falls back to plain text only
/// when the caller asked for it.
pub async fn export(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Path(report_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let id = parse_id(&report_id, "report")?;
    let report = lookup(&ctx, &id, &principal)?;
    let format = query.format.unwrap_or(ArtifactFormat::Pdf);

    let (artifact, fell_back) = match render_with_retry(&ctx, &report, format).await {
        Ok(artifact) => (artifact, false),
        Err(err) => match query.fallback {
            Some(fallback) if fallback != format => {
                tracing::warn!(
                    report_id = %id,
                    error = %err,
                    fallback = fallback.as_str(),
                    "Export falling back"
                );
                (render_with_retry(&ctx, &report, fallback).await?, true)
            }
            _ => return Err(err.into()),
        },
    };

    Ok(artifact_response(artifact, fell_back))
}

async fn render_with_retry(
    ctx: &ApiContext,
    report: &Report,
    format: ArtifactFormat,
) -> Result<ExportArtifact, RenderError> {
    let attempt = || {
        export::render_on_pool(
            ctx.renderer.clone(),
            report.clone(),
            format,
            ctx.layout,
            ctx.render_timeout,
        )
    };
    match attempt().await {
        Err(err) if err.is_retryable() => {
            tracing::warn!(error = %err, format = format.as_str(), "Retrying render");
            attempt().await
        }
        result => result,
    }
}

fn artifact_response(artifact: ExportArtifact, fell_back: bool) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    let mut response = (StatusCode::OK, Body::from(artifact.bytes)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(artifact.content_type),
    );
    if let Ok(val) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, val);
    }
    if let Ok(val) = HeaderValue::from_str(&artifact.content_digest) {
        headers.insert("X-Content-Digest", val);
    }
    headers.insert(
        "X-Page-Count",
        HeaderValue::from(artifact.page_count as u64),
    );
    if fell_back {
        headers.insert("X-Export-Fallback", HeaderValue::from_static(artifact.format.as_str()));
    }
    response
}
