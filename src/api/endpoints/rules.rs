//! Administrator rule maintenance.
//!
//! `GET/POST /api/admin/rules`, `GET/PUT/DELETE /api/admin/rules/:id`,
//! `GET /api/admin/rules/coverage`. Admin role enforced by middleware.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Serialize;

use super::{json_body, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Principal};
use crate::models::{RuleDraft, StagingRule};
use crate::range_table::RuleQuery;
use crate::resolution::{coverage_report, CoverageReport};

#[derive(Serialize)]
pub struct RuleListResponse {
    pub rules: Vec<StagingRule>,
    pub total: usize,
}

/// `GET /api/admin/rules?stage=&q=` — ordered by lower bound.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<RuleQuery>,
) -> Result<Json<RuleListResponse>, ApiError> {
    let snapshot = ctx.store.list()?;
    let rules = snapshot.search(&query);

    Ok(Json(RuleListResponse {
        total: snapshot.len(),
        rules,
    }))
}

/// `GET /api/admin/rules/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(rule_id): Path<String>,
) -> Result<Json<StagingRule>, ApiError> {
    let id = parse_id(&rule_id, "rule")?;
    Ok(Json(ctx.store.get(id)?))
}

/// `POST /api/admin/rules` — create, or replace when the body carries an id.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<RuleDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<StagingRule>), ApiError> {
    let draft = json_body(body)?;
    let rule = ctx.store.upsert(draft)?;
    tracing::info!(subject = %principal.subject, rule_id = %rule.id, stage = rule.stage, "Rule saved");
    Ok((StatusCode::CREATED, Json(rule)))
}

/// `PUT /api/admin/rules/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Path(rule_id): Path<String>,
    body: Result<Json<RuleDraft>, JsonRejection>,
) -> Result<Json<StagingRule>, ApiError> {
    let id = parse_id(&rule_id, "rule")?;
    let mut draft = json_body(body)?;
    if draft.id.is_some_and(|body_id| body_id != id) {
        return Err(ApiError::BadRequest(
            "Rule ID in body does not match path".into(),
        ));
    }
    draft.id = Some(id);

    let rule = ctx.store.upsert(draft)?;
    tracing::info!(subject = %principal.subject, rule_id = %rule.id, "Rule updated");
    Ok(Json(rule))
}

/// `DELETE /api/admin/rules/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    Path(rule_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&rule_id, "rule")?;
    ctx.store.delete(id)?;
    tracing::info!(subject = %principal.subject, rule_id = %id, "Rule deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/admin/rules/coverage` — overlaps and gaps in the live table.
pub async fn coverage(State(ctx): State<ApiContext>) -> Result<Json<CoverageReport>, ApiError> {
    let snapshot = ctx.store.list()?;
    Ok(Json(coverage_report(&snapshot)))
}
