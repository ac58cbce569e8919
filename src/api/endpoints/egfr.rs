//! `POST /api/egfr` — compute, resolve, compose, and keep the report for
//! export.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use super::json_body;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Principal};
use crate::egfr;
use crate::models::LabInputForm;
use crate::report::{self, FunctionBand, Recommendations, Report};
use crate::resolution;

/// Report JSON with the derived views a client displays.
#[derive(Serialize)]
pub struct ReportView {
    pub report_id: Uuid,
    #[serde(flatten)]
    pub report: Report,
    pub egfr_display: String,
    pub stage_label: String,
    pub function_band: FunctionBand,
    pub recommendations: Recommendations,
}

impl ReportView {
    pub fn new(report_id: Uuid, report: Report) -> Self {
        Self {
            report_id,
            egfr_display: format!(
                "{} {}",
                report.classification.score.display(),
                egfr::EGFR_UNIT
            ),
            stage_label: report.stage_label(),
            function_band: report.band(),
            recommendations: report.recommendations(),
            report,
        }
    }
}

pub async fn calculate(
    State(ctx): State<ApiContext>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<LabInputForm>, JsonRejection>,
) -> Result<Json<ReportView>, ApiError> {
    let inputs = json_body(body)?.into_lab_input()?;

    let score = egfr::compute(&inputs);
    // One snapshot for the whole resolution; concurrent writes apply to
    // later requests.
    let snapshot = ctx.store.list()?;
    let classification = resolution::resolve(&score, &snapshot);
    let report = report::compose(inputs, classification);

    let report_id = {
        let mut reports = ctx
            .reports
            .lock()
            .map_err(|_| ApiError::Internal("report cache lock".into()))?;
        reports.insert(&principal.subject, report.clone())
    };

    tracing::info!(
        %report_id,
        outcome = report.outcome().as_str(),
        stage = ?report.classification.stage(),
        "Report composed"
    );

    Ok(Json(ReportView::new(report_id, report)))
}
