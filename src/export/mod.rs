//! Export renderer — turns a `Report` into a downloadable artifact.
//!
//! Rendering is deterministic: the same report always lays out to the same
//! pages, and equal reports encode to byte-identical artifacts in either
//! format.
//! The generation stamp is the only time-dependent content and is excluded
//! from `content_digest`. Failures are recoverable; the caller still holds
//! the report and may retry or fall back to plain text.

pub mod layout;
mod pdf;
mod text;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub use layout::{lay_out, Layout, LayoutOptions, Line, LineStyle, Page};

use chrono::{DateTime, Utc};

use crate::models::ArtifactFormat;
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Character {ch:?} cannot be encoded in {format} output (in \"{context}\")")]
    UnsupportedCharacter {
        ch: char,
        context: String,
        format: ArtifactFormat,
    },
    #[error("Render backend failed: {0}")]
    Backend(String),
    #[error("Rendering timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Invalid render options: {0}")]
    InvalidOptions(String),
}

impl RenderError {
    /// Transient failures worth one more attempt with the same format.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::TimedOut(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportArtifact {
    pub format: ArtifactFormat,
    pub content_type: &'static str,
    pub filename: String,
    pub generated_at: DateTime<Utc>,
    pub page_count: usize,
    /// Hex SHA-256 of the laid-out content, generation stamp excluded.
    pub content_digest: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Download name, e.g. `eGFR_Results_2026-03-01.pdf`.
pub fn filename_for(report: &Report, format: ArtifactFormat) -> String {
    format!(
        "eGFR_Results_{}.{}",
        report.generated_at.format("%Y-%m-%d"),
        format.extension()
    )
}

pub fn render(
    report: &Report,
    format: ArtifactFormat,
    options: &LayoutOptions,
) -> Result<ExportArtifact, RenderError> {
    let layout = lay_out(report, format, options)?;
    let content_digest = layout.digest(format);

    let bytes = match format {
        ArtifactFormat::Pdf => pdf::encode(&layout, report, &content_digest)?,
        ArtifactFormat::Text => text::encode(&layout),
    };

    tracing::debug!(
        format = format.as_str(),
        pages = layout.page_count(),
        bytes = bytes.len(),
        "Report rendered"
    );

    Ok(ExportArtifact {
        format,
        content_type: format.content_type(),
        filename: filename_for(report, format),
        generated_at: report.generated_at,
        page_count: layout.page_count(),
        content_digest,
        bytes,
    })
}

/// Synchronous rendering backend used by the HTTP layer.
pub trait ArtifactRenderer: Send + Sync {
    fn render(
        &self,
        report: &Report,
        format: ArtifactFormat,
        options: &LayoutOptions,
    ) -> Result<ExportArtifact, RenderError>;
}

/// Renders with the built-in text and PDF encoders.
pub struct StandardRenderer;

impl ArtifactRenderer for StandardRenderer {
    fn render(
        &self,
        report: &Report,
        format: ArtifactFormat,
        options: &LayoutOptions,
    ) -> Result<ExportArtifact, RenderError> {
        render(report, format, options)
    }
}

/// Render on the blocking pool, giving up after `timeout`. A timed-out
/// render is discarded; no partial artifact is returned.
pub async fn render_with_timeout(
    report: Report,
    format: ArtifactFormat,
    options: LayoutOptions,
    timeout: Duration,
) -> Result<ExportArtifact, RenderError> {
    render_on_pool(Arc::new(StandardRenderer), report, format, options, timeout).await
}

/// `render_with_timeout` over any renderer.
pub async fn render_on_pool(
    renderer: Arc<dyn ArtifactRenderer>,
    report: Report,
    format: ArtifactFormat,
    options: LayoutOptions,
    timeout: Duration,
) -> Result<ExportArtifact, RenderError> {
    let task = tokio::task::spawn_blocking(move || renderer.render(&report, format, &options));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(RenderError::Backend(format!(
            "render task failed: {join_err}"
        ))),
        Err(_) => {
            tracing::warn!(format = format.as_str(), ?timeout, "Render timed out");
            Err(RenderError::TimedOut(timeout))
        }
    }
}
