//! Parameterized analytical reports
//!
//! Each report validates its own parameters and builds its own request
//! body. Submission always creates a fresh job and goes straight to the
//! poller; reports are never looked up or reused.

mod changes;
mod nearest;
mod void_analysis;

pub use changes::ChangesOverTimeReport;
pub use nearest::NearestNeighborReport;
pub use void_analysis::{AdminLevel, Categorization, VoidAnalysisReport};

use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::jobs::{ExportError, ExportOrchestrator};
use crate::registry::{ExportFormat, path_segment};

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("collection id must not be empty")]
    MissingCollection,

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("a source chain id is required")]
    MissingSource,

    #[error("exactly one source chain id is supported, got {0}")]
    UnsupportedMultiSource(usize),

    #[error("admin level must be between 1 and 5, got {0}")]
    InvalidAdminLevel(u8),

    #[error("categorization must be one of Category, NAICS or SIC, got '{0}'")]
    InvalidCategorization(String),

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    ChangesOverTime,
    NearestNeighbor,
    VoidAnalysis,
}

impl ReportKind {
    /// Creation path; the target collection id is appended
    pub fn path(self) -> &'static str {
        match self {
            ReportKind::ChangesOverTime => "ChainLists/UpdatesDiffReport",
            ReportKind::NearestNeighbor => "ChainLists/NearestReport",
            ReportKind::VoidAnalysis => "ChainLists/VoidAnalysisReport",
        }
    }

    pub fn format(self) -> ExportFormat {
        match self {
            ReportKind::ChangesOverTime => ExportFormat::Xlsx,
            ReportKind::NearestNeighbor | ReportKind::VoidAnalysis => ExportFormat::Csv,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::ChangesOverTime => f.write_str("changes-over-time"),
            ReportKind::NearestNeighbor => f.write_str("nearest-neighbor"),
            ReportKind::VoidAnalysis => f.write_str("void-analysis"),
        }
    }
}

/// A report the remote service can generate against a collection
pub trait Report: Send + Sync {
    fn kind(&self) -> ReportKind;

    /// Collection the report is generated against
    fn collection_id(&self) -> &str;

    /// Validate parameters and build the JSON request body
    fn build_body(&self) -> Result<Value, ReportError>;
}

impl ExportOrchestrator {
    /// Validate, submit and await a report; always a fresh job
    pub async fn submit_report<R: Report + ?Sized>(
        &self,
        report: &R,
        cancel: &CancellationToken,
    ) -> Result<String, ExportError> {
        let kind = report.kind();
        if report.collection_id().trim().is_empty() {
            return Err(ReportError::MissingCollection.into());
        }
        let body = report.build_body()?;
        let collection_segment = path_segment(report.collection_id())?;

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        self.api().verify_credentials().await?;
        self.metrics().report_submitted();
        info!(report = %kind, collection_id = report.collection_id(), "Submitting report");

        let url = self
            .api()
            .url(&format!("{}/{}", kind.path(), collection_segment));
        let query = vec![("format".to_string(), kind.format().to_string())];

        self.submit_and_poll(&url, query, body, self.report_policy(), cancel)
            .await
    }
}
