use thiserror::Error;

use crate::client::TransportError;
use crate::collections::CollectionError;
use crate::listings::ListingError;
use crate::registry::RegistryError;
use crate::reports::ReportError;

/// Every way an export, report or collection call can end without a link
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("API key rejected by the remote service")]
    Unauthorized,

    #[error("unknown resource kind '{0}' (expected 'chain' or 'center')")]
    UnknownResourceKind(String),

    #[error("unknown export format '{0}'")]
    UnknownFormat(String),

    #[error("invalid resource id '{0}'")]
    InvalidResourceId(String),

    #[error("cache time must be a non-negative number of hours, got {0}")]
    InvalidCacheDuration(f64),

    #[error("nearest-neighbor reports accept exactly one source chain, got {0}")]
    UnsupportedMultiSource(usize),

    #[error("invalid report request: {0}")]
    InvalidReport(ReportError),

    #[error("invalid collection request: {0}")]
    InvalidCollection(#[from] CollectionError),

    #[error("invalid listing query: {0}")]
    InvalidListing(#[from] ListingError),

    #[error("{kind} {id} does not exist")]
    ResourceNotFound { kind: String, id: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("job {job_id} failed: {}", detail.as_deref().unwrap_or("no detail provided"))]
    JobFailed {
        job_id: String,
        detail: Option<String>,
    },

    #[error("job {job_id} still pending after {attempts} status checks")]
    PollLimitExceeded { job_id: String, attempts: u32 },

    #[error("operation cancelled")]
    Cancelled,
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::Unauthorized => "UNAUTHORIZED",
            ExportError::UnknownResourceKind(_) => "UNKNOWN_RESOURCE_KIND",
            ExportError::UnknownFormat(_) => "UNKNOWN_FORMAT",
            ExportError::InvalidResourceId(_) => "INVALID_RESOURCE_ID",
            ExportError::InvalidCacheDuration(_) => "INVALID_CACHE_DURATION",
            ExportError::UnsupportedMultiSource(_) => "UNSUPPORTED_MULTI_SOURCE",
            ExportError::InvalidReport(_) => "INVALID_REPORT",
            ExportError::InvalidCollection(_) => "INVALID_COLLECTION",
            ExportError::InvalidListing(_) => "INVALID_LISTING",
            ExportError::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            ExportError::Transport(_) => "TRANSPORT_ERROR",
            ExportError::JobFailed { .. } => "JOB_FAILED",
            ExportError::PollLimitExceeded { .. } => "POLL_LIMIT_EXCEEDED",
            ExportError::Cancelled => "CANCELLED",
        }
    }

    /// Caller input errors are detected before anything goes over the wire
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ExportError::UnknownResourceKind(_)
                | ExportError::UnknownFormat(_)
                | ExportError::InvalidResourceId(_)
                | ExportError::InvalidCacheDuration(_)
                | ExportError::UnsupportedMultiSource(_)
                | ExportError::InvalidReport(_)
                | ExportError::InvalidCollection(_)
                | ExportError::InvalidListing(_)
        )
    }
}

impl From<RegistryError> for ExportError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::UnknownResourceKind(kind) => ExportError::UnknownResourceKind(kind),
            RegistryError::UnknownFormat(format) => ExportError::UnknownFormat(format),
            RegistryError::InvalidResourceId(id) => ExportError::InvalidResourceId(id),
        }
    }
}

impl From<ReportError> for ExportError {
    fn from(value: ReportError) -> Self {
        match value {
            ReportError::UnsupportedMultiSource(count) => ExportError::UnsupportedMultiSource(count),
            other => ExportError::InvalidReport(other),
        }
    }
}
