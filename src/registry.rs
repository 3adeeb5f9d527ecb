//! Resource endpoint registry
//!
//! Maps each exportable resource kind to the URLs used to list its jobs,
//! confirm the resource exists and create a new export job, together with
//! the default query parameters for job creation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown resource kind '{0}' (expected 'chain' or 'center')")]
    UnknownResourceKind(String),

    #[error("unknown export format '{0}' (expected CSV, ZIP_CSV or XLSX)")]
    UnknownFormat(String),

    #[error("invalid resource id '{0}'")]
    InvalidResourceId(String),
}

/// Encode an id as exactly one URL path segment. Ids that could change
/// which endpoint a URL addresses are rejected outright.
pub fn path_segment(id: &str) -> Result<String, RegistryError> {
    let unsafe_id = id.trim().is_empty()
        || id == "."
        || id == ".."
        || id.chars().any(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control());
    if unsafe_id {
        return Err(RegistryError::InvalidResourceId(id.to_string()));
    }
    Ok(urlencoding::encode(id).into_owned())
}

/// Stored collections the remote service can export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ChainCollection,
    CenterCollection,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::ChainCollection, ResourceKind::CenterCollection];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ChainCollection => "chain",
            ResourceKind::CenterCollection => "center",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ChainCollection => f.write_str("chain collection"),
            ResourceKind::CenterCollection => f.write_str("center collection"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chain" => Ok(ResourceKind::ChainCollection),
            "center" => Ok(ResourceKind::CenterCollection),
            _ => Err(RegistryError::UnknownResourceKind(s.to_string())),
        }
    }
}

/// File format of a generated artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum ExportFormat {
    #[default]
    #[serde(rename = "CSV")]
    Csv,
    #[serde(rename = "ZIP_CSV")]
    ZipCsv,
    #[serde(rename = "XLSX")]
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::ZipCsv => "ZIP_CSV",
            ExportFormat::Xlsx => "XLSX",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CSV" => Ok(ExportFormat::Csv),
            "ZIP_CSV" | "ZIP" => Ok(ExportFormat::ZipCsv),
            "XLSX" => Ok(ExportFormat::Xlsx),
            _ => Err(RegistryError::UnknownFormat(s.to_string())),
        }
    }
}

/// Everything needed to manage export jobs of one resource kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    pub kind: ResourceKind,
    pub list_jobs_url: String,
    /// Field of a job record that names its parent resource
    pub parent_field: &'static str,
    existence_check_base: String,
    create_job_base: String,
    pub default_params: Vec<(String, String)>,
}

impl EndpointSet {
    pub fn existence_check_url(&self, resource_id: &str) -> Result<String, RegistryError> {
        Ok(format!("{}/{}", self.existence_check_base, path_segment(resource_id)?))
    }

    pub fn create_job_url(&self, resource_id: &str) -> Result<String, RegistryError> {
        Ok(format!("{}/{}", self.create_job_base, path_segment(resource_id)?))
    }
}

/// Immutable lookup table built once from the API base URL
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    base_url: String,
}

impl EndpointRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn lookup(&self, kind: ResourceKind) -> EndpointSet {
        let base = &self.base_url;
        match kind {
            ResourceKind::ChainCollection => EndpointSet {
                kind,
                list_jobs_url: format!("{base}/ChainListDownloads"),
                parent_field: "ChainListId",
                existence_check_base: format!("{base}/ChainLists"),
                create_job_base: format!("{base}/ChainLists/Download"),
                default_params: vec![
                    ("format".to_string(), ExportFormat::Csv.to_string()),
                    ("splitLayers".to_string(), "false".to_string()),
                ],
            },
            ResourceKind::CenterCollection => EndpointSet {
                kind,
                list_jobs_url: format!("{base}/CenterListDownloads"),
                parent_field: "CenterListId",
                existence_check_base: format!("{base}/CenterLists"),
                create_job_base: format!("{base}/CenterLists/Download"),
                default_params: vec![("format".to_string(), ExportFormat::Csv.to_string())],
            },
        }
    }

    /// Parse a caller-supplied kind name and look it up
    pub fn resolve(&self, kind: &str) -> Result<EndpointSet, RegistryError> {
        Ok(self.lookup(kind.parse()?))
    }
}
