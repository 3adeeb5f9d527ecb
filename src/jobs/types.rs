use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Remote job lifecycle. Status codes on the wire are 0, 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn code(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Complete => 1,
            JobStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl TryFrom<i64> for JobStatus {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(JobStatus::Pending),
            1 => Ok(JobStatus::Complete),
            2 => Ok(JobStatus::Failed),
            other => Err(other),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("pending"),
            JobStatus::Complete => f.write_str("complete"),
            JobStatus::Failed => f.write_str("failed"),
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = i64::deserialize(deserializer)?;
        JobStatus::try_from(code)
            .map_err(|code| D::Error::custom(format!("unknown job status {}", code)))
    }
}

/// One export or report generation attempt, as observed on the remote service
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(
        default,
        alias = "ChainListId",
        alias = "CenterListId",
        alias = "ChainScrapeId",
        deserialize_with = "optional_flexible_id"
    )]
    pub resource_id: Option<String>,
    pub status: JobStatus,
    #[serde(
        default,
        rename = "CreatedDate",
        alias = "Created",
        alias = "CreatedAt",
        deserialize_with = "optional_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(
        default,
        rename = "ErrorMessage",
        alias = "Error",
        alias = "ErrorDetail"
    )]
    pub error_detail: Option<String>,
}

/// `{"Record": {...}}` returned by the job status endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct RecordEnvelope {
    #[serde(rename = "Record")]
    pub record: JobRecord,
}

/// `{"Records": [...]}` returned by list endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct RecordsEnvelope<T> {
    #[serde(rename = "Records", default = "Vec::new")]
    pub records: Vec<T>,
}

/// `{"Id": ...}` returned by every create endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedEnvelope {
    #[serde(rename = "Id", deserialize_with = "flexible_id")]
    pub id: String,
}

/// Identifiers are numeric on the wire; keep them numeric only when the
/// number prints back as the same text.
pub(crate) fn id_value(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) if n.to_string() == id => Value::from(n),
        _ => Value::from(id),
    }
}

pub(crate) fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional_flexible_id(deserializer)?.ok_or_else(|| D::Error::custom("id must not be null"))
}

pub(crate) fn optional_flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!("expected an id, got {}", other))),
    }
}

pub(crate) fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", raw))),
    }
}

/// Parse RFC 3339, or a naive timestamp taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
