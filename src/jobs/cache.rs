//! Cache reuse policy for export jobs
//!
//! Decides, from the most recent job known for a resource, whether its
//! artifact can be handed back as-is, whether a still-running job should be
//! awaited, or whether a new job has to be created.

use chrono::{DateTime, Utc};

use super::error::ExportError;
use super::types::{JobRecord, JobStatus};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    ReuseLink(String),
    AwaitJob(String),
    CreateNew,
}

/// Freshness threshold in hours; zero disables reuse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    cache_time_hours: f64,
}

impl CachePolicy {
    pub fn new(cache_time_hours: f64) -> Result<Self, ExportError> {
        if !cache_time_hours.is_finite() || cache_time_hours < 0.0 {
            return Err(ExportError::InvalidCacheDuration(cache_time_hours));
        }
        Ok(Self { cache_time_hours })
    }

    pub fn cache_time_hours(&self) -> f64 {
        self.cache_time_hours
    }

    pub fn decide(&self, most_recent: Option<&JobRecord>, now: DateTime<Utc>) -> CacheDecision {
        let Some(job) = most_recent else {
            return CacheDecision::CreateNew;
        };

        if self.cache_time_hours == 0.0 {
            return CacheDecision::CreateNew;
        }

        // A record without a creation time cannot be shown to be fresh.
        let Some(created_at) = job.created_at else {
            return CacheDecision::CreateNew;
        };

        if age_hours(created_at, now) > self.cache_time_hours {
            return CacheDecision::CreateNew;
        }

        match (job.status, &job.link) {
            (JobStatus::Complete, Some(link)) => CacheDecision::ReuseLink(link.clone()),
            (JobStatus::Pending, _) => CacheDecision::AwaitJob(job.id.clone()),
            // A failed job, or a complete one without a link, has nothing to reuse.
            (JobStatus::Complete, None) | (JobStatus::Failed, _) => CacheDecision::CreateNew,
        }
    }
}

/// Validate the threshold and decide in one step
pub fn decide(
    most_recent: Option<&JobRecord>,
    cache_time_hours: f64,
    now: DateTime<Utc>,
) -> Result<CacheDecision, ExportError> {
    Ok(CachePolicy::new(cache_time_hours)?.decide(most_recent, now))
}

fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_milliseconds().abs() as f64 / MILLIS_PER_HOUR
}
