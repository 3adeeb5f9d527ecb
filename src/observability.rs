//! Export counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle shared by every export path
#[derive(Debug, Default)]
pub struct Metrics {
    exports_started: AtomicU64,
    cache_reused: AtomicU64,
    jobs_awaited: AtomicU64,
    jobs_created: AtomicU64,
    reports_submitted: AtomicU64,
    status_polls: AtomicU64,
    jobs_failed: AtomicU64,
    pages_fetched: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export_started(&self) {
        self.exports_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "exports_started", "Metric incremented");
    }

    pub fn cache_reused(&self) {
        self.cache_reused.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cache_reused", "Metric incremented");
    }

    pub fn job_awaited(&self) {
        self.jobs_awaited.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_awaited", "Metric incremented");
    }

    pub fn job_created(&self) {
        self.jobs_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_created", "Metric incremented");
    }

    pub fn report_submitted(&self) {
        self.reports_submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "reports_submitted", "Metric incremented");
    }

    pub fn status_polled(&self) {
        self.status_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exports_started: self.exports_started.load(Ordering::Relaxed),
            cache_reused: self.cache_reused.load(Ordering::Relaxed),
            jobs_awaited: self.jobs_awaited.load(Ordering::Relaxed),
            jobs_created: self.jobs_created.load(Ordering::Relaxed),
            reports_submitted: self.reports_submitted.load(Ordering::Relaxed),
            status_polls: self.status_polls.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub exports_started: u64,
    pub cache_reused: u64,
    pub jobs_awaited: u64,
    pub jobs_created: u64,
    pub reports_submitted: u64,
    pub status_polls: u64,
    pub jobs_failed: u64,
    pub pages_fetched: u64,
}
