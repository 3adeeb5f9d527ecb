use std::time::Duration;
use tracing::{info, warn};

/// One non-terminal status observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEvent {
    pub job_id: String,
    /// 1-based count of status checks that found the job pending
    pub attempt: u32,
    pub next_delay: Duration,
}

/// Receives poller progress for presentation
pub trait ProgressObserver: Send + Sync {
    fn on_pending(&self, event: &PollEvent);

    fn on_complete(&self, _job_id: &str, _link: &str) {}

    fn on_failed(&self, _job_id: &str, _detail: Option<&str>) {}
}

/// Narrates progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_pending(&self, event: &PollEvent) {
        info!(
            job_id = %event.job_id,
            attempt = event.attempt,
            next_check_ms = event.next_delay.as_millis() as u64,
            "Job is still generating"
        );
    }

    fn on_complete(&self, job_id: &str, link: &str) {
        info!(job_id, link, "File generation completed");
    }

    fn on_failed(&self, job_id: &str, detail: Option<&str>) {
        warn!(job_id, detail = detail.unwrap_or(""), "File generation failed");
    }
}
