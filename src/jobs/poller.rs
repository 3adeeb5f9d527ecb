//! Job status poller
//!
//! Single wait-until-terminal loop shared by every submission path.
//! Status checks for one job are strictly sequential; cancellation is
//! observed between checks, never in the middle of an HTTP call.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ExportError;
use super::progress::{PollEvent, ProgressObserver};
use super::remote::RemoteApi;
use super::types::JobStatus;
use crate::client::TransportError;
use crate::observability::Metrics;

/// How the wait between status checks evolves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: f64, max_interval: Duration },
}

/// Wait interval, growth and optional ceiling for one poll session
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` waits for as long as the job stays pending
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay after `current`, per the backoff strategy
    pub fn next_delay(&self, current: Duration) -> Duration {
        match self.backoff {
            Backoff::Fixed => current,
            Backoff::Exponential {
                factor,
                max_interval,
            } => Duration::try_from_secs_f64(current.as_secs_f64() * factor.max(1.0))
                .map_or(max_interval, |next| next.min(max_interval)),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

#[derive(Clone)]
pub struct JobPoller {
    api: RemoteApi,
    observer: Arc<dyn ProgressObserver>,
    metrics: Arc<Metrics>,
}

impl JobPoller {
    pub fn new(api: RemoteApi, observer: Arc<dyn ProgressObserver>, metrics: Arc<Metrics>) -> Self {
        Self {
            api,
            observer,
            metrics,
        }
    }

    /// Wait for `job_id` to reach a terminal state and return its link
    pub async fn poll(
        &self,
        job_id: &str,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, ExportError> {
        let mut delay = policy.interval;
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!(job_id, attempts, "Polling cancelled");
                return Err(ExportError::Cancelled);
            }

            let record = self.api.job_status(job_id).await?;
            self.metrics.status_polled();

            match record.status {
                JobStatus::Complete => {
                    let link = record.link.ok_or_else(|| TransportError::Decode {
                        url: self.api.url(&format!("Downloads/{}", job_id)),
                        reason: "job reported complete without a link".to_string(),
                    })?;
                    self.observer.on_complete(job_id, &link);
                    return Ok(link);
                }
                JobStatus::Failed => {
                    self.metrics.job_failed();
                    self.observer
                        .on_failed(job_id, record.error_detail.as_deref());
                    return Err(ExportError::JobFailed {
                        job_id: job_id.to_string(),
                        detail: record.error_detail,
                    });
                }
                JobStatus::Pending => {
                    attempts += 1;
                    if policy.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(ExportError::PollLimitExceeded {
                            job_id: job_id.to_string(),
                            attempts,
                        });
                    }

                    self.observer.on_pending(&PollEvent {
                        job_id: job_id.to_string(),
                        attempt: attempts,
                        next_delay: delay,
                    });

                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => {
                            debug!(job_id, attempts, "Polling cancelled");
                            return Err(ExportError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }

                    delay = policy.next_delay(delay);
                }
            }
        }
    }
}
