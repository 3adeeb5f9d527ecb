//! Export job orchestrator
//!
//! Flow for a collection export:
//! 1. Validate kind and cache time (no network)
//! 2. Check the credential once
//! 3. Fetch the most recent job for the resource
//! 4. Ask the cache policy what to do with it
//! 5. Reuse its link, await it, or confirm the resource exists and create
//!    a new job, then hand the job id to the poller
//!
//! Every invocation is independent; nothing is kept between calls.

use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::cache::{CacheDecision, CachePolicy};
use super::error::ExportError;
use super::poller::{JobPoller, PollPolicy};
use super::progress::{LogProgress, ProgressObserver};
use super::remote::RemoteApi;
use crate::client::Transport;
use crate::observability::Metrics;
use crate::registry::{EndpointRegistry, EndpointSet, ExportFormat, path_segment};

/// Caller overrides merged over an endpoint set's default parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOptions {
    pub format: Option<ExportFormat>,
    pub split_layers: Option<bool>,
    /// Vintage of the data to export
    pub data_date: Option<NaiveDate>,
    pub extra: BTreeMap<String, String>,
}

impl ExportOptions {
    /// Defaults first, overrides replace same-named parameters
    pub fn merge_into(&self, defaults: &[(String, String)]) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = defaults.to_vec();

        let mut set = |name: &str, value: String| {
            match merged.iter_mut().find(|(k, _)| k == name) {
                Some(entry) => entry.1 = value,
                None => merged.push((name.to_string(), value)),
            }
        };

        if let Some(format) = self.format {
            set("format", format.to_string());
        }
        if let Some(split) = self.split_layers {
            set("splitLayers", split.to_string());
        }
        if let Some(date) = self.data_date {
            set("dataDate", date.format("%Y-%m-%d").to_string());
        }
        for (name, value) in &self.extra {
            set(name, value.clone());
        }

        merged
    }
}

/// Composes registry, cache policy and poller. Cheap to clone; clones share
/// only immutable state plus the metrics counters.
#[derive(Clone)]
pub struct ExportOrchestrator {
    api: RemoteApi,
    registry: Arc<EndpointRegistry>,
    poller: JobPoller,
    metrics: Arc<Metrics>,
    observer: Arc<dyn ProgressObserver>,
    export_policy: PollPolicy,
    report_policy: PollPolicy,
}

impl ExportOrchestrator {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let api = RemoteApi::new(transport, base_url.as_str());
        let metrics = Arc::new(Metrics::new());
        let observer: Arc<dyn ProgressObserver> = Arc::new(LogProgress);

        Self {
            poller: JobPoller::new(api.clone(), observer.clone(), metrics.clone()),
            registry: Arc::new(EndpointRegistry::new(base_url)),
            api,
            metrics,
            observer,
            export_policy: PollPolicy::default(),
            report_policy: PollPolicy::fixed(Duration::from_secs(30)),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self.rebuild_poller();
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self.rebuild_poller();
        self
    }

    pub fn with_export_policy(mut self, policy: PollPolicy) -> Self {
        self.export_policy = policy;
        self
    }

    pub fn with_report_policy(mut self, policy: PollPolicy) -> Self {
        self.report_policy = policy;
        self
    }

    fn rebuild_poller(&mut self) {
        self.poller = JobPoller::new(self.api.clone(), self.observer.clone(), self.metrics.clone());
    }

    pub fn api(&self) -> &RemoteApi {
        &self.api
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn export_policy(&self) -> &PollPolicy {
        &self.export_policy
    }

    pub fn report_policy(&self) -> &PollPolicy {
        &self.report_policy
    }

    /// Export a stored collection, reusing a fresh artifact when one exists
    pub async fn export_resource(
        &self,
        resource_id: &str,
        kind: &str,
        cache_time_hours: f64,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<String, ExportError> {
        let endpoints = self.registry.resolve(kind)?;
        let policy = CachePolicy::new(cache_time_hours)?;
        self.export_with(resource_id, &endpoints, policy, options, cancel)
            .await
    }

    async fn export_with(
        &self,
        resource_id: &str,
        endpoints: &EndpointSet,
        policy: CachePolicy,
        options: &ExportOptions,
        cancel: &CancellationToken,
    ) -> Result<String, ExportError> {
        path_segment(resource_id)?;
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        self.metrics.export_started();
        info!(resource_id, kind = %endpoints.kind, cache_time_hours = policy.cache_time_hours(), "Starting export");

        self.api.verify_credentials().await?;

        let most_recent = self.api.latest_job(endpoints, resource_id).await?;
        let decision = policy.decide(most_recent.as_ref(), Utc::now());

        match decision {
            CacheDecision::ReuseLink(link) => {
                self.metrics.cache_reused();
                info!(resource_id, link = %link, "Reusing fresh export");
                Ok(link)
            }
            CacheDecision::AwaitJob(job_id) => {
                self.metrics.job_awaited();
                info!(resource_id, job_id = %job_id, "Awaiting export already in progress");
                self.poller
                    .poll(&job_id, &self.export_policy, cancel)
                    .await
            }
            CacheDecision::CreateNew => {
                if !self.api.resource_exists(endpoints, resource_id).await? {
                    return Err(ExportError::ResourceNotFound {
                        kind: endpoints.kind.to_string(),
                        id: resource_id.to_string(),
                    });
                }

                let query = options.merge_into(&endpoints.default_params);
                let job_id = self
                    .api
                    .create_job(
                        &endpoints.create_job_url(resource_id)?,
                        query,
                        serde_json::json!({}),
                    )
                    .await?;
                self.metrics.job_created();
                info!(resource_id, job_id = %job_id, "Created export job");

                self.poller
                    .poll(&job_id, &self.export_policy, cancel)
                    .await
            }
        }
    }

    /// Export several resources of one kind concurrently. Results come back
    /// in input order; one failure does not stop the others.
    pub async fn export_many(
        &self,
        resource_ids: Vec<String>,
        kind: &str,
        cache_time_hours: f64,
        options: &ExportOptions,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, Result<String, ExportError>)>, ExportError> {
        let endpoints = self.registry.resolve(kind)?;
        let policy = CachePolicy::new(cache_time_hours)?;
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));

        let mut tasks = JoinSet::new();
        for (index, resource_id) in resource_ids.iter().enumerate() {
            let this = self.clone();
            let endpoints = endpoints.clone();
            let options = options.clone();
            let cancel = cancel.clone();
            let permits = permits.clone();
            let resource_id = resource_id.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = this
                    .export_with(&resource_id, &endpoints, policy, &options, &cancel)
                    .await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<String, ExportError>>> =
            resource_ids.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Err(e) = &result {
                        warn!(resource_id = %resource_ids[index], error = %e, "Export failed");
                    }
                    results[index] = Some(result);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {}
            }
        }

        Ok(resource_ids
            .into_iter()
            .zip(results)
            .map(|(id, result)| (id, result.unwrap_or(Err(ExportError::Cancelled))))
            .collect())
    }

    /// Create a job at `url` and wait for it; no list-and-reuse step
    pub(crate) async fn submit_and_poll(
        &self,
        url: &str,
        query: Vec<(String, String)>,
        body: serde_json::Value,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, ExportError> {
        let job_id = self.api.create_job(url, query, body).await?;
        self.metrics.job_created();
        info!(url, job_id = %job_id, "Submitted job");
        self.poller.poll(&job_id, policy, cancel).await
    }
}
