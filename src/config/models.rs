use crate::client::HttpConfig;
use crate::humanize::HumanDuration;
use crate::jobs::{Backoff, PollPolicy};
use crate::registry::ExportFormat;
use crate::storage::FetchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote API connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Falls back to `CXY_API_KEY` when unset
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_application")]
    pub application: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            application: default_application(),
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://location.chainxy.com/api".to_string()
}

fn default_application() -> String {
    "Rust API Call".to_string()
}

fn default_user_agent() -> String {
    format!("cxy-export/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(60)
}

/// Collection export defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_cache_time_hours")]
    pub cache_time_hours: f64,
    #[serde(default = "default_export_interval")]
    pub check_interval: HumanDuration,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub split_layers: bool,
    /// Parallel exports when several ids are given
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            cache_time_hours: default_cache_time_hours(),
            check_interval: default_export_interval(),
            format: ExportFormat::default(),
            split_layers: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_cache_time_hours() -> f64 {
    24.0
}

fn default_export_interval() -> HumanDuration {
    HumanDuration::from_secs(5)
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportsConfig {
    #[serde(default = "default_report_interval")]
    pub check_interval: HumanDuration,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            check_interval: default_report_interval(),
        }
    }
}

fn default_report_interval() -> HumanDuration {
    HumanDuration::from_secs(30)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Shared poll ceiling and backoff; applies to exports and reports alike
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Unbounded when unset
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_interval")]
    pub max_interval: HumanDuration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: BackoffKind::Fixed,
            backoff_factor: default_backoff_factor(),
            max_interval: default_max_interval(),
        }
    }
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_interval() -> HumanDuration {
    HumanDuration::from_secs(300)
}

/// Where and how finished artifacts are saved
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_download_timeout")]
    pub download_timeout: HumanDuration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_retries: default_max_retries(),
            download_timeout: default_download_timeout(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_retries() -> u32 {
    3
}

fn default_download_timeout() -> HumanDuration {
    HumanDuration::from_secs(300)
}

impl Config {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: self.api.connect_timeout.as_duration(),
            request_timeout: self.api.request_timeout.as_duration(),
            user_agent: self.api.user_agent.clone(),
            application: self.api.application.clone(),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            connect_timeout: self.api.connect_timeout.as_duration(),
            request_timeout: self.storage.download_timeout.as_duration(),
            max_retries: self.storage.max_retries,
            user_agent: self.api.user_agent.clone(),
        }
    }

    pub fn export_poll_policy(&self) -> PollPolicy {
        self.poll_policy(self.export.check_interval)
    }

    pub fn report_poll_policy(&self) -> PollPolicy {
        self.poll_policy(self.reports.check_interval)
    }

    fn poll_policy(&self, interval: HumanDuration) -> PollPolicy {
        let mut policy = PollPolicy::fixed(interval.as_duration());
        if let Some(max_attempts) = self.polling.max_attempts {
            policy = policy.with_max_attempts(max_attempts);
        }
        if self.polling.backoff == BackoffKind::Exponential {
            policy = policy.with_backoff(Backoff::Exponential {
                factor: self.polling.backoff_factor,
                max_interval: self.polling.max_interval.as_duration(),
            });
        }
        policy
    }
}
