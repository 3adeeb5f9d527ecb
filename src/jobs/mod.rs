//! Export job orchestration
//!
//! ## Key Components
//!
//! - [`ExportOrchestrator`] - list, decide, create and await export jobs
//! - [`CachePolicy`] - pure reuse/await/create decision on job age
//! - [`JobPoller`] - the one status loop every submission path goes through
//! - [`RemoteApi`] - typed calls over a [`Transport`](crate::client::Transport)
//!
//! ## Example
//!
//! ```rust,ignore
//! use cxy_export::jobs::{ExportOptions, ExportOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = ExportOrchestrator::new(transport, "https://location.chainxy.com/api");
//! let link = orchestrator
//!     .export_resource("1234", "chain", 24.0, &ExportOptions::default(), &CancellationToken::new())
//!     .await?;
//! ```

mod cache;
mod error;
mod orchestrator;
mod poller;
mod progress;
mod remote;
pub(crate) mod types;

pub use cache::{CacheDecision, CachePolicy, decide};
pub use error::ExportError;
pub use orchestrator::{ExportOptions, ExportOrchestrator};
pub use poller::{Backoff, JobPoller, PollPolicy};
pub use progress::{LogProgress, PollEvent, ProgressObserver};
pub use remote::RemoteApi;
pub use types::{JobRecord, JobStatus, parse_timestamp};
