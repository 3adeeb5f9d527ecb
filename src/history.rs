//! Per-chain scrape history export

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::ApiRequest;
use crate::jobs::types::{RecordsEnvelope, flexible_id, id_value, optional_timestamp};
use crate::jobs::{ExportError, ExportOrchestrator};
use crate::registry::{ExportFormat, path_segment};

const SCRAPES_PATH: &str = "ChainScrapes";
const SCRAPE_DOWNLOAD_PATH: &str = "ChainScrapes/Download";

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScrapeRecord {
    #[serde(deserialize_with = "flexible_id")]
    id: String,
    #[serde(default, deserialize_with = "optional_timestamp")]
    run_date: Option<DateTime<Utc>>,
}

/// Download link for one historical scrape of a chain
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeExport {
    pub scrape_id: String,
    pub run_date: Option<DateTime<Utc>>,
    pub link: String,
}

impl ExportOrchestrator {
    /// Export every listed scrape of a chain, one after another in list
    /// order. The first failed job aborts the rest.
    pub async fn export_chain_history(
        &self,
        chain_id: &str,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScrapeExport>, ExportError> {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        self.api().verify_credentials().await?;

        let mut filter = Map::new();
        filter.insert("ChainId".to_string(), id_value(chain_id));
        let request = ApiRequest::get(self.api().url(SCRAPES_PATH))
            .query("fields", "Id,RunDate")
            .query("Query", Value::Object(filter).to_string())
            .query("Limit", limit.max(1).to_string());
        let scrapes: RecordsEnvelope<ScrapeRecord> = self.api().get_json(request).await?;

        info!(chain_id, scrapes = scrapes.records.len(), "Exporting scrape history");

        let query = vec![
            ("format".to_string(), ExportFormat::Csv.to_string()),
            ("splitLayers".to_string(), "false".to_string()),
        ];

        let mut exports = Vec::with_capacity(scrapes.records.len());
        for scrape in scrapes.records {
            let url = self
                .api()
                .url(&format!("{}/{}", SCRAPE_DOWNLOAD_PATH, path_segment(&scrape.id)?));
            let link = self
                .submit_and_poll(&url, query.clone(), json!({}), self.export_policy(), cancel)
                .await?;

            info!(scrape_id = %scrape.id, run_date = ?scrape.run_date, link = %link, "Scrape exported");
            exports.push(ScrapeExport {
                scrape_id: scrape.id,
                run_date: scrape.run_date,
                link,
            });
        }

        Ok(exports)
    }
}
