use bon::Builder;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::ApiRequest;
use crate::jobs::types::{RecordsEnvelope, id_value};
use crate::jobs::{ExportError, ExportOrchestrator};

const CHAINS_PATH: &str = "Chains";

/// Columns kept when a chain listing is written as CSV
pub const CHAIN_COLUMNS: [&str; 3] = ["Name", "Id", "LastScrapeDate"];

/// Chains scraped after a date, optionally restricted to some ids
#[derive(Debug, Clone, Builder)]
pub struct ChainQuery {
    pub scraped_after: NaiveDate,
    /// Empty means every chain
    #[builder(default)]
    pub chain_ids: Vec<String>,
}

impl ChainQuery {
    /// The `query` filter, e.g. `{"LastScrapeDate":">2022-09-01","Id":[1,2]}`
    pub fn to_filter(&self) -> Value {
        let mut filter = Map::new();
        filter.insert(
            "LastScrapeDate".to_string(),
            Value::from(format!(">{}", self.scraped_after.format("%Y-%m-%d"))),
        );
        if !self.chain_ids.is_empty() {
            let ids = self.chain_ids.iter().map(|id| id_value(id)).collect();
            filter.insert("Id".to_string(), Value::Array(ids));
        }
        Value::Object(filter)
    }
}

impl ExportOrchestrator {
    pub async fn list_chains(
        &self,
        query: &ChainQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ExportError> {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        self.api().verify_credentials().await?;

        let request = ApiRequest::get(self.api().url(CHAINS_PATH))
            .query("query", query.to_filter().to_string());
        let chains: RecordsEnvelope<Value> = self.api().get_json(request).await?;

        if chains.records.is_empty() {
            warn!(scraped_after = %query.scraped_after, "No chains match the query");
        } else {
            info!(scraped_after = %query.scraped_after, chains = chains.records.len(), "Listed chains");
        }
        Ok(chains.records)
    }
}
