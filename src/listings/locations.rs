use bon::Builder;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ListingError;
use crate::client::ApiRequest;
use crate::jobs::{ExportError, ExportOrchestrator};

const LOCATIONS_PATH: &str = "Locations";

pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Geographic filter in decimal degrees. Defaults to the whole world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            north: 90.0,
            east: 180.0,
            south: -90.0,
            west: -180.0,
        }
    }
}

impl BoundingBox {
    pub fn validate(&self) -> Result<(), ListingError> {
        for (field, value, limit) in [
            ("north", self.north, 90.0),
            ("south", self.south, 90.0),
            ("east", self.east, 180.0),
            ("west", self.west, 180.0),
        ] {
            if !(-limit..=limit).contains(&value) {
                return Err(ListingError::CoordinateOutOfRange { field, value, limit });
            }
        }
        if self.south > self.north {
            return Err(ListingError::InvertedBounds {
                south: self.south,
                north: self.north,
            });
        }
        Ok(())
    }
}

/// Locations updated after a date, fetched page by page
#[derive(Debug, Clone, Builder)]
pub struct LocationQuery {
    pub updated_after: NaiveDate,
    /// Empty means every chain
    #[builder(default)]
    pub chain_ids: Vec<String>,
    #[builder(default)]
    pub bounds: BoundingBox,
    /// Records per page; -1 asks for everything in one page
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: i64,
}

impl LocationQuery {
    pub fn validate(&self) -> Result<(), ListingError> {
        if self.page_size == 0 || self.page_size < -1 {
            return Err(ListingError::InvalidPageSize(self.page_size));
        }
        self.bounds.validate()
    }

    /// Query string for one 1-based page
    pub fn page_params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(9);
        if !self.chain_ids.is_empty() {
            params.push(("chainIds", self.chain_ids.join(",")));
        }
        params.extend([
            ("Limit", self.page_size.to_string()),
            ("Page", page.to_string()),
            ("OrderBy", "Id".to_string()),
            ("North", self.bounds.north.to_string()),
            ("East", self.bounds.east.to_string()),
            ("South", self.bounds.south.to_string()),
            ("West", self.bounds.west.to_string()),
            (
                "LastUpdate",
                format!(">{}", self.updated_after.format("%Y-%m-%d")),
            ),
        ]);
        params
    }
}

#[derive(Debug, Deserialize)]
struct LocationPage {
    #[serde(rename = "Records", default)]
    records: Vec<Value>,
    #[serde(rename = "Pages", default)]
    pages: Option<u32>,
}

impl ExportOrchestrator {
    /// Walk every page of a location query. The page count comes from the
    /// first response; a response without one is the only page.
    pub async fn list_locations(
        &self,
        query: &LocationQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ExportError> {
        query.validate()?;
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        self.api().verify_credentials().await?;

        let url = self.api().url(LOCATIONS_PATH);
        let mut records = Vec::new();
        let mut page = 1;
        let mut pages = 1;
        loop {
            let request = ApiRequest::get(url.as_str()).queries(query.page_params(page));
            let body: LocationPage = self.api().get_json(request).await?;
            self.metrics().page_fetched();

            if page == 1 {
                pages = body.pages.unwrap_or(1).max(1);
                info!(updated_after = %query.updated_after, pages, "Listing locations");
            }
            debug!(page, pages, records = body.records.len(), "Fetched location page");
            records.extend(body.records);

            if page >= pages {
                break;
            }
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            page += 1;
        }

        if records.is_empty() {
            warn!(updated_after = %query.updated_after, "No locations match the query");
        }
        Ok(records)
    }
}
