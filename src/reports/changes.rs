use bon::Builder;
use chrono::NaiveDate;
use serde_json::{Value, json};

use super::{Report, ReportError, ReportKind};

/// Location changes for a collection between two dates (XLSX)
#[derive(Debug, Clone, Builder)]
pub struct ChangesOverTimeReport {
    #[builder(into)]
    pub collection_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Sheet listing every location added or removed in the window
    #[builder(default = true)]
    pub include_change_log: bool,
    #[builder(default = true)]
    pub include_count_by_open_status: bool,
    #[builder(default = true)]
    pub include_count_by_country: bool,
    #[builder(default = false)]
    pub include_count_by_state: bool,
    #[builder(default = false)]
    pub include_count_by_store_type: bool,
}

impl Report for ChangesOverTimeReport {
    fn kind(&self) -> ReportKind {
        ReportKind::ChangesOverTime
    }

    fn collection_id(&self) -> &str {
        &self.collection_id
    }

    fn build_body(&self) -> Result<Value, ReportError> {
        if self.start_date > self.end_date {
            return Err(ReportError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        Ok(json!({
            "StartDate": self.start_date.format("%Y-%m-%d").to_string(),
            "EndDate": self.end_date.format("%Y-%m-%d").to_string(),
            "IncludeChangeLog": self.include_change_log,
            "IncludeCountByOpenStatus": self.include_count_by_open_status,
            "IncludeCountByCountry": self.include_count_by_country,
            "IncludeCountByState": self.include_count_by_state,
            "IncludeCountByStoreType": self.include_count_by_store_type,
        }))
    }
}
