use bon::Builder;
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

use super::{Report, ReportError, ReportKind};

/// Benchmark geography the trade area is compared to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminLevel {
    Country = 1,
    StateProvince = 2,
    Cbsa = 3,
    County = 4,
    Dma = 5,
}

impl TryFrom<u8> for AdminLevel {
    type Error = ReportError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AdminLevel::Country),
            2 => Ok(AdminLevel::StateProvince),
            3 => Ok(AdminLevel::Cbsa),
            4 => Ok(AdminLevel::County),
            5 => Ok(AdminLevel::Dma),
            other => Err(ReportError::InvalidAdminLevel(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Categorization {
    Category,
    Naics,
    Sic,
}

impl Categorization {
    pub fn as_str(self) -> &'static str {
        match self {
            Categorization::Category => "Category",
            Categorization::Naics => "NAICS",
            Categorization::Sic => "SIC",
        }
    }
}

impl fmt::Display for Categorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Categorization {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CATEGORY" => Ok(Categorization::Category),
            "NAICS" => Ok(Categorization::Naics),
            "SIC" => Ok(Categorization::Sic),
            _ => Err(ReportError::InvalidCategorization(s.to_string())),
        }
    }
}

/// Chains present in the benchmark geography but missing from a trade area
#[derive(Debug, Clone, Builder)]
pub struct VoidAnalysisReport {
    #[builder(into)]
    pub target_collection_id: String,
    /// Trade area radius in miles around the target location
    pub search_radius_miles: f64,
    /// 1 country, 2 state/province, 3 CBSA/CMA, 4 county (USA), 5 DMA (USA)
    pub admin_level: u8,
    pub latitude: f64,
    pub longitude: f64,
    #[builder(into)]
    pub categorization: String,
    #[builder(into)]
    pub label: String,
}

impl Report for VoidAnalysisReport {
    fn kind(&self) -> ReportKind {
        ReportKind::VoidAnalysis
    }

    fn collection_id(&self) -> &str {
        &self.target_collection_id
    }

    fn build_body(&self) -> Result<Value, ReportError> {
        let admin_level = AdminLevel::try_from(self.admin_level)?;
        let categorization: Categorization = self.categorization.parse()?;

        if !(self.search_radius_miles.is_finite() && self.search_radius_miles > 0.0) {
            return Err(ReportError::NotPositive {
                field: "SearchRadius",
            });
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ReportError::OutOfRange {
                field: "Latitude",
                value: self.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ReportError::OutOfRange {
                field: "Longitude",
                value: self.longitude,
            });
        }

        Ok(json!({
            "SearchRadius": self.search_radius_miles,
            // The service expects the level as a string
            "AdminLevel": (admin_level as u8).to_string(),
            "TargetLocation": {
                "Latitude": self.latitude,
                "Longitude": self.longitude,
            },
            "Label": self.label,
            "Categorization": categorization.as_str(),
        }))
    }
}
