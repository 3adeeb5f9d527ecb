use bon::Builder;
use serde_json::{Value, json};

use super::{Report, ReportError, ReportKind};
use crate::jobs::types::id_value;

/// Distance from each target location to its nearest source-chain locations
#[derive(Debug, Clone, Builder)]
pub struct NearestNeighborReport {
    #[builder(into)]
    pub target_collection_id: String,
    /// Exactly one id is accepted. Multiple sources are refused on purpose.
    pub source_chain_ids: Vec<String>,
    /// How many nearest locations to measure to
    pub n: u32,
    /// Treat every location in the target collection as equal
    #[builder(default = true)]
    pub aggregate: bool,
}

impl Report for NearestNeighborReport {
    fn kind(&self) -> ReportKind {
        ReportKind::NearestNeighbor
    }

    fn collection_id(&self) -> &str {
        &self.target_collection_id
    }

    fn build_body(&self) -> Result<Value, ReportError> {
        let source = match self.source_chain_ids.as_slice() {
            [] => return Err(ReportError::MissingSource),
            [single] => single,
            many => return Err(ReportError::UnsupportedMultiSource(many.len())),
        };

        if self.n == 0 {
            return Err(ReportError::NotPositive { field: "N" });
        }

        Ok(json!({
            "Aggregate": self.aggregate,
            "InputChainId": id_value(source),
            "N": self.n,
        }))
    }
}
