//! Write listed records (chains, locations) into an [`ArtifactStore`]

use bytes::Bytes;
use object_store::{ObjectStore, PutPayload};
use serde_json::Value;
use tracing::info;

use super::{ArtifactStore, Result, SavedArtifact, StorageError};

/// On-disk layout of a record listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    Json,
}

impl RecordFormat {
    /// `.json` keys get JSON, everything else CSV
    pub fn for_key(key: &str) -> Self {
        if key.trim().to_ascii_lowercase().ends_with(".json") {
            RecordFormat::Json
        } else {
            RecordFormat::Csv
        }
    }
}

/// Encode `records` in the format implied by `key` and store them.
/// `columns` limits and orders CSV columns; otherwise every field seen is
/// a column, in the order records first mention it.
pub async fn save_records(
    store: &ArtifactStore,
    key: &str,
    records: &[Value],
    columns: Option<&[&str]>,
) -> Result<SavedArtifact> {
    let path = store.key(key)?;
    let format = RecordFormat::for_key(key);
    let encoded = match format {
        RecordFormat::Json => {
            serde_json::to_vec(records).map_err(|e| StorageError::Encode(e.to_string()))?
        }
        RecordFormat::Csv => encode_csv(records, columns)?,
    };

    let size = encoded.len() as u64;
    store
        .object_store()
        .put(&path, PutPayload::from(Bytes::from(encoded)))
        .await?;

    info!(key, records = records.len(), size, format = ?format, "Saved record listing");

    Ok(SavedArtifact {
        key: key.trim().to_string(),
        size,
    })
}

fn encode_csv(records: &[Value], columns: Option<&[&str]>) -> Result<Vec<u8>> {
    let headers: Vec<String> = match columns {
        Some(columns) => columns.iter().map(|c| c.to_string()).collect(),
        None => {
            let mut seen: Vec<String> = Vec::new();
            for record in records {
                if let Value::Object(fields) = record {
                    for name in fields.keys() {
                        if !seen.iter().any(|s| s == name) {
                            seen.push(name.clone());
                        }
                    }
                }
            }
            seen
        }
    };

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(&headers)
        .map_err(|e| StorageError::Encode(e.to_string()))?;

    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|name| record.get(name).map(cell).unwrap_or_default())
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| StorageError::Encode(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| StorageError::Encode(e.to_string()))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
