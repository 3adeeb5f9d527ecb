//! Server-side collection creation

use bon::Builder;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::info;

use crate::client::ApiRequest;
use crate::jobs::types::{CreatedEnvelope, id_value};
use crate::jobs::{ExportError, ExportOrchestrator};

const COLLECTIONS_PATH: &str = "ChainLists";

#[derive(Debug, Error, PartialEq)]
pub enum CollectionError {
    #[error("collection label must not be empty")]
    EmptyLabel,

    #[error("explicit chain ids and a chains query cannot both be given")]
    ConflictingChainSelection,

    #[error("chains query must be a JSON object")]
    InvalidChainsQuery,
}

/// Optional inclusion switches; unset ones fall back to account defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InclusionFlags {
    pub coming_soon: Option<bool>,
    pub closed: Option<bool>,
    pub past: Option<bool>,
    pub distributors: Option<bool>,
    pub sub_chains: Option<bool>,
    pub deprecated_chains: Option<bool>,
    pub closed_chains: Option<bool>,
    pub poi: Option<bool>,
}

impl InclusionFlags {
    fn write_into(&self, body: &mut Map<String, Value>) {
        let flags = [
            ("IncludeComingSoon", self.coming_soon),
            ("IncludeClosed", self.closed),
            ("IncludePast", self.past),
            ("IncludeDistributors", self.distributors),
            ("IncludeSubChains", self.sub_chains),
            ("IncludeDeprecatedChains", self.deprecated_chains),
            ("IncludeClosedChains", self.closed_chains),
            ("IncludePOI", self.poi),
        ];
        for (name, value) in flags {
            if let Some(value) = value {
                body.insert(name.to_string(), Value::Bool(value));
            }
        }
    }
}

/// Definition of a new collection.
///
/// Chains are selected either by explicit ids or by a chains query, never
/// both. Giving neither selects every chain.
#[derive(Debug, Clone, Builder)]
pub struct CollectionSpec {
    #[builder(into)]
    pub label: String,
    #[builder(into)]
    pub comments: Option<String>,
    #[builder(default)]
    pub chain_ids: Vec<String>,
    pub chains_query: Option<Value>,
    /// Geographic entity ids (countries, states, ...)
    #[builder(default)]
    pub admin_levels: Vec<i64>,
    #[builder(default)]
    pub include: InclusionFlags,
}

impl CollectionSpec {
    /// Validate and build the request body
    pub fn to_body(&self) -> Result<Value, CollectionError> {
        if self.label.trim().is_empty() {
            return Err(CollectionError::EmptyLabel);
        }

        let query = match &self.chains_query {
            None => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(query @ Value::Object(_)) => Some(query),
            Some(_) => return Err(CollectionError::InvalidChainsQuery),
        };

        let mut body = Map::new();
        body.insert("Label".into(), Value::from(self.label.as_str()));
        if let Some(comments) = &self.comments {
            body.insert("Comments".into(), Value::from(comments.as_str()));
        }
        if !self.admin_levels.is_empty() {
            let levels = self.admin_levels.iter().map(|id| json!({"Id": id})).collect();
            body.insert("AdminLevels".into(), Value::Array(levels));
        }

        match (self.chain_ids.is_empty(), query) {
            (false, Some(_)) => return Err(CollectionError::ConflictingChainSelection),
            (false, None) => {
                let chains = self
                    .chain_ids
                    .iter()
                    .map(|id| json!({"Id": id_value(id)}))
                    .collect();
                body.insert("Chains".into(), Value::Array(chains));
            }
            // Sent as compact JSON text, not as a nested object
            (true, Some(query)) => {
                body.insert("ChainsQuery".into(), Value::from(query.to_string()));
            }
            (true, None) => {
                body.insert("ChainsQuery".into(), Value::from("{}"));
            }
        }

        self.include.write_into(&mut body);
        Ok(Value::Object(body))
    }
}

impl ExportOrchestrator {
    /// Create a collection and return its id. Does not download it.
    pub async fn create_collection(&self, spec: &CollectionSpec) -> Result<String, ExportError> {
        let body = spec.to_body()?;

        self.api().verify_credentials().await?;

        let url = self.api().url(COLLECTIONS_PATH);
        let response = self
            .api()
            .execute(ApiRequest::post(url.as_str()).json(body))
            .await?
            .ensure_success(&url)?;
        let created: CreatedEnvelope = response.decode(&url)?;

        info!(label = %spec.label, collection_id = %created.id, "Created collection");
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Method;
    use crate::client::scripted::ScriptedTransport;
    use std::sync::Arc;

    #[test]
    fn test_neither_selection_means_all_chains() {
        let spec = CollectionSpec::builder().label("Everything").build();
        let body = spec.to_body().unwrap();

        assert_eq!(body["ChainsQuery"], json!("{}"));
        assert!(body.get("Chains").is_none());
        assert!(body.get("AdminLevels").is_none());
    }

    #[test]
    fn test_empty_query_object_counts_as_no_query() {
        let spec = CollectionSpec::builder()
            .label("Everything")
            .chains_query(json!({}))
            .chain_ids(vec!["12".to_string()])
            .build();

        let body = spec.to_body().unwrap();
        assert_eq!(body["Chains"], json!([{"Id": 12}]));
        assert!(body.get("ChainsQuery").is_none());
    }

    #[test]
    fn test_query_is_sent_as_compact_text() {
        let spec = CollectionSpec::builder()
            .label("Groceries and QSR")
            .chains_query(json!({"Categories": {"Id": [154, 180]}}))
            .admin_levels(vec![20982, 20803])
            .include(InclusionFlags {
                closed: Some(true),
                poi: Some(false),
                ..Default::default()
            })
            .build();

        let body = spec.to_body().unwrap();
        assert_eq!(body["ChainsQuery"], json!(r#"{"Categories":{"Id":[154,180]}}"#));
        assert_eq!(body["AdminLevels"], json!([{"Id": 20982}, {"Id": 20803}]));
        assert_eq!(body["IncludeClosed"], json!(true));
        assert_eq!(body["IncludePOI"], json!(false));
        assert!(body.get("IncludePast").is_none());
    }

    #[test]
    fn test_rejections() {
        let both = CollectionSpec::builder()
            .label("x")
            .chain_ids(vec!["1".to_string()])
            .chains_query(json!({"Name": "Acme"}))
            .build();
        assert_eq!(both.to_body(), Err(CollectionError::ConflictingChainSelection));

        let unlabeled = CollectionSpec::builder().label(" ").build();
        assert_eq!(unlabeled.to_body(), Err(CollectionError::EmptyLabel));

        let bad_query = CollectionSpec::builder()
            .label("x")
            .chains_query(json!([1, 2]))
            .build();
        assert_eq!(bad_query.to_body(), Err(CollectionError::InvalidChainsQuery));
    }

    #[tokio::test]
    async fn test_create_collection_returns_new_id() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on(Method::Get, "/Users/Me", 200, json!({}))
                .on(Method::Post, "/ChainLists", 200, json!({"Id": 4410})),
        );
        let orchestrator = ExportOrchestrator::new(transport.clone(), "https://api.test/api");

        let spec = CollectionSpec::builder()
            .label("Mine")
            .comments("from tests")
            .build();
        let id = orchestrator.create_collection(&spec).await.unwrap();

        assert_eq!(id, "4410");
        let post = transport
            .recorded()
            .into_iter()
            .find(|c| c.method == Method::Post)
            .unwrap();
        assert_eq!(post.body.unwrap()["Comments"], json!("from tests"));
    }

    #[tokio::test]
    async fn test_conflicting_selection_never_reaches_the_wire() {
        let transport = Arc::new(ScriptedTransport::new());
        let orchestrator = ExportOrchestrator::new(transport.clone(), "https://api.test/api");

        let spec = CollectionSpec::builder()
            .label("x")
            .chain_ids(vec!["1".to_string()])
            .chains_query(json!({"Name": "Acme"}))
            .build();
        let err = orchestrator.create_collection(&spec).await.unwrap_err();

        assert!(matches!(
            err,
            ExportError::InvalidCollection(CollectionError::ConflictingChainSelection)
        ));
        assert!(transport.recorded().is_empty());
    }
}
