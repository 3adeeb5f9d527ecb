//! Typed calls against the remote job API

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::error::ExportError;
use super::types::{CreatedEnvelope, JobRecord, RecordEnvelope, RecordsEnvelope, id_value};
use crate::client::{ApiRequest, ApiResponse, Transport};
use crate::registry::EndpointSet;

const CREDENTIAL_CHECK_PATH: &str = "Users/Me";
const JOB_STATUS_PATH: &str = "Downloads";
const NEWEST_FIRST: &str = "-CreatedDate";

/// Thin typed layer over a [`Transport`]. Cheap to clone.
#[derive(Clone)]
pub struct RemoteApi {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl RemoteApi {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request; a 401 anywhere is fatal for the whole operation
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ExportError> {
        let response = self.transport.send(request).await?;
        if response.is_unauthorized() {
            return Err(ExportError::Unauthorized);
        }
        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ExportError> {
        let url = request.url.clone();
        let response = self.execute(request).await?.ensure_success(&url)?;
        Ok(response.decode(&url)?)
    }

    pub async fn verify_credentials(&self) -> Result<(), ExportError> {
        let url = self.url(CREDENTIAL_CHECK_PATH);
        self.execute(ApiRequest::get(url.as_str()))
            .await?
            .ensure_success(&url)?;
        debug!("API key accepted");
        Ok(())
    }

    /// Most recent job for a resource, if the service knows any
    pub async fn latest_job(
        &self,
        endpoints: &EndpointSet,
        resource_id: &str,
    ) -> Result<Option<JobRecord>, ExportError> {
        let mut filter = Map::new();
        filter.insert(endpoints.parent_field.to_string(), id_value(resource_id));
        let request = ApiRequest::get(endpoints.list_jobs_url.as_str())
            .query("query", Value::Object(filter).to_string())
            .query("orderBy", NEWEST_FIRST)
            .query("limit", "1");

        let envelope: RecordsEnvelope<JobRecord> = self.get_json(request).await?;

        // The service sorts newest first; guard against it not doing so.
        Ok(envelope.records.into_iter().reduce(|newest, record| {
            if record.created_at > newest.created_at {
                record
            } else {
                newest
            }
        }))
    }

    pub async fn resource_exists(
        &self,
        endpoints: &EndpointSet,
        resource_id: &str,
    ) -> Result<bool, ExportError> {
        let url = endpoints.existence_check_url(resource_id)?;
        let response = self.execute(ApiRequest::get(url.as_str())).await?;
        if response.is_not_found() {
            return Ok(false);
        }
        response.ensure_success(&url)?;
        Ok(true)
    }

    /// POST a create-job call and return the new job's id
    pub async fn create_job(
        &self,
        url: &str,
        query: Vec<(String, String)>,
        body: Value,
    ) -> Result<String, ExportError> {
        let request = ApiRequest::post(url).queries(query).json(body);
        let response = self.execute(request).await?.ensure_success(url)?;
        let created: CreatedEnvelope = response.decode(url)?;
        debug!(url, job_id = %created.id, "Job created");
        Ok(created.id)
    }

    pub async fn job_status(&self, job_id: &str) -> Result<JobRecord, ExportError> {
        let url = self.url(&format!("{}/{}", JOB_STATUS_PATH, job_id));
        let envelope: RecordEnvelope = self.get_json(ApiRequest::get(url)).await?;
        Ok(envelope.record)
    }
}
