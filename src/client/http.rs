//! reqwest-backed transport for the remote API

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use super::{ApiRequest, ApiResponse, Method, Result, Transport, TransportError};

const API_KEY_HEADER: &str = "x-apikey";
const APPLICATION_HEADER: &str = "x-Application";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Value sent in the `x-Application` header
    pub application: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: "cxy-export/0.1.0".to_string(),
            application: "Rust API Call".to_string(),
        }
    }
}

/// Authenticated transport that signs every request with the API key
pub struct ReqwestTransport {
    client: Client,
    api_key: String,
    application: String,
}

impl ReqwestTransport {
    pub fn new(config: HttpConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            application: config.application,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(method = ?request.method, url = %request.url, "Sending API request");

        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        builder = builder
            .header(API_KEY_HEADER, &self.api_key)
            .header(APPLICATION_HEADER, &self.application)
            .header(CONTENT_TYPE, "application/json");

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body)
                .map_err(|e| TransportError::RequestFailed(format!("Failed to encode body: {}", e)))?;
            builder = builder.body(payload);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::RequestFailed(format!("Failed to read body: {}", e)))?;

        debug!(url = %request.url, status, size = body.len(), "API response received");

        Ok(ApiResponse { status, body })
    }
}
