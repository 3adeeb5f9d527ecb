//! In-process mock of the ChainXY API for integration tests
//!
//! Serves the job endpoints under `/api` (key-checked) and artifact files
//! under `/files` and `/flaky` (no key, like pre-signed links).

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use cxy_export::client::{HttpConfig, ReqwestTransport};
use cxy_export::jobs::{ExportOrchestrator, PollPolicy};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const API_KEY: &str = "test-key";
pub const CSV_BODY: &str = "Id,ChainName,Address\n1,Acme,1 Main St\n2,Acme,9 King St\n";

#[derive(Debug, Clone)]
pub enum Outcome {
    Complete,
    Failed(String),
}

#[derive(Debug, Clone)]
struct Job {
    pending_polls: u32,
    outcome: Outcome,
    link: String,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

struct Inner {
    base_url: String,
    chain_lists: HashSet<String>,
    center_lists: HashSet<String>,
    downloads: HashMap<(String, String), Vec<Value>>,
    scrapes: HashMap<String, Vec<Value>>,
    chains: Vec<Value>,
    locations: Vec<Value>,
    jobs: HashMap<String, Job>,
    next_id: u64,
    pending_polls: u32,
    next_outcome: Outcome,
    flaky_failures: u32,
    requests: Vec<Recorded>,
}

#[derive(Clone)]
pub struct MockChainXy {
    inner: Arc<Mutex<Inner>>,
    pub base_url: String,
}

impl MockChainXy {
    /// Bind to a random local port and serve in the background
    pub async fn start() -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let mock = MockChainXy {
            inner: Arc::new(Mutex::new(Inner {
                base_url: base_url.clone(),
                chain_lists: HashSet::new(),
                center_lists: HashSet::new(),
                downloads: HashMap::new(),
                scrapes: HashMap::new(),
                chains: Vec::new(),
                locations: Vec::new(),
                jobs: HashMap::new(),
                next_id: 1000,
                pending_polls: 0,
                next_outcome: Outcome::Complete,
                flaky_failures: 0,
                requests: Vec::new(),
            })),
            base_url,
        };

        let api = Router::new()
            .route("/api/Users/Me", get(users_me))
            .route("/api/ChainListDownloads", get(chain_downloads))
            .route("/api/CenterListDownloads", get(center_downloads))
            .route("/api/ChainLists", post(create_collection))
            .route("/api/ChainLists/{id}", get(chain_list))
            .route("/api/CenterLists/{id}", get(center_list))
            .route("/api/ChainLists/Download/{id}", post(create_chain_job))
            .route("/api/CenterLists/Download/{id}", post(create_center_job))
            .route("/api/ChainLists/{report}/{id}", post(create_report_job))
            .route("/api/ChainScrapes", get(list_scrapes))
            .route("/api/ChainScrapes/Download/{id}", post(create_scrape_job))
            .route("/api/Downloads/{id}", get(job_status))
            .route("/api/Chains", get(list_chains))
            .route("/api/Locations", get(list_locations))
            .route_layer(middleware::from_fn_with_state(mock.clone(), record_and_authorize));

        let app = Router::new()
            .route("/files/{name}", get(serve_file))
            .route("/flaky/{name}", get(serve_flaky))
            .merge(api)
            .with_state(mock.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        mock
    }

    pub fn api_base(&self) -> String {
        format!("{}/api", self.base_url)
    }

    /// Orchestrator over the real reqwest transport with fast polling
    pub fn orchestrator(&self) -> ExportOrchestrator {
        self.orchestrator_with_key(API_KEY)
    }

    pub fn orchestrator_with_key(&self, key: &str) -> ExportOrchestrator {
        let transport = ReqwestTransport::new(HttpConfig::default(), key).unwrap();
        ExportOrchestrator::new(Arc::new(transport), self.api_base())
            .with_export_policy(PollPolicy::fixed(Duration::from_millis(20)))
            .with_report_policy(PollPolicy::fixed(Duration::from_millis(20)))
    }

    pub fn add_chain_list(&self, id: &str) {
        self.inner.lock().unwrap().chain_lists.insert(id.to_string());
    }

    pub fn add_center_list(&self, id: &str) {
        self.inner.lock().unwrap().center_lists.insert(id.to_string());
    }

    /// Add a download record for a chain collection, `age` old
    pub fn add_chain_download(&self, list_id: &str, job_id: &str, status: u8, link: Option<&str>, age: ChronoDuration) {
        let created = (Utc::now() - age).format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
        let record = json!({
            "Id": job_id.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(job_id)),
            "ChainListId": list_id,
            "Status": status,
            "Link": link,
            "CreatedDate": created,
        });
        self.inner
            .lock()
            .unwrap()
            .downloads
            .entry(("chain".to_string(), list_id.to_string()))
            .or_default()
            .push(record);
    }

    /// Register a job the status endpoint knows about
    pub fn add_job(&self, job_id: &str, pending_polls: u32, outcome: Outcome) {
        let mut inner = self.inner.lock().unwrap();
        let link = format!("{}/files/job-{}.csv", inner.base_url, job_id);
        inner.jobs.insert(
            job_id.to_string(),
            Job {
                pending_polls,
                outcome,
                link,
            },
        );
    }

    pub fn add_scrape(&self, chain_id: &str, scrape_id: u64, run_date: &str) {
        self.inner
            .lock()
            .unwrap()
            .scrapes
            .entry(chain_id.to_string())
            .or_default()
            .push(json!({"Id": scrape_id, "RunDate": run_date}));
    }

    pub fn add_chain(&self, id: u64, name: &str, last_scrape: &str) {
        self.inner
            .lock()
            .unwrap()
            .chains
            .push(json!({"Id": id, "Name": name, "LastScrapeDate": last_scrape, "LocationCount": 10}));
    }

    pub fn add_location(&self, id: u64, chain_id: u64, lat: f64, lng: f64, last_update: &str) {
        self.inner.lock().unwrap().locations.push(json!({
            "Id": id,
            "ChainId": chain_id,
            "Latitude": lat,
            "Longitude": lng,
            "LastUpdate": last_update,
        }));
    }

    /// Status checks each newly created job answers with "pending"
    pub fn set_pending_polls(&self, polls: u32) {
        self.inner.lock().unwrap().pending_polls = polls;
    }

    pub fn set_next_outcome(&self, outcome: Outcome) {
        self.inner.lock().unwrap().next_outcome = outcome;
    }

    /// Number of 503s `/flaky/*` serves before succeeding
    pub fn set_flaky_failures(&self, failures: u32) {
        self.inner.lock().unwrap().flaky_failures = failures;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn count_prefix(&self, method: &str, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .count()
    }

    fn create_job(&self) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let job_id = inner.next_id.to_string();
        let job = Job {
            pending_polls: inner.pending_polls,
            outcome: inner.next_outcome.clone(),
            link: format!("{}/files/job-{}.csv", inner.base_url, job_id),
        };
        inner.jobs.insert(job_id.clone(), job);
        job_id
    }
}

async fn record_and_authorize(State(mock): State<MockChainXy>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|q| q.0)
        .unwrap_or_default();

    mock.inner.lock().unwrap().requests.push(Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query,
        body: serde_json::from_slice(&bytes).ok(),
    });

    let authorized = parts
        .headers
        .get("x-apikey")
        .and_then(|v| v.to_str().ok())
        == Some(API_KEY);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"Message": "Unauthorized"}))).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn users_me(headers: HeaderMap) -> Json<Value> {
    let application = headers
        .get("x-Application")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({"Id": 1, "Application": application}))
}

fn list_downloads(mock: &MockChainXy, kind: &str, field: &str, params: &HashMap<String, String>) -> Json<Value> {
    let filter: Value = params
        .get("query")
        .and_then(|q| serde_json::from_str(q).ok())
        .unwrap_or(Value::Null);
    let list_id = match &filter[field] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    };

    let inner = mock.inner.lock().unwrap();
    let mut records = inner
        .downloads
        .get(&(kind.to_string(), list_id))
        .cloned()
        .unwrap_or_default();
    records.sort_by(|a, b| b["CreatedDate"].as_str().cmp(&a["CreatedDate"].as_str()));
    if let Some(limit) = params.get("limit").and_then(|l| l.parse::<usize>().ok()) {
        records.truncate(limit);
    }
    Json(json!({"Records": records}))
}

async fn chain_downloads(State(mock): State<MockChainXy>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    list_downloads(&mock, "chain", "ChainListId", &params)
}

async fn center_downloads(State(mock): State<MockChainXy>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    list_downloads(&mock, "center", "CenterListId", &params)
}

async fn chain_list(State(mock): State<MockChainXy>, Path(id): Path<String>) -> Response {
    if mock.inner.lock().unwrap().chain_lists.contains(&id) {
        Json(json!({"Id": id})).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn center_list(State(mock): State<MockChainXy>, Path(id): Path<String>) -> Response {
    if mock.inner.lock().unwrap().center_lists.contains(&id) {
        Json(json!({"Id": id})).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn create_chain_job(State(mock): State<MockChainXy>, Path(_id): Path<String>) -> Json<Value> {
    Json(json!({"Id": mock.create_job().parse::<u64>().unwrap()}))
}

async fn create_center_job(State(mock): State<MockChainXy>, Path(_id): Path<String>) -> Json<Value> {
    Json(json!({"Id": mock.create_job()}))
}

async fn create_report_job(State(mock): State<MockChainXy>, Path((report, _id)): Path<(String, String)>) -> Response {
    match report.as_str() {
        "UpdatesDiffReport" | "NearestReport" | "VoidAnalysisReport" => {
            Json(json!({"Id": mock.create_job().parse::<u64>().unwrap()})).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_collection(State(mock): State<MockChainXy>) -> Json<Value> {
    let id = mock.create_job();
    mock.add_chain_list(&id);
    Json(json!({"Id": id.parse::<u64>().unwrap()}))
}

async fn list_scrapes(State(mock): State<MockChainXy>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let filter: Value = params
        .get("Query")
        .and_then(|q| serde_json::from_str(q).ok())
        .unwrap_or(Value::Null);
    let chain_id = filter["ChainId"].to_string().trim_matches('"').to_string();
    let mut records = mock
        .inner
        .lock()
        .unwrap()
        .scrapes
        .get(&chain_id)
        .cloned()
        .unwrap_or_default();
    if let Some(limit) = params.get("Limit").and_then(|l| l.parse::<usize>().ok()) {
        records.truncate(limit);
    }
    Json(json!({"Records": records}))
}

/// Date part of a `">YYYY-MM-DD"` filter value
fn after(value: Option<&str>) -> String {
    value.unwrap_or_default().trim_start_matches('>').to_string()
}

fn date_part(value: &Value) -> &str {
    let text = value.as_str().unwrap_or_default();
    text.get(..10).unwrap_or(text)
}

fn id_text(value: &Value) -> String {
    value.to_string().trim_matches('"').to_string()
}

async fn list_chains(State(mock): State<MockChainXy>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let filter: Value = params
        .get("query")
        .and_then(|q| serde_json::from_str(q).ok())
        .unwrap_or(Value::Null);
    let since = after(filter["LastScrapeDate"].as_str());
    let ids: Option<Vec<String>> = filter["Id"].as_array().map(|ids| ids.iter().map(id_text).collect());

    let records: Vec<Value> = mock
        .inner
        .lock()
        .unwrap()
        .chains
        .iter()
        .filter(|c| date_part(&c["LastScrapeDate"]) > since.as_str())
        .filter(|c| ids.as_ref().is_none_or(|ids| ids.contains(&id_text(&c["Id"]))))
        .cloned()
        .collect();
    Json(json!({"Records": records}))
}

async fn list_locations(State(mock): State<MockChainXy>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let number = |name: &str, default: f64| {
        params
            .get(name)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(default)
    };
    let (north, east, south, west) = (
        number("North", 90.0),
        number("East", 180.0),
        number("South", -90.0),
        number("West", -180.0),
    );
    let since = after(params.get("LastUpdate").map(String::as_str));
    let chains: Option<Vec<String>> = params
        .get("chainIds")
        .map(|ids| ids.split(',').map(|id| id.trim().to_string()).collect());
    let limit = params.get("Limit").and_then(|l| l.parse::<i64>().ok()).unwrap_or(100);
    let page = params.get("Page").and_then(|p| p.parse::<usize>().ok()).unwrap_or(1);

    let mut matching: Vec<Value> = mock
        .inner
        .lock()
        .unwrap()
        .locations
        .iter()
        .filter(|l| date_part(&l["LastUpdate"]) > since.as_str())
        .filter(|l| chains.as_ref().is_none_or(|ids| ids.contains(&id_text(&l["ChainId"]))))
        .filter(|l| {
            let lat = l["Latitude"].as_f64().unwrap_or_default();
            let lng = l["Longitude"].as_f64().unwrap_or_default();
            (south..=north).contains(&lat) && (west..=east).contains(&lng)
        })
        .cloned()
        .collect();
    matching.sort_by_key(|l| l["Id"].as_u64());

    if limit < 1 {
        return Json(json!({"Records": matching, "Pages": 1, "Total": matching.len()}));
    }
    let size = limit as usize;
    let pages = matching.len().div_ceil(size);
    let records: Vec<Value> = matching.iter().skip(page.saturating_sub(1) * size).take(size).cloned().collect();
    Json(json!({"Records": records, "Pages": pages, "Total": matching.len()}))
}

async fn create_scrape_job(State(mock): State<MockChainXy>, Path(_id): Path<String>) -> Json<Value> {
    Json(json!({"Id": mock.create_job().parse::<u64>().unwrap()}))
}

async fn job_status(State(mock): State<MockChainXy>, Path(id): Path<String>) -> Response {
    let mut inner = mock.inner.lock().unwrap();
    let Some(job) = inner.jobs.get_mut(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let created = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let record = if job.pending_polls > 0 {
        job.pending_polls -= 1;
        json!({"Id": id, "Status": 0, "Link": null, "CreatedDate": created})
    } else {
        match &job.outcome {
            Outcome::Complete => {
                json!({"Id": id, "Status": 1, "Link": job.link, "CreatedDate": created})
            }
            Outcome::Failed(message) => {
                json!({"Id": id, "Status": 2, "ErrorMessage": message, "CreatedDate": created})
            }
        }
    };
    Json(json!({"Record": record})).into_response()
}

async fn serve_file(Path(name): Path<String>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        Bytes::from_static(CSV_BODY.as_bytes()),
    )
        .into_response()
}

async fn serve_flaky(State(mock): State<MockChainXy>, Path(_name): Path<String>) -> Response {
    {
        let mut inner = mock.inner.lock().unwrap();
        if inner.flaky_failures > 0 {
            inner.flaky_failures -= 1;
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }
    // No Content-Disposition: the saver falls back to a dated name
    ([(header::CONTENT_TYPE, "text/csv")], Bytes::from_static(CSV_BODY.as_bytes())).into_response()
}
