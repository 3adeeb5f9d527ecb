//! Download finished artifacts into an [`ArtifactStore`]

use chrono::{NaiveDate, Utc};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ArtifactStore, Result, StorageError};

const KNOWN_EXTENSIONS: &[&str] = &["csv", "zip", "xlsx", "json"];

/// HTTP settings for artifact downloads
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            max_retries: 3,
            user_agent: "cxy-export/0.1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedArtifact {
    pub key: String,
    pub size: u64,
}

/// Artifact downloader. Links are pre-signed, so no API headers are sent.
pub struct ArtifactFetcher {
    client: Client,
    config: FetchConfig,
    store: ArtifactStore,
}

impl ArtifactFetcher {
    pub fn new(config: FetchConfig, store: ArtifactStore) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            store,
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Save the artifact behind `link`, retrying transient failures
    pub async fn save(&self, link: &str, destination: Option<&str>) -> Result<SavedArtifact> {
        let url = Url::parse(link).map_err(|e| StorageError::InvalidUrl(format!("{}: {}", link, e)))?;
        let max_attempts = self.config.max_retries.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.save_once(&url, destination).await {
                Ok(saved) => {
                    if attempts > 1 {
                        debug!(link, attempts, "Download succeeded after retry");
                    }
                    info!(link, key = %saved.key, size = saved.size, location = self.store.location(), "Saved artifact");
                    return Ok(saved);
                }
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    warn!(link, attempts, error = %e, "Download failed, retrying");

                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(2u64.pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(link, attempts, error = %e, "Download failed");
                    return Err(e);
                }
            }
        }
    }

    async fn save_once(&self, url: &Url, destination: Option<&str>) -> Result<SavedArtifact> {
        debug!(url = %url, "Starting download");

        let mut response = self.client.get(url.clone()).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let key = match destination {
            Some(name) => name.trim().to_string(),
            None => file_name_for(&response, url, Utc::now().date_naive()),
        };
        let path = self.store.key(&key)?;

        let mut writer = self.store.writer(&path).await?;
        let mut size = 0u64;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    size += chunk.len() as u64;
                    writer.write(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    if let Err(abort) = writer.abort().await {
                        warn!(key = %key, error = %abort, "Failed to abort partial upload");
                    }
                    return Err(classify(e));
                }
            }
        }
        writer.finish().await?;

        Ok(SavedArtifact { key, size })
    }
}

fn classify(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Timeout
    } else {
        StorageError::DownloadFailed(e.to_string())
    }
}

fn file_name_for(response: &Response, url: &Url, today: NaiveDate) -> String {
    let headers = response.headers();
    if let Some(name) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_file_name)
    {
        return name;
    }

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    default_file_name(content_type, url.path(), today)
}

/// `export-<date>.<ext>` for links that carry no file name
pub fn default_file_name(content_type: Option<&str>, link_path: &str, today: NaiveDate) -> String {
    format!(
        "export-{}.{}",
        today.format("%Y-%m-%d"),
        extension_for(content_type, link_path)
    )
}

/// Extension from the content type, then the link path, else `csv`
pub fn extension_for(content_type: Option<&str>, link_path: &str) -> &'static str {
    if let Some(ext) = content_type
        .and_then(|raw| raw.parse::<mime::Mime>().ok())
        .and_then(|m| mime_extension(&m))
    {
        return ext;
    }

    let last = link_path.rsplit('/').next().unwrap_or_default();
    last.rsplit_once('.')
        .and_then(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            KNOWN_EXTENSIONS.iter().copied().find(|known| *known == ext)
        })
        .unwrap_or("csv")
}

fn mime_extension(m: &mime::Mime) -> Option<&'static str> {
    if m.type_() == mime::TEXT {
        return (m.subtype() == mime::CSV).then_some("csv");
    }
    if m.type_() != mime::APPLICATION {
        return None;
    }
    match m.subtype().as_str() {
        "zip" | "x-zip-compressed" => Some("zip"),
        "vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "json" => Some("json"),
        _ => None,
    }
}

/// File name from a `Content-Disposition` header, path components stripped
fn disposition_file_name(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in split_parameters(header) {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(unquote(value.trim())),
            "filename*" => extended = decode_extended(value.trim()),
            _ => {}
        }
    }

    extended
        .or(plain)
        .and_then(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .map(|base| base.trim().to_string())
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

/// Split on `;` outside quoted strings
fn split_parameters(header: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in header.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                parts.push(header[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(header[start..].trim());
    parts
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

/// RFC 5987 `charset'lang'percent-encoded`
fn decode_extended(value: &str) -> Option<String> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?.trim().to_ascii_lowercase();
    let encoded = pieces.nth(1)?.trim_matches('"');

    match charset.as_str() {
        "utf-8" | "" => urlencoding::decode(encoded).ok().map(|name| name.into_owned()),
        // Latin-1 bytes map one to one onto the first 256 code points
        "iso-8859-1" => Some(
            urlencoding::decode_binary(encoded.as_bytes())
                .iter()
                .map(|&b| char::from(b))
                .collect(),
        ),
        _ => None,
    }
}
