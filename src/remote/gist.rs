//! GitHub Gist implementation of `BlobService`.

use super::{Blob, BlobService, BlobSummary};
use crate::error::{ApiError, RemoteError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 20;

pub struct GistClient {
    client: reqwest::Client,
    api_url: String,
}

impl GistClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("script-magic"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|e| ApiError::ConfigError(format!("Invalid GitHub token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("{} request failed: {}", context, e)))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RemoteError::Unavailable(format!("{} response read failed: {}", context, e))
        })?;
        if !status.is_success() {
            return Err(classify_status(status, context, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            RemoteError::Unavailable(format!("{} response parse failed: {}", context, e))
        })
    }

    async fn fetch_raw(&self, raw_url: &str) -> Result<String, RemoteError> {
        let response = self
            .client
            .get(raw_url)
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("raw content request failed: {}", e)))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RemoteError::Unavailable(format!("raw content read failed: {}", e))
        })?;
        if !status.is_success() {
            return Err(classify_status(status, "raw content", &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl BlobService for GistClient {
    async fn create_blob(
        &self,
        file_name: &str,
        content: &str,
        description: &str,
    ) -> Result<String, RemoteError> {
        let body = json!({
            "description": description,
            "public": false,
            "files": single_file(file_name, content),
        });
        let created: GistResponse = self
            .send(self.client.post(self.url("/gists")).json(&body), "create gist")
            .await?;
        debug!("Created gist {}", created.id);
        Ok(created.id)
    }

    async fn read_blob(&self, id: &str) -> Result<Blob, RemoteError> {
        let gist: GistResponse = self
            .send(
                self.client.get(self.url(&format!("/gists/{}", id))),
                "read gist",
            )
            .await?;
        let (file_name, file) = gist
            .files
            .iter()
            .next()
            .map(|(name, file)| (file.filename.clone().unwrap_or_else(|| name.clone()), file))
            .ok_or_else(|| RemoteError::Corrupt(format!("gist {} has no files", id)))?;

        let content = match (&file.content, file.truncated, &file.raw_url) {
            (Some(content), false, _) => content.clone(),
            (_, _, Some(raw_url)) => self.fetch_raw(raw_url).await?,
            (Some(content), true, None) => content.clone(),
            (None, _, None) => {
                return Err(RemoteError::Corrupt(format!(
                    "gist {} file {} has no content",
                    id, file_name
                )))
            }
        };

        Ok(Blob {
            id: gist.id.clone(),
            description: gist.description.clone().unwrap_or_default(),
            file_name,
            content,
            updated_at: gist.updated_at,
        })
    }

    async fn update_blob(
        &self,
        id: &str,
        file_name: &str,
        content: &str,
    ) -> Result<(), RemoteError> {
        let body = json!({ "files": single_file(file_name, content) });
        let _: GistResponse = self
            .send(
                self.client
                    .patch(self.url(&format!("/gists/{}", id)))
                    .json(&body),
                "update gist",
            )
            .await?;
        debug!("Updated gist {}", id);
        Ok(())
    }

    async fn list_blobs(&self) -> Result<Vec<BlobSummary>, RemoteError> {
        let mut all = Vec::new();
        for page in 1..=MAX_PAGES {
            let url = self.url(&format!("/gists?per_page={}&page={}", PAGE_SIZE, page));
            let batch: Vec<GistListItem> = self.send(self.client.get(url), "list gists").await?;
            let short_page = batch.len() < PAGE_SIZE;
            all.extend(batch.into_iter().map(|item| BlobSummary {
                id: item.id,
                description: item.description.unwrap_or_default(),
                updated_at: item.updated_at,
            }));
            if short_page {
                break;
            }
        }
        Ok(all)
    }
}

fn single_file(file_name: &str, content: &str) -> serde_json::Value {
    let mut files = serde_json::Map::new();
    files.insert(file_name.to_string(), json!({ "content": content }));
    serde_json::Value::Object(files)
}

fn classify_status(status: StatusCode, context: &str, body: &str) -> RemoteError {
    let detail = format!("{} failed ({}): {}", context, status, truncate(body, 200));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(detail),
        StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
        _ => RemoteError::Unavailable(detail),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    files: BTreeMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    raw_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GistListItem {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}
