//! HTTP [`RecordSource`] for the DummyJSON-style users API.

use std::time::{Duration, Instant};

use employee_directory_core::{
    Category, DirectoryError, EmployeeId, EmployeeRecord, RecordSource, UsersPage,
};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";
pub const DEFAULT_CATEGORIES_PATH: &str = "/products/categories";

/// Where and how to reach the upstream API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Path of the category list, relative to `base_url`.
    pub categories_path: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            categories_path: DEFAULT_CATEGORIES_PATH.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Stateless client: no caching, no retries.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: Client,
    base_url: String,
    categories_path: String,
}

impl HttpRecordSource {
    /// # Errors
    /// [`DirectoryError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, DirectoryError> {
        Self::with_config(SourceConfig { base_url: base_url.to_string(), ..SourceConfig::default() })
    }

    /// # Errors
    /// [`DirectoryError::Transport`] if the HTTP client cannot be built.
    pub fn with_config(config: SourceConfig) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| DirectoryError::Transport(format!("http client: {err}")))?;

        let categories_path = if config.categories_path.starts_with('/') {
            config.categories_path
        } else {
            format!("/{}", config.categories_path)
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            categories_path,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, usize)],
    ) -> Result<(StatusCode, String), DirectoryError> {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .query(query)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| DirectoryError::Transport(format!("GET {path}: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DirectoryError::Transport(format!("GET {path}: reading body: {err}")))?;

        tracing::debug!(
            path,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "upstream request"
        );
        Ok((status, body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, usize)],
    ) -> Result<T, DirectoryError> {
        let (status, body) = self.get(path, query).await?;
        ensure_success(status, path)?;
        decode(path, &body)
    }
}

fn ensure_success(status: StatusCode, path: &str) -> Result<(), DirectoryError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(DirectoryError::Transport(format!("GET {path}: HTTP {status}")))
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, DirectoryError> {
    serde_json::from_str(body)
        .map_err(|err| DirectoryError::Transport(format!("GET {path}: invalid body: {err}")))
}

/// Decodes a single-user body. Upstream sometimes signals absence with a message body
/// instead of a 404.
fn decode_user(id: EmployeeId, path: &str, body: &str) -> Result<EmployeeRecord, DirectoryError> {
    let value: serde_json::Value = decode(path, body)?;
    let missing_id = value.get("id").is_none();
    let not_found_message = value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|message| message.to_lowercase().contains("not found"));
    if missing_id && not_found_message {
        return Err(DirectoryError::NotFound(id));
    }
    serde_json::from_value(value)
        .map_err(|err| DirectoryError::Transport(format!("GET {path}: invalid user: {err}")))
}

impl RecordSource for HttpRecordSource {
    async fn fetch_by_id(&self, id: EmployeeId) -> Result<EmployeeRecord, DirectoryError> {
        let path = format!("/users/{id}");
        let (status, body) = self.get(&path, &[]).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(id));
        }
        ensure_success(status, &path)?;
        decode_user(id, &path, &body)
    }

    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<UsersPage, DirectoryError> {
        self.get_json("/users", &[("limit", limit), ("skip", offset)]).await
    }

    async fn fetch_all(&self, limit: usize) -> Result<Vec<EmployeeRecord>, DirectoryError> {
        let page: UsersPage = self.get_json("/users", &[("limit", limit)]).await?;
        Ok(page.users)
    }

    async fn fetch_category_list(&self) -> Result<Vec<Category>, DirectoryError> {
        self.get_json(&self.categories_path, &[]).await
    }
}
