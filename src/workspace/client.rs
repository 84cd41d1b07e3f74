use std::time::Duration;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{Result, WorkspaceError};
use crate::rate_limiter::RateLimiter;
use crate::utils::path::normalize_workspace_path;
use crate::utils::retry::with_retry;
use super::types::{
    AccessControlRequest, ExportFormat, ExportResponse, ImportRequest, Language, ListResponse,
    ObjectInfo, ObjectPermissions,
};
use super::WorkspaceApi;

const WORKSPACE_API_PATH: &str = "api/2.0/workspace/";

/// Client for `https://{host}/api/2.0/workspace`
///
/// Every request is authenticated with the configured bearer token, passes
/// through the rate limiter and is retried on transient failures.
pub struct WorkspaceClient {
    http: Client,
    base_url: Url,
    limiter: RateLimiter,
    status_cache: Cache<ObjectInfo>,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
struct ImportBody<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<Language>,
    content: String,
    format: ExportFormat,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    overwrite: bool,
}

impl WorkspaceClient {
    /// Creates a client for `host` with default settings
    pub fn new(host: &str, token: &str) -> Result<Self> {
        Self::from_config(&Config::new(host, token))
    }

    /// Creates a client from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let base_url = workspace_base_url(config.host()?)?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.token()?.trim()))
            .map_err(|_| WorkspaceError::Auth("Access token contains invalid characters".into()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .user_agent(concat!("dbrx-api-tool/", env!("CARGO_PKG_VERSION")))
            .build()?;

        debug!("Workspace client for {}", base_url);

        Ok(Self {
            http,
            base_url,
            limiter: RateLimiter::new(config.requests_per_minute),
            status_cache: Cache::new(config.status_cache_ttl()),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }

    /// Root URL of the Workspace API, ending in `/api/2.0/workspace/`
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Requests counted by the rate limiter in the current one-minute window
    pub async fn requests_in_window(&self) -> usize {
        self.limiter.in_window().await
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, String)> {
        let url = self.base_url.join(endpoint)?;
        self.limiter.acquire().await;
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                WorkspaceError::Network(e.to_string())
            } else {
                WorkspaceError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(WorkspaceError::from_response(status, &text));
        }
        Ok((status, text))
    }

    async fn call(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, String)> {
        with_retry(
            || self.execute(method.clone(), endpoint, query, body),
            self.max_retries,
            self.retry_delay,
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let (_, text) = self.call(Method::GET, endpoint, query, None).await?;
        parse_body(&text)
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<bool> {
        let (status, _) = self.call(Method::POST, endpoint, &[], Some(body)).await?;
        Ok(status == StatusCode::OK)
    }
}

#[async_trait]
impl WorkspaceApi for WorkspaceClient {
    async fn list_contents(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        let path = normalize_workspace_path(path)?;
        let listing: ListResponse = self.get_json("list", &[("path", path.as_str())]).await?;
        debug!("{} objects under {}", listing.objects.len(), path);
        Ok(listing.objects)
    }

    async fn get_status(&self, path: &str) -> Result<ObjectInfo> {
        let path = normalize_workspace_path(path)?;
        if let Some(info) = self.status_cache.get(&path).await {
            debug!("status cache hit for {}", path);
            return Ok(info);
        }

        let generation = self.status_cache.generation();
        let info: ObjectInfo = self.get_json("get-status", &[("path", path.as_str())]).await?;
        if !self.status_cache.set(&path, info.clone(), generation).await {
            debug!("status of {} not cached", path);
        }
        Ok(info)
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<bool> {
        let path = normalize_workspace_path(path)?;
        let deleted = self
            .post("delete", &json!({ "path": path, "recursive": recursive }))
            .await?;
        self.status_cache.invalidate_prefix(&path).await;
        info!("Deleted {}{}", path, if recursive { " (recursive)" } else { "" });
        Ok(deleted)
    }

    async fn create_directory(&self, path: &str) -> Result<bool> {
        let path = normalize_workspace_path(path)?;
        let created = self.post("mkdirs", &json!({ "path": path })).await?;
        self.status_cache.invalidate_prefix(&path).await;
        info!("Created directory {}", path);
        Ok(created)
    }

    async fn import(&self, request: ImportRequest) -> Result<bool> {
        request.validate()?;
        let path = normalize_workspace_path(&request.path)?;
        let body = serde_json::to_value(ImportBody {
            path: &path,
            language: request.language,
            content: STANDARD.encode(&request.content),
            format: request.format,
            overwrite: request.overwrite,
        })?;

        let imported = self.post("import", &body).await?;
        self.status_cache.invalidate_prefix(&path).await;
        info!("Imported {} ({}, {} bytes)", path, request.format, request.content.len());
        Ok(imported)
    }

    async fn export_bytes(&self, path: &str, format: ExportFormat) -> Result<Vec<u8>> {
        let path = normalize_workspace_path(path)?;
        let export: ExportResponse = self
            .get_json("export", &[("path", path.as_str()), ("format", format.as_str())])
            .await?;
        let content = export
            .content
            .ok_or_else(|| WorkspaceError::Processing(format!("Export of {} returned no content", path)))?;
        Ok(STANDARD.decode(content.trim())?)
    }

    async fn get_permissions(&self, path: &str) -> Result<ObjectPermissions> {
        let path = normalize_workspace_path(path)?;
        self.get_json("permissions", &[("path", path.as_str())]).await
    }

    async fn update_permissions(
        &self,
        path: &str,
        access_control_list: &[AccessControlRequest],
    ) -> Result<ObjectPermissions> {
        let path = normalize_workspace_path(path)?;
        if access_control_list.is_empty() {
            return Err(WorkspaceError::Validation("Access control list is empty".into()));
        }
        for entry in access_control_list {
            entry.validate()?;
        }

        let body = json!({ "access_control_list": access_control_list });
        let (_, text) = self
            .call(Method::PATCH, "permissions", &[("path", path.as_str())], Some(&body))
            .await?;
        info!("Updated {} permission entries on {}", access_control_list.len(), path);
        parse_body(&text)
    }

    async fn move_object(&self, source_path: &str, destination_path: &str) -> Result<bool> {
        let source = normalize_workspace_path(source_path)?;
        let destination = normalize_workspace_path(destination_path)?;
        if source == "/" || destination.starts_with(&format!("{}/", source)) {
            return Err(WorkspaceError::Validation(format!(
                "Cannot move {} into {}",
                source, destination
            )));
        }

        let moved = self
            .post("move", &json!({ "source_path": source, "destination_path": destination }))
            .await?;
        self.status_cache.invalidate_prefix(&source).await;
        self.status_cache.invalidate_prefix(&destination).await;
        info!("Moved {} to {}", source, destination);
        Ok(moved)
    }
}

/// Builds the Workspace API root from a bare host or a full URL
pub fn workspace_base_url(host: &str) -> Result<Url> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(WorkspaceError::Config("Workspace host is empty".into()));
    }
    let root = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    Ok(Url::parse(&format!("{}/", root))?.join(WORKSPACE_API_PATH)?)
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T> {
    let text = text.trim();
    Ok(serde_json::from_str(if text.is_empty() { "{}" } else { text })?)
}
