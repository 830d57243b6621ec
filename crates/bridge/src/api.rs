use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

mod provider;
mod types;


pub use provider::{Provider, UnknownProvider};
pub use types::{
    Project, ProjectData, ProjectInfo, ProjectList, ProviderList, Release, ReleaseList,
    ReleaseNote, Webhook, WebhookList,
};

pub const DEFAULT_ENDPOINT: &str = "https://api.newreleases.io/v1";

const API_KEY_HEADER: &str = "X-Key";
const REQUEST_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("release service returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("release service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid release service response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Lets a call site treat a 404 as absence while still propagating real failures.
pub trait Found<T> {
    /// # Errors
    /// Returns every error other than [`ApiError::NotFound`].
    fn found(self) -> Result<Option<T>, ApiError>;
}

impl<T> Found<T> for Result<T, ApiError> {
    fn found(self) -> Result<Option<T>, ApiError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(ApiError::NotFound) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Typed client for the NewReleases REST API.
#[derive(Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for ReleaseClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ReleaseClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

impl ReleaseClient {
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// # Errors
    /// Returns an [`ApiError`] when the request or decoding fails.
    pub async fn list_projects(&self, page: u32) -> Result<ProjectList, ApiError> {
        self.get_paged("projects", page).await
    }

    /// # Errors
    /// Returns an [`ApiError`] when the request or decoding fails.
    pub async fn list_projects_by_provider(
        &self,
        provider: Provider,
        page: u32,
    ) -> Result<ProjectList, ApiError> {
        self.get_paged(&format!("projects/{provider}"), page).await
    }

    /// # Errors
    /// Returns [`ApiError::NotFound`] for untracked projects.
    pub async fn get_project(&self, provider: Provider, name: &str) -> Result<Project, ApiError> {
        self.get(&project_path(provider, name)).await
    }

    /// # Errors
    /// Returns an [`ApiError`] when the service rejects the project.
    pub async fn add_project(&self, data: &ProjectData) -> Result<Project, ApiError> {
        self.post("projects", data).await
    }

    /// # Errors
    /// Returns an [`ApiError`] when the service rejects the update.
    pub async fn update_project(
        &self,
        provider: Provider,
        name: &str,
        info: &ProjectInfo,
    ) -> Result<Project, ApiError> {
        self.post(&project_path(provider, name), info).await
    }

    /// Removes a project by id. The response body is returned uninterpreted.
    ///
    /// # Errors
    /// Returns an [`ApiError`] when the request fails.
    pub async fn delete_project(&self, id: &str) -> Result<serde_json::Value, ApiError> {
        let url = self.url(&format!("projects/{}", urlencoding::encode(id)));
        debug!(%url, "DELETE");
        let response = self
            .http
            .delete(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let body = checked_body(response).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// # Errors
    /// Returns an [`ApiError`] when the request or decoding fails.
    pub async fn list_releases(
        &self,
        provider: Provider,
        name: &str,
        page: u32,
    ) -> Result<ReleaseList, ApiError> {
        self.get_paged(&format!("{}/releases", project_path(provider, name)), page)
            .await
    }

    /// Fetches a specific release, or the latest one when `version` is empty.
    ///
    /// # Errors
    /// Returns [`ApiError::NotFound`] when the release does not exist.
    pub async fn get_release(
        &self,
        provider: Provider,
        name: &str,
        version: Option<&str>,
    ) -> Result<Release, ApiError> {
        match version.map(str::trim).filter(|value| !value.is_empty()) {
            Some(version) => {
                self.get(&format!(
                    "{}/releases/{}",
                    project_path(provider, name),
                    urlencoding::encode(version)
                ))
                .await
            }
            None => self.get_latest_release(provider, name).await,
        }
    }

    /// # Errors
    /// Returns [`ApiError::NotFound`] when the project has no releases yet.
    pub async fn get_latest_release(
        &self,
        provider: Provider,
        name: &str,
    ) -> Result<Release, ApiError> {
        self.get(&format!("{}/latest-release", project_path(provider, name)))
            .await
    }

    /// # Errors
    /// Returns [`ApiError::NotFound`] when the release carries no note.
    pub async fn get_release_note(
        &self,
        provider: Provider,
        name: &str,
        version: &str,
    ) -> Result<ReleaseNote, ApiError> {
        self.get(&format!(
            "{}/releases/{}/note",
            project_path(provider, name),
            urlencoding::encode(version)
        ))
        .await
    }

    /// # Errors
    /// Returns an [`ApiError`] when the request or decoding fails.
    pub async fn get_providers(&self) -> Result<ProviderList, ApiError> {
        self.get("providers").await
    }

    /// # Errors
    /// Returns an [`ApiError`] when the request or decoding fails.
    pub async fn get_webhooks(&self) -> Result<WebhookList, ApiError> {
        self.get("webhooks").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        decode(response).await
    }

    async fn get_paged<T: DeserializeOwned>(&self, path: &str, page: u32) -> Result<T, ApiError> {
        let url = self.url(path);
        let page = page.max(1);
        debug!(%url, page, "GET");
        let response = self
            .http
            .get(url)
            .query(&[("page", page)])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        decode(response).await
    }
}

/// Builds `projects/{provider}/{name}`; `owner/repo` names keep their separator.
fn project_path(provider: Provider, name: &str) -> String {
    let encoded = name
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("projects/{provider}/{encoded}")
}

async fn checked_body(response: reqwest::Response) -> Result<String, ApiError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }

    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Status { status, body });
    }

    Ok(body)
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let body = checked_body(response).await?;
    Ok(serde_json::from_str(&body)?)
}
