//! HTTP implementation of the codespaces service ports.
//!
//! Every failure is mapped to [`ApiError`] so application services can tell
//! permission prompts and transient failures apart without string matching.

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{CodespaceLifecycle, RepositoryCatalog, UserDirectory};
use crate::domain::codespace::{
    Codespace, CreateParams, DevContainerEntry, PostCreateState, Repository, User,
};
use crate::domain::config::ApiConfig;
use crate::domain::error::{ApiError, CodespaceError};
use crate::domain::machine::Machine;

/// Environment variables searched for an API token, in order.
pub const TOKEN_ENV_VARS: &[&str] = &["GITHUB_TOKEN", "GH_TOKEN"];

/// Client for the codespaces REST API.
#[derive(Debug, Clone)]
pub struct HttpCodespacesApi {
    http: reqwest::Client,
    api_url: String,
    web_url: String,
    locations_url: String,
}

impl HttpCodespacesApi {
    /// Builds a client authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(config: &ApiConfig, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| CodespaceError::Validation("API token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("codespace-cli/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("cannot build HTTP client")?;

        Ok(Self {
            http,
            api_url: config.url.trim_end_matches('/').to_string(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            locations_url: config.locations_url.clone(),
        })
    }

    /// Builds a client from the first token found in [`TOKEN_ENV_VARS`].
    ///
    /// # Errors
    ///
    /// Returns [`CodespaceError::Validation`] when no token is set.
    pub fn from_env(config: &ApiConfig) -> Result<Self> {
        let token = TOKEN_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| {
                CodespaceError::Validation(format!(
                    "no API token found: set {}",
                    TOKEN_ENV_VARS.join(" or ")
                ))
            })?;
        Self::new(config, token.trim())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await.map_err(body_error)?)
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

/// A body that arrived but cannot be decoded is not retried.
fn body_error(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        transport(err)
    }
}

/// Passes successful responses through and maps the rest to [`ApiError`].
async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(error_from_body(status, &body))
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    allow_permissions_url: String,
}

fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    if status == StatusCode::FORBIDDEN && !parsed.allow_permissions_url.is_empty() {
        return ApiError::AcceptPermissionsRequired {
            allow_permissions_url: parsed.allow_permissions_url,
        };
    }
    let message = if parsed.message.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        parsed.message
    };
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

#[derive(Deserialize)]
struct DevContainersPage {
    #[serde(default)]
    devcontainers: Vec<DevContainerEntry>,
}

#[derive(Deserialize)]
struct MachinesPage {
    #[serde(default)]
    machines: Vec<Machine>,
}

#[derive(Deserialize)]
struct SearchItem {
    full_name: String,
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct Region {
    current: String,
}

#[derive(Deserialize)]
struct PostCreatePage {
    #[serde(default)]
    states: Vec<PostCreateState>,
}

/// Search query for repository suggestions.
///
/// `owner/partial` searches the owner's repositories by name; anything else
/// searches all repository names.
fn suggestion_query(partial: &str) -> String {
    match partial.split_once('/') {
        Some((owner, name)) if !owner.is_empty() => format!("{name} user:{owner} in:name"),
        _ => format!("{partial} in:name"),
    }
}

impl RepositoryCatalog for HttpCodespacesApi {
    async fn get_repository(&self, nwo: &str) -> Result<Repository> {
        self.get_json(&self.url(&format!("/repos/{nwo}")), &[]).await
    }

    async fn list_dev_containers(
        &self,
        repo_id: u64,
        branch: &str,
        limit: usize,
    ) -> Result<Vec<DevContainerEntry>> {
        let page: DevContainersPage = self
            .get_json(
                &self.url(&format!("/repositories/{repo_id}/codespaces/devcontainers")),
                &[("ref", branch.to_string()), ("per_page", limit.to_string())],
            )
            .await?;
        Ok(page.devcontainers)
    }

    async fn repo_suggestions(&self, partial: &str, limit: usize) -> Result<Vec<String>> {
        if partial.is_empty() {
            return Ok(Vec::new());
        }
        let page: SearchPage = self
            .get_json(
                &self.url("/search/repositories"),
                &[
                    ("q", suggestion_query(partial)),
                    ("sort", "repo".to_string()),
                    ("per_page", limit.to_string()),
                ],
            )
            .await?;
        Ok(page.items.into_iter().map(|i| i.full_name).collect())
    }

    async fn list_machines(
        &self,
        repo_id: u64,
        branch: &str,
        location: &str,
    ) -> Result<Vec<Machine>> {
        let mut query = vec![("ref", branch.to_string())];
        if !location.is_empty() {
            query.push(("location", location.to_string()));
        }
        let page: MachinesPage = self
            .get_json(
                &self.url(&format!("/repositories/{repo_id}/codespaces/machines")),
                &query,
            )
            .await?;
        Ok(page.machines)
    }

    async fn region_location(&self) -> Result<String> {
        let region: Region = self.get_json(&self.locations_url, &[]).await?;
        Ok(region.current)
    }
}

impl CodespaceLifecycle for HttpCodespacesApi {
    async fn create_codespace(&self, params: &CreateParams) -> Result<Codespace> {
        let resp = self
            .http
            .post(self.url("/user/codespaces"))
            .json(params)
            .send()
            .await
            .map_err(transport)?;
        // 202 means creation is queued; the body still names the codespace.
        let resp = check_status(resp).await?;
        Ok(resp.json().await.map_err(body_error)?)
    }

    async fn get_codespace(&self, name: &str, include_connection: bool) -> Result<Codespace> {
        let query = if include_connection {
            vec![("internal", "true".to_string()), ("refresh", "true".to_string())]
        } else {
            Vec::new()
        };
        self.get_json(&self.url(&format!("/user/codespaces/{name}")), &query)
            .await
    }

    async fn start_codespace(&self, name: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("/user/codespaces/{name}/start")))
            .send()
            .await
            .map_err(transport)?;
        match check_status(resp).await {
            Ok(_) => Ok(()),
            // Already running.
            Err(ApiError::Status { status: 409, .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn post_create_states(&self, name: &str) -> Result<Vec<PostCreateState>> {
        let page: PostCreatePage = self
            .get_json(
                &self.url(&format!("/user/codespaces/{name}/post_create_states")),
                &[],
            )
            .await?;
        Ok(page.states)
    }
}

impl UserDirectory for HttpCodespacesApi {
    async fn current_user(&self) -> Result<User> {
        self.get_json(&self.url("/user"), &[]).await
    }

    async fn authorized_keys(&self, login: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/{login}.keys", self.web_url))
            .send()
            .await
            .map_err(transport)?;
        let resp = check_status(resp).await?;
        Ok(resp.text().await.map_err(body_error)?)
    }
}
