//! forge::github
//!
//! GitHub reference store implementation using the REST git-refs API.
//!
//! # Design
//!
//! Implements the `RefStore` trait against three endpoints:
//! - `GET /repos/{owner}/{repo}/git/ref/{short_ref}`
//! - `POST /repos/{owner}/{repo}/git/refs`
//! - `DELETE /repos/{owner}/{repo}/git/{full_ref}`
//!
//! # Rate Limiting
//!
//! GitHub has rate limits. This implementation returns
//! `RefStoreError::RateLimited` when limits are hit and does not retry;
//! retrying is the caller's responsibility.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::traits::{GitRef, RefStore, RefStoreError};
use async_trait::async_trait;

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "branchward";

/// GitHub reference store.
///
/// Holds the repository coordinates and a bearer token; the token is supplied
/// at construction and never refreshed.
pub struct GitHubRefStore {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token (personal access token or GitHub App token)
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubRefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRefStore")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubRefStore {
    /// Create a new GitHub reference store.
    ///
    /// # Arguments
    ///
    /// * `token` - Personal access token or GitHub App token
    /// * `owner` - Repository owner
    /// * `repo` - Repository name
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a GitHub reference store with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise installations
    /// (e.g. `https://github.example.com/api/v3`).
    pub fn with_api_base(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into(),
        }
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, RefStoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|_| RefStoreError::AuthFailed("invalid token format".into()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, RefStoreError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| RefStoreError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(self.error_from_response(response, status).await)
        }
    }

    /// Map an error response from the API to a `RefStoreError`.
    async fn error_from_response(&self, response: Response, status: StatusCode) -> RefStoreError {
        // Try to get error message from body
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => RefStoreError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN => RefStoreError::AuthFailed(format!("Permission denied: {}", message)),
            StatusCode::NOT_FOUND => RefStoreError::NotFound(message),
            StatusCode::UNPROCESSABLE_ENTITY => RefStoreError::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS => RefStoreError::RateLimited,
            _ if status.is_server_error() => RefStoreError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => RefStoreError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl RefStore for GitHubRefStore {
    async fn get_ref(&self, short_ref: &str) -> Result<GitRef, RefStoreError> {
        let url = self.repo_url(&format!("git/ref/{}", short_ref));

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| RefStoreError::NetworkError(e.to_string()))?;

        let git_ref: GitHubRefObject = self.handle_response(response).await?;
        Ok(git_ref.into())
    }

    async fn create_ref(&self, full_ref: &str, sha: &str) -> Result<GitRef, RefStoreError> {
        let url = self.repo_url("git/refs");

        let body = CreateRefBody { r#ref: full_ref, sha };

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| RefStoreError::NetworkError(e.to_string()))?;

        let git_ref: GitHubRefObject = self.handle_response(response).await?;
        Ok(git_ref.into())
    }

    async fn delete_ref(&self, full_ref: &str) -> Result<(), RefStoreError> {
        // DELETE /repos/{o}/{r}/git/refs/heads/{b}; full_ref already carries
        // the refs/ prefix.
        let url = self.repo_url(&format!("git/{}", full_ref));

        let response = self
            .client
            .delete(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| RefStoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(self.error_from_response(response, status).await)
        }
    }
}

// =============================================================================
// GitHub API wire types
// =============================================================================

/// Request body for creating a ref.
#[derive(Debug, Serialize)]
struct CreateRefBody<'a> {
    r#ref: &'a str,
    sha: &'a str,
}

/// GitHub ref object as returned by the git-refs endpoints.
#[derive(Debug, Deserialize)]
struct GitHubRefObject {
    #[serde(rename = "ref")]
    ref_name: String,
    object: GitHubRefTarget,
}

/// The object a ref points at.
#[derive(Debug, Deserialize)]
struct GitHubRefTarget {
    sha: String,
}

/// GitHub API error response body.
#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

impl From<GitHubRefObject> for GitRef {
    fn from(r: GitHubRefObject) -> Self {
        GitRef {
            name: r.ref_name,
            sha: r.object.sha,
        }
    }
}
