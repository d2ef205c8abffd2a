//! REST client for the GitHub contents and releases APIs.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pipeline::{
    AssetFetcher, ConfigurationError, ContentApi, ContentSha, FileUpdate, NewRelease,
    ReleaseApi, ReleaseRecord, RemoteError, RemoteFile, RemotePath, RepositoryRef, TagName,
};
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default REST API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("release-relay/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Settings for [`GithubClient`].
#[derive(Clone)]
pub struct GithubClientConfig {
    /// REST API root, e.g. [`DEFAULT_API_URL`].
    pub api_url: String,
    /// OAuth or personal access token.
    pub token: String,
    /// Upper bound for every request.
    pub timeout: Duration,
}

impl std::fmt::Debug for GithubClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClientConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// GitHub adapter implementing [`ContentApi`], [`ReleaseApi`] and
/// [`AssetFetcher`].
#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_url: Url,
    token: String,
}

impl GithubClient {
    /// Builds a client. Fails if the API URL cannot be used as a base URL.
    pub fn new(config: GithubClientConfig) -> Result<Self, ConfigurationError> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            ConfigurationError::new(format!("invalid GitHub API URL '{}': {e}", config.api_url))
        })?;
        if api_url.cannot_be_a_base() {
            return Err(ConfigurationError::new(format!(
                "GitHub API URL '{}' cannot be used as a base",
                config.api_url
            )));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigurationError::new(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url,
            token: config.token,
        })
    }

    /// `<api>/repos/<owner>/<repo>/contents/<path>`
    pub fn contents_url(&self, repo: &RepositoryRef, path: &RemotePath) -> Url {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"];
        segments.extend(path.as_str().split('/').filter(|s| !s.is_empty()));
        self.endpoint(&segments)
    }

    /// `<api>/repos/<owner>/<repo>/releases`
    pub fn releases_url(&self, repo: &RepositoryRef) -> Url {
        self.endpoint(&["repos", repo.owner.as_str(), repo.repo.as_str(), "releases"])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(ACCEPT, GITHUB_JSON)
            .header(AUTHORIZATION, format!("token {}", self.token))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateFileBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UpdateFileResponse {
    content: UpdatedContent,
}

#[derive(Debug, Deserialize)]
struct UpdatedContent {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateReleaseBody<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    tag_name: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    tarball_url: Option<String>,
}

/// Decodes the base64 `content` of a contents response. GitHub wraps the
/// encoded text at 60 columns.
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| e.to_string())
}

/// Encodes raw bytes for a contents write.
pub fn encode_content(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

fn transport_error(resource: &str, error: &reqwest::Error) -> RemoteError {
    RemoteError::unanswered(resource, error.is_timeout(), error.to_string())
}

// Turns a non-success response into a `RemoteError`, keeping GitHub's message.
async fn check(response: Response, resource: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::from_response(
        status.as_u16(),
        resource,
        retry_after.as_deref(),
        &body,
    ))
}

async fn json<T: serde::de::DeserializeOwned>(
    response: Response,
    resource: &str,
) -> Result<T, RemoteError> {
    response
        .json::<T>()
        .await
        .map_err(|e| RemoteError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Port implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl ContentApi for GithubClient {
    async fn get_file(
        &self,
        repo: &RepositoryRef,
        path: &RemotePath,
    ) -> Result<RemoteFile, RemoteError> {
        let url = self.contents_url(repo, path);
        let resource = url.to_string();
        debug!(url = %resource, "GET contents");

        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|e| transport_error(&resource, &e))?;
        let body: ContentResponse = json(check(response, &resource).await?, &resource).await?;

        if let Some(encoding) = body.encoding.as_deref() {
            if encoding != "base64" {
                return Err(RemoteError::Decode {
                    resource,
                    message: format!("unsupported content encoding '{encoding}'"),
                });
            }
        }
        let content = decode_content(&body.content).map_err(|message| RemoteError::Decode {
            resource: resource.clone(),
            message,
        })?;
        let sha = ContentSha::new(body.sha).ok_or_else(|| RemoteError::Decode {
            resource: resource.clone(),
            message: "response has an empty sha".to_string(),
        })?;

        Ok(RemoteFile {
            path: path.clone(),
            sha,
            content,
        })
    }

    async fn update_file(
        &self,
        repo: &RepositoryRef,
        update: &FileUpdate,
    ) -> Result<ContentSha, RemoteError> {
        let url = self.contents_url(repo, &update.path);
        let resource = url.to_string();
        let body = UpdateFileBody {
            message: &update.message,
            content: encode_content(&update.content),
            sha: update.sha.as_ref().map(ContentSha::as_str),
        };
        debug!(url = %resource, sha = ?body.sha, "PUT contents");

        let response = self
            .authorized(self.http.put(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&resource, &e))?;
        let response = check(response, &resource).await.map_err(|e| match e {
            // A missing or stale sha is reported as 422 on some endpoints.
            RemoteError::Status {
                status: 422,
                resource,
                message,
                ..
            } if message.contains("sha") => RemoteError::Conflict { resource, message },
            other => other,
        })?;
        let written: UpdateFileResponse = json(response, &resource).await?;

        ContentSha::new(written.content.sha).ok_or_else(|| RemoteError::Decode {
            resource,
            message: "response has an empty sha".to_string(),
        })
    }
}

#[async_trait]
impl ReleaseApi for GithubClient {
    async fn create_release(
        &self,
        repo: &RepositoryRef,
        release: &NewRelease,
    ) -> Result<ReleaseRecord, RemoteError> {
        let url = self.releases_url(repo);
        let resource = url.to_string();
        let body = CreateReleaseBody {
            tag_name: release.tag.as_str(),
            name: &release.name,
            body: &release.body,
            draft: false,
            prerelease: release.prerelease,
        };
        debug!(url = %resource, tag = %release.tag, "POST release");

        let response = self
            .authorized(self.http.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&resource, &e))?;
        let created: ReleaseResponse = json(check(response, &resource).await?, &resource).await?;

        let tag = TagName::new(created.tag_name).ok_or_else(|| RemoteError::Decode {
            resource: resource.clone(),
            message: "release has an empty tag_name".to_string(),
        })?;
        Ok(ReleaseRecord {
            id: created.id,
            tag,
            html_url: created.html_url,
            tarball_url: created.tarball_url.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl AssetFetcher for GithubClient {
    // Assets are public downloads (often redirected to a CDN); the API token
    // is not sent.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        debug!(url, "GET asset");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;
        let response = check(response, url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, &e))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
