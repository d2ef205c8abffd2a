//! npm registry client.
//!
//! Publishing follows the registry's document protocol: the tarball is
//! downloaded, hashed, and uploaded inline as a base64 attachment of a
//! `PUT /<package>` document that also carries the version metadata and the
//! requested dist-tag.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pipeline::{
    ConfigurationError, DistTag, PackageName, PackageRegistry, PublishRequest, RegistryAuth,
    RemoteError, VersionString,
};
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha1::Sha1;
use sha2::{Digest, Sha512};
use tracing::{debug, info};

/// Public npm registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

const USER_AGENT: &str = concat!("release-relay/", env!("CARGO_PKG_VERSION"));

/// Settings for [`NpmRegistry`].
#[derive(Debug, Clone)]
pub struct NpmRegistryConfig {
    pub registry_url: String,
    /// Upper bound for every request, including the tarball download.
    pub timeout: Duration,
}

/// [`PackageRegistry`] over the npm registry HTTP API.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    http: Client,
    registry_url: Url,
}

#[derive(Debug, Deserialize)]
struct VersionDocument {
    version: String,
}

impl NpmRegistry {
    pub fn new(config: NpmRegistryConfig) -> Result<Self, ConfigurationError> {
        let registry_url = Url::parse(&config.registry_url).map_err(|e| {
            ConfigurationError::new(format!(
                "invalid registry URL '{}': {e}",
                config.registry_url
            ))
        })?;
        if registry_url.cannot_be_a_base() {
            return Err(ConfigurationError::new(format!(
                "registry URL '{}' cannot be used as a base",
                config.registry_url
            )));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigurationError::new(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { http, registry_url })
    }

    /// `<registry>/<package>`; a scoped name becomes a single `@scope%2Fname`
    /// segment.
    pub fn package_url(&self, package: &PackageName) -> Url {
        self.endpoint(&[package.as_str()])
    }

    /// `<registry>/<package>/<tag>`
    pub fn tag_url(&self, package: &PackageName, tag: &DistTag) -> Url {
        self.endpoint(&[package.as_str(), tag.as_str()])
    }

    /// `<registry>/-/package/<package>/dist-tags/<tag>`
    pub fn dist_tag_url(&self, package: &PackageName, tag: &DistTag) -> Url {
        self.endpoint(&["-", "package", package.as_str(), "dist-tags", tag.as_str()])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.registry_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(request: RequestBuilder, auth: &RegistryAuth) -> RequestBuilder {
        request
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Basic {}", auth.auth))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        debug!(url, "GET tarball");
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

/// Digests recorded in a version's `dist` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballDigests {
    /// Lowercase hex SHA-1.
    pub shasum: String,
    /// Subresource-integrity string, `sha512-<base64>`.
    pub integrity: String,
}

impl TarballDigests {
    pub fn of(tarball: &[u8]) -> Self {
        Self {
            shasum: hex::encode(Sha1::digest(tarball)),
            integrity: format!("sha512-{}", STANDARD.encode(Sha512::digest(tarball))),
        }
    }
}

/// Builds the publish document for `request` carrying `tarball` inline.
///
/// The version metadata is the manifest with `name`, `version`, `_id` and
/// `dist` set from the request; other manifest fields pass through in order.
pub fn publish_document(registry_url: &Url, request: &PublishRequest, tarball: &[u8]) -> Value {
    let name = request.package.as_str();
    let version = request.version.to_string();
    let file_name = format!("{name}-{version}.tgz");
    let digests = TarballDigests::of(tarball);

    let mut tarball_url = registry_url.clone();
    if let Ok(mut path) = tarball_url.path_segments_mut() {
        path.pop_if_empty().extend([name, "-", file_name.as_str()]);
    }

    let mut metadata = match &request.manifest {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    metadata.insert("name".to_string(), json!(name));
    metadata.insert("version".to_string(), json!(version));
    metadata.insert("_id".to_string(), json!(format!("{name}@{version}")));
    metadata.insert(
        "dist".to_string(),
        json!({
            "shasum": digests.shasum,
            "integrity": digests.integrity,
            "tarball": tarball_url.as_str(),
        }),
    );
    let description = metadata.get("description").cloned().unwrap_or(Value::Null);

    json!({
        "_id": name,
        "name": name,
        "description": description,
        "dist-tags": { request.dist_tag.as_str(): version },
        "versions": { version.clone(): Value::Object(metadata) },
        "access": Value::Null,
        "_attachments": {
            file_name: {
                "content_type": "application/octet-stream",
                "data": STANDARD.encode(tarball),
                "length": tarball.len(),
            }
        }
    })
}

fn transport_error(resource: &str, error: &reqwest::Error) -> RemoteError {
    RemoteError::unanswered(resource, error.is_timeout(), error.to_string())
}

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

#[async_trait]
impl PackageRegistry for NpmRegistry {
    async fn latest_version(
        &self,
        package: &PackageName,
        auth: &RegistryAuth,
    ) -> Result<Option<VersionString>, RemoteError> {
        let url = self.tag_url(package, &DistTag::latest());
        let resource = url.to_string();
        debug!(url = %resource, "GET latest");

        let response = Self::authorized(self.http.get(url), auth)
            .send()
            .await
            .map_err(|e| transport_error(&resource, &e))?;
        let response = match check(response, &resource).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let document: VersionDocument =
            response
                .json()
                .await
                .map_err(|e| RemoteError::Decode {
                    resource: resource.clone(),
                    message: e.to_string(),
                })?;

        VersionString::parse(&document.version)
            .map(Some)
            .map_err(|e| RemoteError::Decode {
                resource,
                message: e.to_string(),
            })
    }

    async fn publish(
        &self,
        request: &PublishRequest,
        auth: &RegistryAuth,
    ) -> Result<(), RemoteError> {
        let tarball = self.download(&request.tarball_url).await?;
        let document = publish_document(&self.registry_url, request, &tarball);

        let url = self.package_url(&request.package);
        let resource = url.to_string();
        info!(
            url = %resource,
            version = %request.version,
            tag = %request.dist_tag,
            bytes = tarball.len(),
            "PUT package"
        );

        let response = Self::authorized(self.http.put(url), auth)
            .json(&document)
            .send()
            .await
            .map_err(|e| transport_error(&resource, &e))?;
        check(response, &resource).await?;
        Ok(())
    }

    async fn set_dist_tag(
        &self,
        package: &PackageName,
        version: &VersionString,
        tag: &DistTag,
        auth: &RegistryAuth,
    ) -> Result<(), RemoteError> {
        let url = self.dist_tag_url(package, tag);
        let resource = url.to_string();
        info!(url = %resource, version = %version, "PUT dist-tag");

        let response = Self::authorized(self.http.put(url), auth)
            .json(&version.to_string())
            .send()
            .await
            .map_err(|e| transport_error(&resource, &e))?;
        check(response, &resource).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "npm_tests.rs"]
mod tests;
