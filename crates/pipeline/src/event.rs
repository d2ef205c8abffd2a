//! Inbound webhook deliveries and the release events parsed from them.
//!
//! A [`WebhookDelivery`] is the raw material the listener hands to the
//! executor: the exact body bytes plus the headers that matter. Parsing into a
//! [`ReleaseEvent`] happens only after the signature has been verified.

use serde::Deserialize;

use crate::{Rejection, TagName};

/// Event name GitHub sends in the `x-github-event` header for releases.
pub const RELEASE_EVENT: &str = "release";

/// A raw webhook delivery as received by the listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookDelivery {
    /// Exact request body bytes; the signature is computed over these.
    pub body: Vec<u8>,
    /// Value of `x-hub-signature` (`sha1=<hex>`), if present.
    pub signature_sha1: Option<String>,
    /// Value of `x-hub-signature-256` (`sha256=<hex>`), if present.
    pub signature_sha256: Option<String>,
    /// Value of `x-github-event`, if present.
    pub event_name: Option<String>,
    /// Value of `x-github-delivery`, if present. Used for log correlation.
    pub delivery_id: Option<String>,
}

/// What happened to the release upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseAction {
    /// The release was published. An absent `action` field is read as this.
    Published,
    /// Any other action (`created`, `edited`, `deleted`, ...).
    Other(String),
}

/// A release event, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEvent {
    /// Upstream action.
    pub action: ReleaseAction,
    /// Tag exactly as published upstream.
    pub tag: TagName,
    /// Upstream release title (may be empty).
    pub release_name: String,
    /// Draft releases are never mirrored.
    pub draft: bool,
    /// Prereleases are published under the `beta` tag.
    pub prerelease: bool,
    /// Browser URL of the upstream release notes, when the payload carries it.
    pub html_url: Option<String>,
    /// Name of the upstream repository, when the payload carries it.
    pub upstream_name: Option<String>,
    /// Base URL release assets are downloaded from
    /// (`<repository>/releases/download`), when it can be derived.
    pub asset_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    action: Option<String>,
    release: Option<ReleasePayload>,
    repository: Option<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    name: Option<String>,
    html_url: Option<String>,
}

impl ReleaseEvent {
    /// Parses a webhook body into a release event.
    ///
    /// A body that is not JSON, or has no usable `release` object, is an
    /// [`Rejection::UnsupportedEvent`].
    pub fn from_payload(body: &[u8]) -> Result<Self, Rejection> {
        let payload: Payload =
            serde_json::from_slice(body).map_err(|e| Rejection::UnsupportedEvent {
                reason: format!("payload is not a release event: {e}"),
            })?;

        let release = payload.release.ok_or_else(|| Rejection::UnsupportedEvent {
            reason: "payload has no release".to_string(),
        })?;

        let tag = TagName::new(release.tag_name).ok_or_else(|| Rejection::UnsupportedEvent {
            reason: "release has an empty tag_name".to_string(),
        })?;

        let action = match payload.action.as_deref() {
            None | Some("published") => ReleaseAction::Published,
            Some(other) => ReleaseAction::Other(other.to_string()),
        };

        let (upstream_name, repository_url) = match payload.repository {
            Some(repo) => (repo.name, repo.html_url),
            None => (None, None),
        };
        let asset_base_url = repository_url
            .map(|url| format!("{}/releases/download", url.trim_end_matches('/')))
            .or_else(|| {
                release
                    .html_url
                    .as_deref()
                    .and_then(|url| download_base_from_release_url(url, tag.as_str()))
            });

        Ok(Self {
            action,
            release_name: release.name.unwrap_or_default(),
            draft: release.draft,
            prerelease: release.prerelease,
            html_url: release.html_url,
            upstream_name,
            asset_base_url,
            tag,
        })
    }

    /// Returns the reason this event must not be mirrored, if any.
    pub fn ignore_reason(&self) -> Option<String> {
        if self.draft {
            return Some(format!("release {} is a draft", self.tag));
        }
        match &self.action {
            ReleaseAction::Published => None,
            ReleaseAction::Other(action) => {
                Some(format!("release {} action '{action}' is not 'published'", self.tag))
            }
        }
    }
}

// `https://github.com/o/r/releases/tag/v1.0.0` -> `https://github.com/o/r/releases/download`
fn download_base_from_release_url(url: &str, tag: &str) -> Option<String> {
    url.strip_suffix(tag)
        .and_then(|rest| rest.strip_suffix("/tag/"))
        .map(|releases| format!("{releases}/download"))
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
