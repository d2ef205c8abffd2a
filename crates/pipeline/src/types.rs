//! Shared value types for the release pipeline.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values with invariants (a [`VersionString`] is always valid semver) and
//! participate in stage computations.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ContentSha, DistTag, PackageName, RemotePath, TagName};

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// The tag could not be turned into a semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a semantic version: {reason}")]
pub struct VersionError {
    /// The rejected input.
    pub input: String,
    /// Parser message.
    pub reason: String,
}

/// A semantic version derived from a release tag.
///
/// Derived once per run and used unchanged for the manifest update, the
/// release record, and the registry publish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionString(semver::Version);

impl VersionString {
    /// Parses a bare version string such as `"3.0.0"` or `"3.0.0-beta.1"`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        semver::Version::parse(input)
            .map(Self)
            .map_err(|e| VersionError {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    /// Derives the version from a tag by stripping one leading `v`.
    pub fn from_tag(tag: &TagName) -> Result<Self, VersionError> {
        let raw = tag.as_str();
        Self::parse(raw.strip_prefix('v').unwrap_or(raw))
    }

    /// Returns the underlying [`semver::Version`].
    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }

    /// Returns `true` if the version carries a prerelease component.
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// Orders by semver precedence (build metadata ignored).
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.0.cmp_precedence(&other.0)
    }

    /// Returns `true` if `self` has strictly higher precedence than `other`.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.precedence(other) == Ordering::Greater
    }
}

impl std::fmt::Display for VersionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Remote content
// ---------------------------------------------------------------------------

/// A versioned remote text artefact (manifest or type-definition file).
///
/// A write is only valid against the [`ContentSha`] observed when this value
/// was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Path relative to the repository root.
    pub path: RemotePath,
    /// Content hash at read time.
    pub sha: ContentSha,
    /// Decoded file content.
    pub content: Vec<u8>,
}

/// A conditional write of a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    /// Path relative to the repository root.
    pub path: RemotePath,
    /// Commit message.
    pub message: String,
    /// New raw content (encoded by the adapter).
    pub content: Vec<u8>,
    /// Hash the write is conditioned on. `None` creates a file that must not
    /// yet exist.
    pub sha: Option<ContentSha>,
}

// ---------------------------------------------------------------------------
// Releases
// ---------------------------------------------------------------------------

/// Parameters for creating a release on the mirror repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelease {
    /// Tag, identical to the upstream tag.
    pub tag: TagName,
    /// Release title.
    pub name: String,
    /// Release notes.
    pub body: String,
    /// Whether the release is flagged as a prerelease.
    pub prerelease: bool,
}

/// A release record as returned by the release API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Remote identifier of the release.
    pub id: u64,
    /// Tag the release was created for.
    pub tag: TagName,
    /// Browser URL of the release.
    pub html_url: String,
    /// Download URL of the source tarball.
    pub tarball_url: String,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registry publish credentials, persisted once to the local credential file.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Value of the `_auth` entry.
    pub registry_token: String,
    /// Value of the `email` entry.
    pub contact_email: String,
}

impl Credentials {
    /// Renders the two-line credential file.
    pub fn to_file_contents(&self) -> String {
        format!(
            "_auth={}\nemail={}\n",
            self.registry_token, self.contact_email
        )
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("registry_token", &"<redacted>")
            .field("contact_email", &self.contact_email)
            .finish()
    }
}

/// The registry's `latest` pointer as observed right before publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistTagState {
    /// Package the tag belongs to.
    pub package: PackageName,
    /// Version `latest` pointed at. `None` if the package was never published.
    pub current_latest: Option<VersionString>,
}

impl DistTagState {
    /// Returns the version `latest` must be moved back to after publishing
    /// `published`, if any.
    ///
    /// Reconciliation is needed only for a non-prerelease publish whose version
    /// is older than the current `latest` (a backport).
    pub fn reconciliation_target(
        &self,
        published: &VersionString,
        prerelease: bool,
    ) -> Option<&VersionString> {
        if prerelease {
            return None;
        }
        self.current_latest
            .as_ref()
            .filter(|latest| latest.is_newer_than(published))
    }
}

/// Everything the registry needs to publish one version.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    /// Package to publish.
    pub package: PackageName,
    /// Version being published.
    pub version: VersionString,
    /// Where to fetch the package tarball from.
    pub tarball_url: String,
    /// Distribution tag to publish under.
    pub dist_tag: DistTag,
    /// Manifest as written by the manifest stage; becomes the version metadata.
    pub manifest: serde_json::Value,
}

/// Authentication material presented to the registry.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    /// Basic credential from the `_auth` entry.
    pub auth: String,
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("auth", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
