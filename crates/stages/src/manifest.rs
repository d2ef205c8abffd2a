//! Manifest version rewrite.
//!
//! Read-modify-write of the `version` field in the mirror repository's
//! `package.json`. The write is conditioned on the content hash observed by
//! the read, so a concurrent change fails the update instead of being lost.

use std::sync::Arc;

use pipeline::{
    ContentApi, ContentSha, FailureKind, FileUpdate, RemotePath, RepositoryRef, Stage,
    StageFailure, VersionString,
};
use serde_json::Value;
use tracing::{debug, info};

/// Result of a manifest update.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestUpdate {
    /// Manifest exactly as written.
    pub manifest: Value,
    /// `version` before the rewrite, if the field existed and was a string.
    pub previous_version: Option<String>,
    /// Content hash after the write.
    pub sha: ContentSha,
}

/// Rewrites the manifest's `version` field.
#[derive(Clone)]
pub struct ManifestUpdater {
    content: Arc<dyn ContentApi>,
    path: RemotePath,
}

impl ManifestUpdater {
    /// Creates an updater for the manifest at `path`.
    pub fn new(content: Arc<dyn ContentApi>, path: RemotePath) -> Self {
        Self { content, path }
    }

    /// Sets `version` to `version` and writes the manifest back.
    ///
    /// Read failures (including an undecodable manifest) are
    /// [`FailureKind::ManifestReadFailed`]; write failures, including a stale
    /// hash, are [`FailureKind::ManifestWriteFailed`].
    pub async fn update_version(
        &self,
        repo: &RepositoryRef,
        version: &VersionString,
        message: String,
    ) -> Result<ManifestUpdate, StageFailure> {
        let file = self.content.get_file(repo, &self.path).await.map_err(|e| {
            StageFailure::remote(Stage::ManifestUpdate, FailureKind::ManifestReadFailed, &e)
        })?;
        debug!(path = %file.path, sha = %file.sha, "Fetched manifest");

        let rewritten = rewrite_version(&file.content, version).map_err(|detail| {
            StageFailure::permanent(
                Stage::ManifestUpdate,
                FailureKind::ManifestReadFailed,
                format!("{}: {detail}", self.path),
            )
        })?;

        let update = FileUpdate {
            path: self.path.clone(),
            message,
            content: rewritten.bytes,
            sha: Some(file.sha),
        };
        let sha = self.content.update_file(repo, &update).await.map_err(|e| {
            StageFailure::remote(Stage::ManifestUpdate, FailureKind::ManifestWriteFailed, &e)
        })?;

        info!(
            path = %self.path,
            from = rewritten.previous_version.as_deref().unwrap_or("<none>"),
            to = %version,
            "Manifest version updated"
        );
        Ok(ManifestUpdate {
            manifest: rewritten.manifest,
            previous_version: rewritten.previous_version,
            sha,
        })
    }
}

/// A manifest with its `version` replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenManifest {
    /// Parsed manifest after the rewrite.
    pub manifest: Value,
    /// Serialised manifest: two-space indentation, trailing newline.
    pub bytes: Vec<u8>,
    /// Previous `version` value.
    pub previous_version: Option<String>,
}

/// Replaces `version` in a JSON manifest, keeping every other key in place.
pub fn rewrite_version(
    content: &[u8],
    version: &VersionString,
) -> Result<RewrittenManifest, String> {
    let mut manifest: Value =
        serde_json::from_slice(content).map_err(|e| format!("not valid JSON: {e}"))?;
    let object = manifest
        .as_object_mut()
        .ok_or_else(|| "manifest is not a JSON object".to_string())?;

    let previous_version = object
        .insert("version".to_string(), Value::String(version.to_string()))
        .and_then(|old| old.as_str().map(str::to_string));

    let mut bytes =
        serde_json::to_vec_pretty(&manifest).map_err(|e| format!("cannot serialise: {e}"))?;
    bytes.push(b'\n');

    Ok(RewrittenManifest {
        manifest,
        bytes,
        previous_version,
    })
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
