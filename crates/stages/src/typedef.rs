//! Type-definition mirroring.
//!
//! Copies the type-definition asset of the upstream release into the mirror
//! repository. Older releases predate the asset, so a 404 on the download is
//! an explicit skip. Any other download failure is fatal.

use std::sync::Arc;

use pipeline::{
    AssetFetcher, ContentApi, ContentSha, FailureKind, FileUpdate, RemotePath, RepositoryRef,
    Stage, StageFailure, TagName, VersionString,
};
use tracing::{debug, info, warn};

use crate::{SkipReason, StageOutcome};

/// Mirrors a release asset into a repository file.
#[derive(Clone)]
pub struct TypeDefinitionSyncer {
    content: Arc<dyn ContentApi>,
    assets: Arc<dyn AssetFetcher>,
    path: RemotePath,
    asset_name: String,
}

impl TypeDefinitionSyncer {
    /// Creates a syncer that writes asset `asset_name` to `path`.
    pub fn new(
        content: Arc<dyn ContentApi>,
        assets: Arc<dyn AssetFetcher>,
        path: RemotePath,
        asset_name: impl Into<String>,
    ) -> Self {
        Self {
            content,
            assets,
            path,
            asset_name: asset_name.into(),
        }
    }

    /// Download URL of the asset attached to the upstream release `tag`.
    ///
    /// The tag is used exactly as published, so an unprefixed tag such as
    /// `1.4.0` resolves to its own download directory.
    pub fn asset_url(&self, asset_base_url: &str, tag: &TagName) -> String {
        format!(
            "{}/{tag}/{}",
            asset_base_url.trim_end_matches('/'),
            self.asset_name
        )
    }

    /// Downloads the asset of release `tag` and writes it to the repository.
    ///
    /// Returns the new content hash, or the reason the stage was skipped.
    pub async fn sync_type_definition(
        &self,
        repo: &RepositoryRef,
        tag: &TagName,
        version: &VersionString,
        asset_base_url: Option<&str>,
    ) -> Result<StageOutcome<ContentSha>, StageFailure> {
        // Only the hash (and, for the no-op check, the bytes) of the current
        // file is needed. A missing file is created.
        let existing = match self.content.get_file(repo, &self.path).await {
            Ok(file) => Some(file),
            Err(e) if e.is_not_found() => {
                debug!(path = %self.path, "Type definitions not yet present in mirror");
                None
            }
            Err(e) => {
                return Err(StageFailure::remote(
                    Stage::TypeDefinitionSync,
                    FailureKind::TypeDefinitionReadFailed,
                    &e,
                ))
            }
        };

        let Some(base) = asset_base_url else {
            warn!("Release event carries no asset location; skipping type definitions");
            return Ok(StageOutcome::Skipped(SkipReason::NoAssetSource));
        };
        let url = self.asset_url(base, tag);

        let downloaded = match self.assets.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                warn!(url = %url, "Type definition asset not found; skipping");
                return Ok(StageOutcome::Skipped(SkipReason::AssetNotFound { url }));
            }
            Err(e) => {
                return Err(StageFailure::remote(
                    Stage::TypeDefinitionSync,
                    FailureKind::AssetFetchFailed,
                    &e,
                ))
            }
        };

        if existing
            .as_ref()
            .is_some_and(|file| file.content == downloaded)
        {
            info!(path = %self.path, "Type definitions already up to date");
            return Ok(StageOutcome::Skipped(SkipReason::Unchanged));
        }

        let update = FileUpdate {
            path: self.path.clone(),
            message: format!("Update type definitions for v{version}"),
            content: downloaded,
            sha: existing.map(|file| file.sha),
        };
        let sha = self.content.update_file(repo, &update).await.map_err(|e| {
            StageFailure::remote(
                Stage::TypeDefinitionSync,
                FailureKind::TypeDefinitionWriteFailed,
                &e,
            )
        })?;

        info!(path = %self.path, url = %url, "Type definitions mirrored");
        Ok(StageOutcome::Completed(sha))
    }
}

#[cfg(test)]
#[path = "typedef_tests.rs"]
mod tests;
