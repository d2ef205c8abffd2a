//! Release record mirroring.

use std::sync::Arc;

use pipeline::{
    FailureKind, NewRelease, ReleaseApi, ReleaseEvent, ReleaseRecord, RepositoryRef, Stage,
    StageFailure,
};
use tracing::info;

/// Creates the mirror repository's copy of an upstream release.
#[derive(Clone)]
pub struct ReleaseMirror {
    releases: Arc<dyn ReleaseApi>,
}

impl ReleaseMirror {
    pub fn new(releases: Arc<dyn ReleaseApi>) -> Self {
        Self { releases }
    }

    /// Builds the release to create for `event`.
    ///
    /// The tag is copied verbatim; the name falls back to the tag; the body
    /// links back to the upstream release notes.
    pub fn describe(event: &ReleaseEvent) -> NewRelease {
        let name = if event.release_name.trim().is_empty() {
            event.tag.to_string()
        } else {
            event.release_name.clone()
        };
        let upstream = event.upstream_name.as_deref().unwrap_or("upstream");
        let body = match &event.html_url {
            Some(url) => format!(
                "Mirrors {upstream} [{}]({url}). See the linked release notes for changes.",
                event.tag
            ),
            None => format!("Mirrors {upstream} {}.", event.tag),
        };
        NewRelease {
            tag: event.tag.clone(),
            name,
            body,
            prerelease: event.prerelease,
        }
    }

    /// Creates the release. A rejection (for example a duplicate tag) is fatal.
    pub async fn create_release(
        &self,
        repo: &RepositoryRef,
        event: &ReleaseEvent,
    ) -> Result<ReleaseRecord, StageFailure> {
        let release = Self::describe(event);
        let record = self
            .releases
            .create_release(repo, &release)
            .await
            .map_err(|e| {
                StageFailure::remote(Stage::ReleaseMirror, FailureKind::ReleaseCreationFailed, &e)
            })?;

        if record.tag != release.tag {
            return Err(StageFailure::permanent(
                Stage::ReleaseMirror,
                FailureKind::ReleaseCreationFailed,
                format!(
                    "release was created for tag {} instead of {}",
                    record.tag, release.tag
                ),
            ));
        }
        if record.tarball_url.is_empty() {
            return Err(StageFailure::permanent(
                Stage::ReleaseMirror,
                FailureKind::ReleaseCreationFailed,
                format!("release {} has no tarball URL", record.tag),
            ));
        }

        info!(
            repo = %repo,
            tag = %record.tag,
            release_id = record.id,
            prerelease = release.prerelease,
            "Mirror release created"
        );
        Ok(record)
    }
}

#[cfg(test)]
#[path = "release_tests.rs"]
mod tests;
