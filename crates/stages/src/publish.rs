//! Registry publishing and `latest` reconciliation.
//!
//! Prereleases go out under `beta`, everything else under `latest`. Publishing
//! under `latest` moves the tag even when the new version is older than the
//! one it pointed at (a backport). In that case the tag is moved back to the
//! previous version right after publishing. That reassignment is the only
//! place this service touches `latest` directly.

use std::sync::Arc;

use pipeline::{
    CredentialStore, DistTag, DistTagState, FailureKind, PackageName, PackageRegistry,
    PublishRequest, RetryPolicy, Stage, StageFailure, VersionString,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::{PublishReport, Reconciliation};

/// Publishes the mirrored release to the package registry.
#[derive(Clone)]
pub struct RegistryPublisher {
    registry: Arc<dyn PackageRegistry>,
    credentials: Arc<dyn CredentialStore>,
    package: PackageName,
}

impl RegistryPublisher {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        credentials: Arc<dyn CredentialStore>,
        package: PackageName,
    ) -> Self {
        Self {
            registry,
            credentials,
            package,
        }
    }

    /// Distribution tag a release is published under.
    pub fn dist_tag_for(prerelease: bool) -> DistTag {
        if prerelease {
            DistTag::beta()
        } else {
            DistTag::latest()
        }
    }

    /// Publishes `version` from `tarball_url` and reconciles `latest`.
    ///
    /// Loading credentials, querying `latest`, and publishing are fatal on
    /// failure. A failed reconciliation is returned inside the report as
    /// [`Reconciliation::Failed`]; the publish itself stands.
    pub async fn publish(
        &self,
        version: &VersionString,
        tarball_url: &str,
        prerelease: bool,
        manifest: Value,
    ) -> Result<PublishReport, StageFailure> {
        let auth = self.credentials.load().await.map_err(|e| StageFailure {
            stage: Stage::RegistryPublish,
            kind: FailureKind::RegistryConfigFailed,
            detail: e.to_string(),
            retry: RetryPolicy::NonRetryable,
        })?;
        let dist_tag = Self::dist_tag_for(prerelease);

        let current_latest = self
            .registry
            .latest_version(&self.package, &auth)
            .await
            .map_err(|e| {
                StageFailure::remote(Stage::RegistryPublish, FailureKind::RegistryQueryFailed, &e)
            })?;
        let state = DistTagState {
            package: self.package.clone(),
            current_latest,
        };

        let request = PublishRequest {
            package: self.package.clone(),
            version: version.clone(),
            tarball_url: tarball_url.to_string(),
            dist_tag: dist_tag.clone(),
            manifest,
        };
        self.registry
            .publish(&request, &auth)
            .await
            .map_err(|e| {
                StageFailure::remote(Stage::RegistryPublish, FailureKind::RegistryPublishFailed, &e)
            })?;
        info!(package = %self.package, version = %version, tag = %dist_tag, "Package published");

        let reconciliation = match state.reconciliation_target(version, prerelease) {
            None => Reconciliation::NotNeeded,
            Some(latest) => {
                match self
                    .registry
                    .set_dist_tag(&self.package, latest, &DistTag::latest(), &auth)
                    .await
                {
                    Ok(()) => {
                        info!(package = %self.package, latest = %latest, "Restored latest after backport");
                        Reconciliation::Reassigned {
                            latest: latest.clone(),
                        }
                    }
                    Err(e) => {
                        warn!(
                            package = %self.package,
                            latest = %latest,
                            error = %e,
                            "Could not restore latest after backport"
                        );
                        Reconciliation::Failed {
                            latest: latest.clone(),
                            failure: StageFailure::remote(
                                Stage::RegistryPublish,
                                FailureKind::DistTagReconciliationFailed,
                                &e,
                            ),
                        }
                    }
                }
            }
        };

        Ok(PublishReport {
            version: version.clone(),
            dist_tag,
            previous_latest: state.current_latest,
            reconciliation,
        })
    }
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
