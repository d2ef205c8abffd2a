//! The pipeline executor: one delivery in, one [`PipelineOutcome`] out.
//!
//! The executor verifies and parses the delivery, then runs the stages in
//! order. Every stage returns `Result<_, StageFailure>`; the first `Err`
//! aborts the run, and nothing already done remotely is rolled back. Each
//! stage runs at most once per delivery. Redeliveries are made safe by the
//! stages themselves (hash-guarded writes, create-once credentials).

use std::sync::Arc;

use pipeline::{
    AssetFetcher, ContentApi, CredentialStore, Credentials, FailureKind, PackageName,
    PackageRegistry, PipelineRunId, ProvisionOutcome, Rejection, ReleaseApi, ReleaseEvent,
    RemotePath, RepositoryRef, SignatureVerifier, Stage, StageFailure, TagName, Timestamp,
    VersionString, WebhookDelivery, RELEASE_EVENT,
};
use tracing::{error, field, info, info_span, warn, Instrument, Span};

use crate::{
    CredentialProvisioner, ManifestUpdater, PipelineOutcome, PipelineReport, PipelineState,
    PublishReport, RegistryPublisher, ReleaseMirror, StageOutcome, StageRecord, StageStatus,
    TypeDefinitionSyncer,
};

/// Static configuration of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Repository that receives the manifest update and the mirror release.
    pub mirror: RepositoryRef,
    /// Registry package name.
    pub package: PackageName,
    /// Manifest path in the mirror repository.
    pub manifest_path: RemotePath,
    /// Type-definition path in the mirror repository.
    pub typedef_path: RemotePath,
    /// Asset file name on the upstream release.
    pub typedef_asset: String,
    /// Credentials written to the credential file when it is absent.
    pub credentials: Credentials,
}

/// The collaborators the stages talk to.
#[derive(Clone)]
pub struct Ports {
    /// Repository content API.
    pub content: Arc<dyn ContentApi>,
    /// Release API.
    pub releases: Arc<dyn ReleaseApi>,
    /// Asset downloads.
    pub assets: Arc<dyn AssetFetcher>,
    /// Package registry.
    pub registry: Arc<dyn PackageRegistry>,
    /// Local credential file.
    pub credentials: Arc<dyn CredentialStore>,
}

/// Sequences the stages for one delivery.
#[derive(Clone)]
pub struct PipelineExecutor {
    verifier: SignatureVerifier,
    mirror: RepositoryRef,
    manifest: ManifestUpdater,
    typedef: TypeDefinitionSyncer,
    provisioner: CredentialProvisioner,
    release: ReleaseMirror,
    publisher: RegistryPublisher,
}

impl PipelineExecutor {
    /// Wires the stages from configuration and ports.
    pub fn new(config: PipelineConfig, verifier: SignatureVerifier, ports: Ports) -> Self {
        Self {
            verifier,
            manifest: ManifestUpdater::new(ports.content.clone(), config.manifest_path),
            typedef: TypeDefinitionSyncer::new(
                ports.content,
                ports.assets,
                config.typedef_path,
                config.typedef_asset,
            ),
            provisioner: CredentialProvisioner::new(
                ports.credentials.clone(),
                config.credentials,
            ),
            release: ReleaseMirror::new(ports.releases),
            publisher: RegistryPublisher::new(ports.registry, ports.credentials, config.package),
            mirror: config.mirror,
        }
    }

    /// Handles one webhook delivery end to end.
    pub async fn handle(&self, delivery: &WebhookDelivery) -> PipelineOutcome {
        let run_id = PipelineRunId::new_random();
        let span = info_span!(
            "pipeline_run",
            run_id = %run_id,
            delivery = delivery.delivery_id.as_deref().unwrap_or("-"),
            mirror = %self.mirror,
            tag = field::Empty,
        );
        self.handle_inner(run_id, delivery).instrument(span).await
    }

    async fn handle_inner(
        &self,
        run_id: PipelineRunId,
        delivery: &WebhookDelivery,
    ) -> PipelineOutcome {
        // Received -> Verified
        if let Err(rejection) = self.verifier.verify(delivery) {
            warn!(reason = %rejection, "Delivery rejected");
            return PipelineOutcome::Rejected(rejection);
        }
        if let Some(name) = delivery.event_name.as_deref() {
            if name != RELEASE_EVENT {
                let rejection = Rejection::UnsupportedEvent {
                    reason: format!("event '{name}' is not '{RELEASE_EVENT}'"),
                };
                warn!(reason = %rejection, "Delivery rejected");
                return PipelineOutcome::Rejected(rejection);
            }
        }
        let event = match ReleaseEvent::from_payload(&delivery.body) {
            Ok(event) => event,
            Err(rejection) => {
                warn!(reason = %rejection, "Delivery rejected");
                return PipelineOutcome::Rejected(rejection);
            }
        };
        Span::current().record("tag", event.tag.as_str());
        if let Some(reason) = event.ignore_reason() {
            info!(tag = %event.tag, reason = %reason, "Release ignored");
            return PipelineOutcome::Ignored { reason };
        }

        let mut run = Run::new(run_id, event.tag.clone());
        run.state = PipelineState::Verified;
        info!(tag = %event.tag, prerelease = event.prerelease, "Mirroring release");

        match self.run_stages(&event, &mut run).await {
            Ok(publish) => {
                run.advance(PipelineState::Done);
                let report = run.finish(Some(publish));
                info!(state = ?report.state, "Pipeline completed");
                PipelineOutcome::Completed(report)
            }
            Err(failure) => {
                error!(
                    stage = %failure.stage,
                    kind = %failure.kind,
                    retryable = failure.retry.is_retryable(),
                    detail = %failure.detail,
                    "Pipeline aborted"
                );
                PipelineOutcome::Aborted {
                    report: run.finish(None),
                    failure,
                }
            }
        }
    }

    async fn run_stages(
        &self,
        event: &ReleaseEvent,
        run: &mut Run,
    ) -> Result<PublishReport, StageFailure> {
        let version = VersionString::from_tag(&event.tag).map_err(|e| {
            StageFailure::permanent(
                Stage::VersionDerivation,
                FailureKind::InvalidVersion,
                e.to_string(),
            )
        })?;
        run.version = Some(version.clone());

        // Verified -> ManifestUpdated
        let message = match &event.upstream_name {
            Some(upstream) => format!("Update to {upstream} v{version}"),
            None => format!("Update to v{version}"),
        };
        let manifest = self
            .manifest
            .update_version(&self.mirror, &version, message)
            .await?;
        run.complete(
            Stage::ManifestUpdate,
            format!(
                "version {} -> {version}",
                manifest.previous_version.as_deref().unwrap_or("<none>")
            ),
        );
        run.advance(PipelineState::ManifestUpdated);

        // ManifestUpdated -> TypeDefSynced
        match self
            .typedef
            .sync_type_definition(
                &self.mirror,
                &event.tag,
                &version,
                event.asset_base_url.as_deref(),
            )
            .await?
        {
            StageOutcome::Completed(sha) => {
                run.complete(Stage::TypeDefinitionSync, format!("written as {sha}"));
            }
            StageOutcome::Skipped(reason) => run.skip(Stage::TypeDefinitionSync, reason),
        }
        run.advance(PipelineState::TypeDefSynced);

        // TypeDefSynced -> CredentialsReady
        let provisioned = self.provisioner.ensure_credentials().await?;
        run.complete(
            Stage::CredentialProvisioning,
            match provisioned {
                ProvisionOutcome::Written => "credential file written",
                ProvisionOutcome::AlreadyPresent => "credential file already present",
            },
        );
        run.advance(PipelineState::CredentialsReady);

        // CredentialsReady -> ReleaseCreated
        let release = self.release.create_release(&self.mirror, event).await?;
        run.complete(Stage::ReleaseMirror, format!("release {} created", release.id));
        run.advance(PipelineState::ReleaseCreated);

        // ReleaseCreated -> Published
        let publish = self
            .publisher
            .publish(&version, &release.tarball_url, event.prerelease, manifest.manifest)
            .await?;
        run.complete(
            Stage::RegistryPublish,
            format!("{version} published under {}", publish.dist_tag),
        );
        run.advance(PipelineState::Published);

        Ok(publish)
    }
}

// Mutable progress of one run; frozen into a `PipelineReport` at the end.
struct Run {
    run_id: PipelineRunId,
    tag: TagName,
    version: Option<VersionString>,
    state: PipelineState,
    stages: Vec<StageRecord>,
    started_at: Timestamp,
}

impl Run {
    fn new(run_id: PipelineRunId, tag: TagName) -> Self {
        Self {
            run_id,
            tag,
            version: None,
            state: PipelineState::Received,
            stages: Vec::new(),
            started_at: Timestamp::now(),
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(next > self.state, "state machine only moves forward");
        self.state = next;
    }

    fn complete(&mut self, stage: Stage, detail: impl Into<String>) {
        self.stages.push(StageRecord {
            stage,
            status: StageStatus::Completed {
                detail: detail.into(),
            },
        });
    }

    fn skip(&mut self, stage: Stage, reason: crate::SkipReason) {
        warn!(stage = %stage, reason = %reason, "Stage skipped");
        self.stages.push(StageRecord {
            stage,
            status: StageStatus::Skipped(reason),
        });
    }

    fn finish(self, publish: Option<PublishReport>) -> PipelineReport {
        PipelineReport {
            run_id: self.run_id,
            tag: self.tag,
            version: self.version,
            state: self.state,
            stages: self.stages,
            publish,
            started_at: self.started_at,
            finished_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
