//! Stage results, run state, and the outcome of one pipeline invocation.

use pipeline::{
    DistTag, PipelineRunId, Rejection, Stage, StageFailure, TagName, Timestamp, VersionString,
};

/// Result of a stage that did not fail.
///
/// Fatal failures travel as `Err(StageFailure)` beside this type, so every
/// stage returns `Result<StageOutcome<T>, StageFailure>` and the three cases
/// (success, skip, fatal) are always explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The stage did its work.
    Completed(T),
    /// The stage had nothing to do; the pipeline continues.
    Skipped(SkipReason),
}

/// Why a stage was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The release asset does not exist (404). Older releases predate it.
    AssetNotFound {
        /// URL that returned 404.
        url: String,
    },
    /// The delivery did not say where release assets live.
    NoAssetSource,
    /// The remote already holds exactly this content.
    Unchanged,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssetNotFound { url } => write!(f, "asset not found at {url}"),
            Self::NoAssetSource => f.write_str("no asset location in the release event"),
            Self::Unchanged => f.write_str("content unchanged"),
        }
    }
}

/// Position of a run in the linear state machine.
///
/// `Received → Verified → ManifestUpdated → TypeDefSynced → CredentialsReady →
/// ReleaseCreated → Published → Done`. Aborts and ignores are terminal
/// [`PipelineOutcome`]s rather than states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    /// The delivery has been accepted by the listener.
    Received,
    /// The signature matched and the payload is a publishable release.
    Verified,
    /// The manifest carries the new version.
    ManifestUpdated,
    /// Type definitions were mirrored or explicitly skipped.
    TypeDefSynced,
    /// The credential file exists.
    CredentialsReady,
    /// The mirror release exists.
    ReleaseCreated,
    /// The registry holds the new version.
    Published,
    /// All stages finished.
    Done,
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    /// The stage completed; `detail` summarises the effect.
    Completed {
        /// Human-readable effect.
        detail: String,
    },
    /// The stage was skipped.
    Skipped(SkipReason),
}

/// One entry in a run's stage log.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    /// The stage.
    pub stage: Stage,
    /// What it did.
    pub status: StageStatus,
}

/// Whether `latest` had to be moved back after publishing, and how that went.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// `latest` already points at the right version (or this was a prerelease).
    NotNeeded,
    /// `latest` was reassigned to the previous, newer version.
    Reassigned {
        /// Version `latest` points at again.
        latest: VersionString,
    },
    /// Reassignment failed. The publish itself stands.
    Failed {
        /// Version `latest` should point at.
        latest: VersionString,
        /// The failure, with kind `DistTagReconciliationFailed`.
        failure: StageFailure,
    },
}

/// Result of the registry stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    /// Version published.
    pub version: VersionString,
    /// Distribution tag it was published under.
    pub dist_tag: DistTag,
    /// `latest` as observed before publishing.
    pub previous_latest: Option<VersionString>,
    /// Tag fix-up sub-outcome.
    pub reconciliation: Reconciliation,
}

/// Record of one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Correlation id of the run.
    pub run_id: PipelineRunId,
    /// Upstream tag.
    pub tag: TagName,
    /// Version derived from the tag, once derivation succeeded.
    pub version: Option<VersionString>,
    /// Last state reached.
    pub state: PipelineState,
    /// Stages that finished, in order.
    pub stages: Vec<StageRecord>,
    /// Registry outcome, once publishing succeeded.
    pub publish: Option<PublishReport>,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run ended.
    pub finished_at: Timestamp,
}

/// Terminal outcome of a delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Every stage ran; the release is mirrored and published.
    Completed(PipelineReport),
    /// The release is a draft or not a publish; nothing was done.
    Ignored {
        /// Why the release was ignored.
        reason: String,
    },
    /// The delivery was refused before any stage ran.
    Rejected(Rejection),
    /// A stage failed; later stages did not run. Earlier remote changes stand.
    Aborted {
        /// Progress up to the failure.
        report: PipelineReport,
        /// The failure.
        failure: StageFailure,
    },
}

impl PipelineOutcome {
    /// Human-readable summary, used as the HTTP response body.
    pub fn summary(&self) -> String {
        match self {
            Self::Completed(report) => completed_summary(report),
            Self::Ignored { reason } => format!("ignored: {reason}"),
            Self::Rejected(rejection) => rejection.to_string(),
            Self::Aborted { report, failure } => format!(
                "failed to {} for {}: {} ({})",
                failure.stage.operation(),
                report.tag,
                failure.detail,
                failure.kind
            ),
        }
    }
}

fn completed_summary(report: &PipelineReport) -> String {
    let Some(publish) = &report.publish else {
        return format!("Update to {}", report.tag);
    };
    let mut summary = format!(
        "Update to v{version}: published {version} under {tag}",
        version = publish.version,
        tag = publish.dist_tag
    );
    match &publish.reconciliation {
        Reconciliation::NotNeeded => {}
        Reconciliation::Reassigned { latest } => {
            summary.push_str(&format!("; latest reset to {latest}"));
        }
        Reconciliation::Failed { latest, failure } => {
            summary.push_str(&format!(
                "; failed to reset latest to {latest}: {}",
                failure.detail
            ));
        }
    }
    summary
}
