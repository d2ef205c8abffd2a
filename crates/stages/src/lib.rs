//! release-relay pipeline stages and executor.
//!
//! One module per stage, in execution order:
//!
//! | Module | Stage | Effect |
//! |--------|-------|--------|
//! | [`manifest`] | `ManifestUpdater` | Sets `version` in the mirror's manifest |
//! | [`typedef`] | `TypeDefinitionSyncer` | Mirrors the type-definition asset, or skips on 404 |
//! | [`credentials`] | `CredentialProvisioner` | Writes the registry credential file once |
//! | [`release`] | `ReleaseMirror` | Creates the mirror release record |
//! | [`publish`] | `RegistryPublisher` | Publishes and reconciles `latest` |
//!
//! [`executor`] holds the `PipelineExecutor` that verifies a delivery and
//! drives the stages; [`outcome`] holds the result types it produces.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls against the port traits in
//! the [`pipeline`] crate. They never touch HTTP or the filesystem directly.

pub mod credentials;
pub mod executor;
pub mod manifest;
pub mod outcome;
pub mod publish;
pub mod release;
pub mod typedef;

pub use credentials::CredentialProvisioner;
pub use executor::{PipelineConfig, PipelineExecutor, Ports};
pub use manifest::{ManifestUpdate, ManifestUpdater};
pub use outcome::{
    PipelineOutcome, PipelineReport, PipelineState, PublishReport, Reconciliation, SkipReason,
    StageOutcome, StageRecord, StageStatus,
};
pub use publish::RegistryPublisher;
pub use release::ReleaseMirror;
pub use typedef::TypeDefinitionSyncer;
