//! Core domain for release-relay.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, error type, and port trait used by the release pipeline.
//! Infrastructure crates implement the traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no network or
//! filesystem I/O. It defines *what* is needed; infrastructure crates define
//! *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype names (`Owner`, `TagName`, `ContentSha`, ...) |
//! | [`types`] | Value types (`VersionString`, `RemoteFile`, `DistTagState`, ...) |
//! | [`event`] | Webhook deliveries and release-event parsing |
//! | [`signature`] | HMAC webhook signature verification |
//! | [`errors`] | Error taxonomy and retry policy |
//! | [`ports`] | Traits implemented by infrastructure crates |

pub mod errors;
pub mod event;
pub mod identifiers;
pub mod ports;
pub mod signature;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{
    ConfigurationError, CredentialError, FailureKind, Rejection, RemoteError, RetryPolicy, Stage,
    StageFailure,
};
pub use event::{ReleaseAction, ReleaseEvent, WebhookDelivery, RELEASE_EVENT};
pub use identifiers::{
    ContentSha, DistTag, Owner, PackageName, PipelineRunId, RemotePath, RepoName, RepositoryRef,
    TagName,
};
pub use ports::{
    AssetFetcher, ContentApi, CredentialStore, PackageRegistry, ProvisionOutcome, ReleaseApi,
};
pub use signature::{SignatureVerifier, Verification};
pub use types::{
    Credentials, DistTagState, FileUpdate, NewRelease, PublishRequest, RegistryAuth,
    ReleaseRecord, RemoteFile, Timestamp, VersionError, VersionString,
};

#[cfg(feature = "mocks")]
pub use ports::{
    MockAssetFetcher, MockContentApi, MockCredentialStore, MockPackageRegistry, MockReleaseApi,
};
