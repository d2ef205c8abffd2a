//! Port traits implemented by infrastructure crates.
//!
//! The stages in the `stages` crate see only these traits. The `github`
//! crate implements [`ContentApi`], [`ReleaseApi`] and [`AssetFetcher`]; the
//! `registry` crate implements [`PackageRegistry`] and [`CredentialStore`].
//!
//! Enable the `mocks` feature to get `mockall` implementations
//! (`MockContentApi`, ...) for tests in downstream crates.

use async_trait::async_trait;

use crate::{
    ContentSha, CredentialError, Credentials, DistTag, FileUpdate, NewRelease, PackageName,
    PublishRequest, RegistryAuth, ReleaseRecord, RemoteError, RemoteFile, RemotePath,
    RepositoryRef, VersionString,
};

/// Read and conditionally write repository files.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetches a file and its current content hash.
    ///
    /// Returns [`RemoteError::NotFound`] if the file does not exist.
    async fn get_file(
        &self,
        repo: &RepositoryRef,
        path: &RemotePath,
    ) -> Result<RemoteFile, RemoteError>;

    /// Writes a file, conditioned on `update.sha`.
    ///
    /// A stale hash must fail with [`RemoteError::Conflict`]; the remote never
    /// silently overwrites a file that changed since it was read. Returns the
    /// new content hash.
    async fn update_file(
        &self,
        repo: &RepositoryRef,
        update: &FileUpdate,
    ) -> Result<ContentSha, RemoteError>;
}

/// Create release records.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// Creates a release. A duplicate tag is rejected by the remote.
    async fn create_release(
        &self,
        repo: &RepositoryRef,
        release: &NewRelease,
    ) -> Result<ReleaseRecord, RemoteError>;
}

/// Plain downloads of release assets.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Downloads `url`. A 404 is reported as [`RemoteError::NotFound`].
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RemoteError>;
}

/// What [`CredentialStore::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The file was absent and has been written.
    Written,
    /// The file already existed and was left untouched.
    AlreadyPresent,
}

/// The local registry credential file.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Writes `credentials` if, and only if, no credential file exists.
    ///
    /// Implementations must make the existence check and the write a single
    /// critical section: concurrent callers against an absent file produce
    /// exactly one complete file.
    async fn ensure(&self, credentials: &Credentials) -> Result<ProvisionOutcome, CredentialError>;

    /// Reads the registry authentication back from the credential file.
    async fn load(&self) -> Result<RegistryAuth, CredentialError>;
}

/// An npm-compatible package registry.
#[cfg_attr(feature = "mocks", mockall::automock)]
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Version the `latest` tag points at, or `None` for an unpublished package.
    async fn latest_version(
        &self,
        package: &PackageName,
        auth: &RegistryAuth,
    ) -> Result<Option<VersionString>, RemoteError>;

    /// Publishes one version under `request.dist_tag`.
    async fn publish(&self, request: &PublishRequest, auth: &RegistryAuth)
        -> Result<(), RemoteError>;

    /// Points `tag` at `version`.
    async fn set_dist_tag(
        &self,
        package: &PackageName,
        version: &VersionString,
        tag: &DistTag,
        auth: &RegistryAuth,
    ) -> Result<(), RemoteError>;
}
