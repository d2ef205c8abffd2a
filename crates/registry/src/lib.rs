//! release-relay package registry adapter.
//!
//! Implements the registry-facing ports defined in the [`pipeline`] crate:
//!
//! | Type                   | Port                                 |
//! |------------------------|--------------------------------------|
//! | [`NpmRegistry`]        | [`pipeline::PackageRegistry`]        |
//! | [`FileCredentialStore`]| [`pipeline::CredentialStore`]        |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The publish document format, tarball hashing, dist-tag
//! endpoints and the on-disk credential file live here. The [`pipeline`]
//! crate sees only the port traits.

pub mod credentials;
pub mod npm;

pub use credentials::FileCredentialStore;
pub use npm::{NpmRegistry, NpmRegistryConfig, DEFAULT_REGISTRY_URL};
