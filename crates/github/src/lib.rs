//! release-relay GitHub infrastructure adapter.
//!
//! Implements the GitHub-facing ports defined in the [`pipeline`] crate
//! (`ContentApi`, `ReleaseApi`, `AssetFetcher`) over the GitHub REST API with
//! `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules.
//! Authentication, URL layout, base64 transfer encoding, and status-code
//! classification are handled here; the [`pipeline`] crate never sees them.
//!
//! Every request carries the timeout configured in [`GithubClientConfig`]; a
//! timeout surfaces as [`pipeline::RemoteError::Timeout`].

pub mod client;

pub use client::{GithubClient, GithubClientConfig, DEFAULT_API_URL};
