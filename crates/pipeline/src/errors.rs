//! Error taxonomy and retry-policy types for the release pipeline.
//!
//! Three layers of error exist:
//!
//! - [`RemoteError`] and [`CredentialError`] are produced by infrastructure
//!   adapters behind the port traits in [`crate::ports`].
//! - [`StageFailure`] is what a stage reports to the executor when it cannot
//!   complete. It names the failing [`Stage`] and a [`FailureKind`] so that
//!   diagnostics can tell, for example, a manifest read from a manifest write.
//! - [`Rejection`] covers deliveries that never enter the pipeline (bad
//!   signature, unsupported event). Rejections have no side effects.
//!
//! [`RetryPolicy`] is a cross-cutting concern: every failure carries one so
//! the HTTP layer can tell the webhook sender whether redelivery is useful.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is worth retrying and, if so, after what delay.
///
/// The pipeline itself never retries within one delivery. The policy is
/// surfaced so the response status tells the webhook sender whether a
/// redelivery can succeed.
///
/// - `Retryable` errors: timeouts, transport failures, rate limits, 5xx
///   responses, stale content hashes.
/// - `NonRetryable` errors: authentication failures, malformed data, 4xx
///   rejections such as a duplicate release tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means no hint was
        /// given by the remote.
        after: Option<Duration>,
    },
    /// The operation must not be retried without human intervention.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` if the policy allows a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Adapter-level errors
// ---------------------------------------------------------------------------

/// Failure of a call to a remote service (content API, release API, asset
/// host, package registry).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    /// The remote resource does not exist (HTTP 404).
    #[error("not found: {resource}")]
    NotFound {
        /// URL or logical name of the missing resource.
        resource: String,
    },

    /// The write was rejected because the resource changed since it was read
    /// (HTTP 409, or 422 for a stale content hash).
    #[error("conflict on {resource}: {message}")]
    Conflict {
        /// URL or logical name of the resource.
        resource: String,
        /// Message returned by the remote.
        message: String,
    },

    /// The remote refused the supplied credentials (HTTP 401 / 403).
    #[error("unauthorized ({status}) for {resource}: {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// URL or logical name of the resource.
        resource: String,
        /// Message returned by the remote.
        message: String,
    },

    /// Any other non-success status.
    #[error("unexpected status {status} from {resource}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// URL or logical name of the resource.
        resource: String,
        /// Message returned by the remote.
        message: String,
        /// Delay requested by a `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// The call did not complete within the configured timeout.
    #[error("timed out calling {resource}")]
    Timeout {
        /// URL or logical name of the resource.
        resource: String,
    },

    /// Connection-level failure (DNS, TLS, reset).
    #[error("transport error calling {resource}: {message}")]
    Transport {
        /// URL or logical name of the resource.
        resource: String,
        /// Description of the failure.
        message: String,
    },

    /// The response arrived but could not be decoded.
    #[error("could not decode response from {resource}: {message}")]
    Decode {
        /// URL or logical name of the resource.
        resource: String,
        /// Description of the decoding problem.
        message: String,
    },
}

impl RemoteError {
    /// Classifies a non-success HTTP status.
    pub fn from_status(
        status: u16,
        resource: impl Into<String>,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let resource = resource.into();
        let message = message.into();
        match status {
            404 => Self::NotFound { resource },
            409 => Self::Conflict { resource, message },
            401 | 403 => Self::Unauthorized {
                status,
                resource,
                message,
            },
            _ => Self::Status {
                status,
                resource,
                message,
                retry_after,
            },
        }
    }

    /// Classifies a non-success HTTP response from its raw parts.
    ///
    /// `retry_after` is the `Retry-After` header value; only the delta-seconds
    /// form is honoured. The message is the `message` or `error` field of a
    /// JSON body, or the body text itself.
    pub fn from_response(
        status: u16,
        resource: impl Into<String>,
        retry_after: Option<&str>,
        body: &str,
    ) -> Self {
        Self::from_status(
            status,
            resource,
            response_message(body),
            parse_retry_after(retry_after),
        )
    }

    /// A request that produced no response: timed out, or failed in transit.
    pub fn unanswered(
        resource: impl Into<String>,
        timed_out: bool,
        message: impl Into<String>,
    ) -> Self {
        let resource = resource.into();
        if timed_out {
            Self::Timeout { resource }
        } else {
            Self::Transport {
                resource,
                message: message.into(),
            }
        }
    }

    /// Returns `true` for [`RemoteError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Retry policy implied by this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Conflict { .. } | Self::Timeout { .. } | Self::Transport { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Status {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::NotFound { .. }
            | Self::Unauthorized { .. }
            | Self::Status { .. }
            | Self::Decode { .. } => RetryPolicy::NonRetryable,
        }
    }
}

/// Parses a `Retry-After` value given in seconds.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn response_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

/// Failure of the local credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Filesystem operation failed for a reason other than the file being absent.
    #[error("credential file I/O failed for {path}: {source}")]
    Io {
        /// Path of the credential file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The credential file exists but does not contain the expected entries.
    #[error("credential file {path} is malformed: {reason}")]
    Malformed {
        /// Path of the credential file.
        path: String,
        /// What was missing or invalid.
        reason: String,
    },
}

/// An adapter could not be constructed from the supplied configuration.
#[derive(Debug, Error)]
#[error("configuration error: {message}")]
pub struct ConfigurationError {
    /// Description of the configuration problem.
    pub message: String,
}

impl ConfigurationError {
    /// Creates a new [`ConfigurationError`].
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// A step of the release pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Version derivation from the release tag.
    VersionDerivation,
    /// Manifest `version` field rewrite.
    ManifestUpdate,
    /// Type-definition file mirroring.
    TypeDefinitionSync,
    /// Local registry credential provisioning.
    CredentialProvisioning,
    /// Release record creation on the mirror repository.
    ReleaseMirror,
    /// Registry publish and `latest` reconciliation.
    RegistryPublish,
}

impl Stage {
    /// Human-readable operation name used in responses and logs.
    pub fn operation(self) -> &'static str {
        match self {
            Self::VersionDerivation => "derive version",
            Self::ManifestUpdate => "update manifest",
            Self::TypeDefinitionSync => "sync type definitions",
            Self::CredentialProvisioning => "provision credentials",
            Self::ReleaseMirror => "create release",
            Self::RegistryPublish => "publish package",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.operation())
    }
}

/// The category of a stage failure.
///
/// Read and write failures for the same artefact are distinct kinds so that
/// diagnostics never conflate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The release tag is not a semantic version.
    InvalidVersion,
    /// The manifest could not be fetched or decoded.
    ManifestReadFailed,
    /// The rewritten manifest could not be written back.
    ManifestWriteFailed,
    /// The existing type-definition file could not be fetched.
    TypeDefinitionReadFailed,
    /// The downloaded type definitions could not be written.
    TypeDefinitionWriteFailed,
    /// The release asset download failed for a reason other than "not found".
    AssetFetchFailed,
    /// The credential file could not be checked, written, or read.
    CredentialIoFailed,
    /// The mirror release could not be created.
    ReleaseCreationFailed,
    /// Registry client configuration could not be loaded.
    RegistryConfigFailed,
    /// The registry could not be queried for the current `latest` version.
    RegistryQueryFailed,
    /// The package could not be published.
    RegistryPublishFailed,
    /// The `latest` distribution tag could not be reassigned.
    ///
    /// Never aborts the pipeline; reported as a sub-outcome of publishing.
    DistTagReconciliationFailed,
}

impl FailureKind {
    /// Stable snake_case name, as used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidVersion => "invalid_version",
            Self::ManifestReadFailed => "manifest_read_failed",
            Self::ManifestWriteFailed => "manifest_write_failed",
            Self::TypeDefinitionReadFailed => "type_definition_read_failed",
            Self::TypeDefinitionWriteFailed => "type_definition_write_failed",
            Self::AssetFetchFailed => "asset_fetch_failed",
            Self::CredentialIoFailed => "credential_io_failed",
            Self::ReleaseCreationFailed => "release_creation_failed",
            Self::RegistryConfigFailed => "registry_config_failed",
            Self::RegistryQueryFailed => "registry_query_failed",
            Self::RegistryPublishFailed => "registry_publish_failed",
            Self::DistTagReconciliationFailed => "dist_tag_reconciliation_failed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal stage failure. The executor aborts the remaining chain on receipt.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed ({kind}): {detail}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: Stage,
    /// What went wrong.
    pub kind: FailureKind,
    /// Human-readable detail, usually the underlying error message.
    pub detail: String,
    /// Whether a redelivery could succeed.
    pub retry: RetryPolicy,
}

impl StageFailure {
    /// Builds a failure from a [`RemoteError`], inheriting its retry policy.
    pub fn remote(stage: Stage, kind: FailureKind, error: &RemoteError) -> Self {
        Self {
            stage,
            kind,
            detail: error.to_string(),
            retry: error.retry_policy(),
        }
    }

    /// Builds a non-retryable failure with a free-form detail.
    pub fn permanent(stage: Stage, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            detail: detail.into(),
            retry: RetryPolicy::NonRetryable,
        }
    }
}

/// Reasons a delivery is refused before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The signature header is missing, malformed, or does not match the body.
    #[error("signature does not match payload: {reason}")]
    AuthenticationFailed {
        /// Why verification failed.
        reason: String,
    },

    /// The delivery is not a release event or carries no usable release.
    #[error("unsupported event: {reason}")]
    UnsupportedEvent {
        /// What made the event unsupported.
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
