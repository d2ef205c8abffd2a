//! Newtype domain identifiers.
//!
//! Every name that flows between stages is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! an [`Owner`] with a [`RepoName`] even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single pipeline execution (one webhook delivery).
///
/// Generated fresh for every delivery; recorded on the run span and in the
/// run report so all activity from a single run can be
/// correlated in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineRunId(Uuid);

impl PipelineRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`PipelineRunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for PipelineRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed (GitHub / registry names)
// ---------------------------------------------------------------------------

string_id! {
    /// The account or organisation that owns a repository (e.g. `"johnmuhl"`).
    Owner
}

string_id! {
    /// A repository name without its owner (e.g. `"electron-prebuilt"`).
    RepoName
}

string_id! {
    /// A Git tag name exactly as published upstream (e.g. `"v3.0.0"`).
    TagName
}

string_id! {
    /// A file path relative to the repository root (e.g. `"package.json"`).
    RemotePath
}

string_id! {
    /// Opaque content hash of a remote file, as reported by the content API.
    ///
    /// Writes are conditioned on this value so that a concurrent change to the
    /// file fails the write instead of being overwritten.
    ContentSha
}

string_id! {
    /// A package name in the registry (e.g. `"electron-prebuilt"` or
    /// `"@scope/name"`).
    PackageName
}

string_id! {
    /// A registry distribution tag (e.g. `"latest"`, `"beta"`).
    DistTag
}

impl DistTag {
    /// The tag normal installs resolve to.
    pub fn latest() -> Self {
        Self("latest".to_string())
    }

    /// The tag prereleases are published under.
    pub fn beta() -> Self {
        Self("beta".to_string())
    }

    /// Returns `true` if this is the `latest` tag.
    pub fn is_latest(&self) -> bool {
        self.0 == "latest"
    }
}

/// A repository coordinate: owner plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Repository owner.
    pub owner: Owner,
    /// Repository name.
    pub repo: RepoName,
}

impl RepositoryRef {
    /// Creates a new [`RepositoryRef`].
    pub fn new(owner: Owner, repo: RepoName) -> Self {
        Self { owner, repo }
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
