//! File-backed registry credential store.
//!
//! The credential file is written at most once. Existence check and write form
//! one critical section:
//!
//! - inside the process, an async mutex serialises callers sharing the store;
//! - across processes, the content is first written to a uniquely named
//!   temporary file beside the target and then hard-linked into place. Linking
//!   fails if the target exists, so a reader never sees a partial file and an
//!   existing file is never replaced.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{CredentialError, CredentialStore, Credentials, ProvisionOutcome, RegistryAuth};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Stores registry credentials in an npmrc-style file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credentials".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }

    async fn write_new(&self, contents: &str) -> Result<ProvisionOutcome, CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let temp = self.temp_path();
        let written = write_private(&temp, contents).await;
        let linked = match written {
            Ok(()) => tokio::fs::hard_link(&temp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = tokio::fs::remove_file(&temp).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %temp.display(), error = %e, "Could not remove temporary credential file");
            }
        }

        match linked {
            Ok(()) => Ok(ProvisionOutcome::Written),
            // Another process won the race; its file is complete.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(ProvisionOutcome::AlreadyPresent),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

async fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await
}

/// Extracts the `_auth` entry from npmrc-style content.
pub fn parse_auth(contents: &str) -> Option<String> {
    contents
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == "_auth")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn ensure(&self, credentials: &Credentials) -> Result<ProvisionOutcome, CredentialError> {
        let _guard = self.lock.lock().await;

        match tokio::fs::metadata(&self.path).await {
            Ok(_) => {
                debug!(path = %self.path.display(), "Credential file exists; leaving it untouched");
                return Ok(ProvisionOutcome::AlreadyPresent);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error(e)),
        }

        self.write_new(&credentials.to_file_contents()).await
    }

    async fn load(&self) -> Result<RegistryAuth, CredentialError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let auth = parse_auth(&contents).ok_or_else(|| CredentialError::Malformed {
            path: self.path.display().to_string(),
            reason: "no _auth entry".to_string(),
        })?;
        Ok(RegistryAuth { auth })
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
