//! One-time provisioning of the registry credential file.

use std::sync::Arc;

use pipeline::{
    CredentialStore, Credentials, FailureKind, ProvisionOutcome, RetryPolicy, Stage, StageFailure,
};
use tracing::info;

/// Ensures the credential file exists, writing it only if absent.
///
/// An existing file is never overwritten, even when the configured token or
/// email has changed since it was written.
#[derive(Clone)]
pub struct CredentialProvisioner {
    store: Arc<dyn CredentialStore>,
    credentials: Credentials,
}

impl CredentialProvisioner {
    pub fn new(store: Arc<dyn CredentialStore>, credentials: Credentials) -> Self {
        Self { store, credentials }
    }

    pub async fn ensure_credentials(&self) -> Result<ProvisionOutcome, StageFailure> {
        let outcome = self
            .store
            .ensure(&self.credentials)
            .await
            .map_err(|e| StageFailure {
                stage: Stage::CredentialProvisioning,
                kind: FailureKind::CredentialIoFailed,
                detail: e.to_string(),
                // A full disk or a permissions fix can make a redelivery succeed.
                retry: RetryPolicy::Retryable { after: None },
            })?;

        match outcome {
            ProvisionOutcome::Written => info!("Registry credentials written"),
            ProvisionOutcome::AlreadyPresent => info!("Registry credentials already present"),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
