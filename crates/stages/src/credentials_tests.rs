use std::sync::Arc;

use pipeline::{CredentialError, MockCredentialStore};

use super::*;

fn credentials() -> Credentials {
    Credentials {
        registry_token: "dG9rZW4=".to_string(),
        contact_email: "bot@example.com".to_string(),
    }
}

#[tokio::test]
async fn test_store_outcome_is_passed_through() {
    let mut store = MockCredentialStore::new();
    store
        .expect_ensure()
        .times(1)
        .withf(|c| c.contact_email == "bot@example.com")
        .returning(|_| Ok(ProvisionOutcome::AlreadyPresent));

    let provisioner = CredentialProvisioner::new(Arc::new(store), credentials());
    assert_eq!(
        provisioner.ensure_credentials().await.unwrap(),
        ProvisionOutcome::AlreadyPresent
    );
}

#[tokio::test]
async fn test_io_failure_is_credential_io_failed() {
    let mut store = MockCredentialStore::new();
    store.expect_ensure().returning(|_| {
        Err(CredentialError::Io {
            path: "/etc/relay/.npmrc".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
    });

    let provisioner = CredentialProvisioner::new(Arc::new(store), credentials());
    let failure = provisioner.ensure_credentials().await.unwrap_err();

    assert_eq!(failure.kind, FailureKind::CredentialIoFailed);
    assert_eq!(failure.stage, Stage::CredentialProvisioning);
    assert!(failure.detail.contains("/etc/relay/.npmrc"));
}
