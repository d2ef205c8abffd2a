use std::sync::Arc;

use mockall::Sequence;
use pipeline::{
    CredentialError, MockCredentialStore, MockPackageRegistry, RegistryAuth, RemoteError,
};
use serde_json::json;

use super::*;

const TARBALL: &str = "https://api.github.com/repos/johnmuhl/electron-prebuilt/tarball/v1.9.0";

fn version(s: &str) -> VersionString {
    VersionString::parse(s).unwrap()
}

fn credentials() -> MockCredentialStore {
    let mut store = MockCredentialStore::new();
    store.expect_load().returning(|| {
        Ok(RegistryAuth {
            auth: "dXNlcjpwYXNz".to_string(),
        })
    });
    store
}

fn publisher(registry: MockPackageRegistry, store: MockCredentialStore) -> RegistryPublisher {
    RegistryPublisher::new(
        Arc::new(registry),
        Arc::new(store),
        PackageName::new("electron-prebuilt").unwrap(),
    )
}

fn registry_with_latest(latest: Option<&'static str>) -> MockPackageRegistry {
    let mut registry = MockPackageRegistry::new();
    registry
        .expect_latest_version()
        .returning(move |_, _| Ok(latest.map(version)));
    registry
}

#[tokio::test]
async fn test_backport_resets_latest_to_previous_version() {
    let mut seq = Sequence::new();
    let mut registry = MockPackageRegistry::new();
    registry
        .expect_latest_version()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Some(version("2.0.0"))));
    registry
        .expect_publish()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|request, _| {
            request.dist_tag.is_latest()
                && request.version == version("1.9.0")
                && request.tarball_url == TARBALL
        })
        .returning(|_, _| Ok(()));
    registry
        .expect_set_dist_tag()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|package, v, tag, _| {
            package.as_str() == "electron-prebuilt" && *v == version("2.0.0") && tag.is_latest()
        })
        .returning(|_, _, _, _| Ok(()));

    let report = publisher(registry, credentials())
        .publish(&version("1.9.0"), TARBALL, false, json!({"name": "electron-prebuilt"}))
        .await
        .unwrap();

    assert_eq!(
        report.reconciliation,
        Reconciliation::Reassigned {
            latest: version("2.0.0")
        }
    );
    assert_eq!(report.previous_latest, Some(version("2.0.0")));
}

#[tokio::test]
async fn test_newer_version_does_not_touch_latest() {
    let mut registry = registry_with_latest(Some("2.0.0"));
    registry.expect_publish().times(1).returning(|_, _| Ok(()));
    registry.expect_set_dist_tag().never();

    let report = publisher(registry, credentials())
        .publish(&version("2.1.0"), TARBALL, false, json!({}))
        .await
        .unwrap();

    assert_eq!(report.reconciliation, Reconciliation::NotNeeded);
    assert_eq!(report.dist_tag, DistTag::latest());
}

#[tokio::test]
async fn test_prerelease_goes_to_beta_without_reconciliation() {
    let mut registry = registry_with_latest(Some("2.0.0"));
    registry
        .expect_publish()
        .times(1)
        .withf(|request, _| request.dist_tag == DistTag::beta())
        .returning(|_, _| Ok(()));
    registry.expect_set_dist_tag().never();

    let report = publisher(registry, credentials())
        .publish(&version("1.9.0-beta.2"), TARBALL, true, json!({}))
        .await
        .unwrap();

    assert_eq!(report.dist_tag, DistTag::beta());
    assert_eq!(report.reconciliation, Reconciliation::NotNeeded);
}

#[tokio::test]
async fn test_failed_reconciliation_is_reported_but_not_fatal() {
    let mut registry = registry_with_latest(Some("2.0.0"));
    registry.expect_publish().returning(|_, _| Ok(()));
    registry.expect_set_dist_tag().returning(|_, _, _, _| {
        Err(RemoteError::Status {
            status: 500,
            resource: "dist-tags".to_string(),
            message: "oops".to_string(),
            retry_after: None,
        })
    });

    let report = publisher(registry, credentials())
        .publish(&version("1.9.0"), TARBALL, false, json!({}))
        .await
        .unwrap();

    match report.reconciliation {
        Reconciliation::Failed { latest, failure } => {
            assert_eq!(latest, version("2.0.0"));
            assert_eq!(failure.kind, FailureKind::DistTagReconciliationFailed);
        }
        other => panic!("expected failed reconciliation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_query_failure_aborts_before_publish() {
    let mut registry = MockPackageRegistry::new();
    registry.expect_latest_version().returning(|_, _| {
        Err(RemoteError::Timeout {
            resource: "registry".to_string(),
        })
    });
    registry.expect_publish().never();

    let failure = publisher(registry, credentials())
        .publish(&version("1.0.0"), TARBALL, false, json!({}))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::RegistryQueryFailed);
}

#[tokio::test]
async fn test_publish_failure_is_fatal() {
    let mut registry = registry_with_latest(None);
    registry.expect_publish().returning(|_, _| {
        Err(RemoteError::Unauthorized {
            status: 401,
            resource: "registry".to_string(),
            message: "unauthorized".to_string(),
        })
    });
    registry.expect_set_dist_tag().never();

    let failure = publisher(registry, credentials())
        .publish(&version("1.0.0"), TARBALL, false, json!({}))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::RegistryPublishFailed);
}

#[tokio::test]
async fn test_missing_credentials_fail_before_any_registry_call() {
    let mut store = MockCredentialStore::new();
    store.expect_load().returning(|| {
        Err(CredentialError::Malformed {
            path: ".npmrc".to_string(),
            reason: "no _auth entry".to_string(),
        })
    });
    let mut registry = MockPackageRegistry::new();
    registry.expect_latest_version().never();
    registry.expect_publish().never();

    let failure = publisher(registry, store)
        .publish(&version("1.0.0"), TARBALL, false, json!({}))
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::RegistryConfigFailed);
}
