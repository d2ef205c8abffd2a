use std::sync::Arc;

use mockall::predicate::always;
use pipeline::{MockContentApi, Owner, RemoteError, RemoteFile, RepoName};

use super::*;

fn repo() -> RepositoryRef {
    RepositoryRef::new(
        Owner::new("johnmuhl").unwrap(),
        RepoName::new("electron-prebuilt").unwrap(),
    )
}

fn path() -> RemotePath {
    RemotePath::new("package.json").unwrap()
}

fn version(s: &str) -> VersionString {
    VersionString::parse(s).unwrap()
}

fn manifest_file(sha: &str) -> RemoteFile {
    RemoteFile {
        path: path(),
        sha: ContentSha::new(sha).unwrap(),
        content: br#"{"name":"electron-prebuilt","version":"2.9.0","bin":{"electron":"cli.js"}}"#
            .to_vec(),
    }
}

#[test]
fn test_rewrite_version_preserves_key_order_and_other_fields() {
    let rewritten = rewrite_version(&manifest_file("a").content, &version("3.0.0")).unwrap();

    assert_eq!(rewritten.previous_version.as_deref(), Some("2.9.0"));
    let text = String::from_utf8(rewritten.bytes).unwrap();
    assert_eq!(
        text,
        "{\n  \"name\": \"electron-prebuilt\",\n  \"version\": \"3.0.0\",\n  \"bin\": {\n    \"electron\": \"cli.js\"\n  }\n}\n"
    );
}

#[test]
fn test_rewrite_version_adds_missing_field() {
    let rewritten = rewrite_version(br#"{"name":"x"}"#, &version("1.0.0")).unwrap();
    assert_eq!(rewritten.previous_version, None);
    assert_eq!(rewritten.manifest["version"], "1.0.0");
}

#[test]
fn test_rewrite_version_rejects_non_object() {
    assert!(rewrite_version(b"[1,2]", &version("1.0.0")).is_err());
    assert!(rewrite_version(b"{", &version("1.0.0")).is_err());
}

#[tokio::test]
async fn test_update_writes_against_the_sha_that_was_read() {
    let mut content = MockContentApi::new();
    content
        .expect_get_file()
        .times(1)
        .returning(|_, _| Ok(manifest_file("sha-read")));
    content
        .expect_update_file()
        .times(1)
        .withf(|repo, update| {
            repo.to_string() == "johnmuhl/electron-prebuilt"
                && update.path.as_str() == "package.json"
                && update.sha.as_ref().map(ContentSha::as_str) == Some("sha-read")
                && update.message == "Update to electron v3.0.0"
        })
        .returning(|_, _| Ok(ContentSha::new("sha-written").unwrap()));

    let updater = ManifestUpdater::new(Arc::new(content), path());
    let result = updater
        .update_version(&repo(), &version("3.0.0"), "Update to electron v3.0.0".to_string())
        .await
        .unwrap();

    assert_eq!(result.sha.as_str(), "sha-written");
    assert_eq!(result.manifest["version"], "3.0.0");
    assert_eq!(result.previous_version.as_deref(), Some("2.9.0"));
}

#[tokio::test]
async fn test_read_failure_is_reported_as_manifest_read_failed() {
    let mut content = MockContentApi::new();
    content.expect_get_file().returning(|_, _| {
        Err(RemoteError::Timeout {
            resource: "package.json".to_string(),
        })
    });
    content.expect_update_file().never();

    let updater = ManifestUpdater::new(Arc::new(content), path());
    let failure = updater
        .update_version(&repo(), &version("3.0.0"), String::new())
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::ManifestReadFailed);
    assert_eq!(failure.stage, Stage::ManifestUpdate);
    assert!(failure.retry.is_retryable());
}

#[tokio::test]
async fn test_stale_sha_is_reported_as_manifest_write_failed() {
    let mut content = MockContentApi::new();
    content
        .expect_get_file()
        .returning(|_, _| Ok(manifest_file("sha-read")));
    content
        .expect_update_file()
        .with(always(), always())
        .returning(|_, _| {
            Err(RemoteError::Conflict {
                resource: "package.json".to_string(),
                message: "package.json does not match sha-read".to_string(),
            })
        });

    let updater = ManifestUpdater::new(Arc::new(content), path());
    let failure = updater
        .update_version(&repo(), &version("3.0.0"), String::new())
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::ManifestWriteFailed);
}

#[tokio::test]
async fn test_undecodable_manifest_is_a_read_failure() {
    let mut content = MockContentApi::new();
    content.expect_get_file().returning(|_, _| {
        Ok(RemoteFile {
            path: path(),
            sha: ContentSha::new("s").unwrap(),
            content: b"<html>".to_vec(),
        })
    });
    content.expect_update_file().never();

    let updater = ManifestUpdater::new(Arc::new(content), path());
    let failure = updater
        .update_version(&repo(), &version("3.0.0"), String::new())
        .await
        .unwrap_err();

    assert_eq!(failure.kind, FailureKind::ManifestReadFailed);
    assert!(!failure.retry.is_retryable());
}
