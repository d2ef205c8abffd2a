use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap as ServerHeaders, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use super::*;

// Serves `router` on an ephemeral local port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
}

fn auth() -> RegistryAuth {
    RegistryAuth {
        auth: "dG9rZW4=".to_string(),
    }
}

type Requests = Arc<Mutex<Vec<(Option<String>, Value)>>>;

fn authorization(headers: &ServerHeaders) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn registry(url: &str) -> NpmRegistry {
    NpmRegistry::new(NpmRegistryConfig {
        registry_url: url.to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn package(name: &str) -> PackageName {
    PackageName::new(name).unwrap()
}

fn request(manifest: Value) -> PublishRequest {
    PublishRequest {
        package: package("electron-prebuilt"),
        version: VersionString::parse("1.2.0").unwrap(),
        tarball_url: "https://api.github.com/repos/o/r/tarball/v1.2.0".to_string(),
        dist_tag: DistTag::latest(),
        manifest,
    }
}

#[test]
fn test_package_urls() {
    let r = registry(DEFAULT_REGISTRY_URL);
    let name = package("electron-prebuilt");

    assert_eq!(
        r.package_url(&name).as_str(),
        "https://registry.npmjs.org/electron-prebuilt"
    );
    assert_eq!(
        r.tag_url(&name, &DistTag::latest()).as_str(),
        "https://registry.npmjs.org/electron-prebuilt/latest"
    );
    assert_eq!(
        r.dist_tag_url(&name, &DistTag::beta()).as_str(),
        "https://registry.npmjs.org/-/package/electron-prebuilt/dist-tags/beta"
    );
}

#[test]
fn test_scoped_package_is_one_segment() {
    let r = registry("https://npm.example.com/registry/");
    assert_eq!(
        r.package_url(&package("@electron/prebuilt")).as_str(),
        "https://npm.example.com/registry/@electron%2Fprebuilt"
    );
}

#[test]
fn test_invalid_registry_url_is_a_configuration_error() {
    let result = NpmRegistry::new(NpmRegistryConfig {
        registry_url: "registry.npmjs.org".to_string(),
        timeout: Duration::from_secs(1),
    });
    assert!(result.is_err());
}

#[test]
fn test_tarball_digests() {
    let digests = TarballDigests::of(b"package");
    assert_eq!(digests.shasum, "582681c2eae02b3f3d399c0c26d321560f6c567a");
    assert_eq!(
        digests.integrity,
        "sha512-baSbv6lplk3RxzbxKOYcpdxTiKsd8MTis+A+sH/42atj0u0v1arIbDTS0oWZfshbD05M2SlToEnxIPGgmtbw2g=="
    );
}

#[test]
fn test_publish_document_layout() {
    let url = Url::parse(DEFAULT_REGISTRY_URL).unwrap();
    let manifest = json!({
        "name": "electron-prebuilt",
        "version": "1.2.0",
        "description": "Install electron prebuilt binaries",
        "bin": { "electron": "cli.js" }
    });

    let doc = publish_document(&url, &request(manifest), b"package");

    assert_eq!(doc["_id"], "electron-prebuilt");
    assert_eq!(doc["name"], "electron-prebuilt");
    assert_eq!(doc["description"], "Install electron prebuilt binaries");
    assert_eq!(doc["dist-tags"], json!({ "latest": "1.2.0" }));

    let version = &doc["versions"]["1.2.0"];
    assert_eq!(version["_id"], "electron-prebuilt@1.2.0");
    assert_eq!(version["bin"]["electron"], "cli.js");
    assert_eq!(
        version["dist"]["shasum"],
        "582681c2eae02b3f3d399c0c26d321560f6c567a"
    );
    assert_eq!(
        version["dist"]["tarball"],
        "https://registry.npmjs.org/electron-prebuilt/-/electron-prebuilt-1.2.0.tgz"
    );

    let attachment = &doc["_attachments"]["electron-prebuilt-1.2.0.tgz"];
    assert_eq!(attachment["content_type"], "application/octet-stream");
    assert_eq!(attachment["data"], "cGFja2FnZQ==");
    assert_eq!(attachment["length"], 7);
}

#[test]
fn test_publish_document_overrides_stale_manifest_identity() {
    let url = Url::parse(DEFAULT_REGISTRY_URL).unwrap();
    let manifest = json!({ "name": "old-name", "version": "0.0.1" });

    let doc = publish_document(&url, &request(manifest), b"");

    let version = &doc["versions"]["1.2.0"];
    assert_eq!(version["name"], "electron-prebuilt");
    assert_eq!(version["version"], "1.2.0");
    assert_eq!(doc["description"], Value::Null);
}

#[test]
fn test_prerelease_document_uses_requested_tag() {
    let url = Url::parse(DEFAULT_REGISTRY_URL).unwrap();
    let mut req = request(json!({}));
    req.version = VersionString::parse("2.0.0-beta.1").unwrap();
    req.dist_tag = DistTag::beta();

    let doc = publish_document(&url, &req, b"");

    assert_eq!(doc["dist-tags"], json!({ "beta": "2.0.0-beta.1" }));
    assert!(doc["versions"].get("2.0.0-beta.1").is_some());
}

#[tokio::test]
async fn test_unreachable_registry_is_a_retryable_transport_error() {
    let r = registry("http://127.0.0.1:1");
    let auth = RegistryAuth {
        auth: "dG9rZW4=".to_string(),
    };

    let err = r
        .latest_version(&package("electron-prebuilt"), &auth)
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Transport { .. }));
    assert!(err.retry_policy().is_retryable());
}

#[tokio::test]
async fn test_unpublished_package_has_no_latest() {
    let base = serve(Router::new().route(
        "/electron-prebuilt/latest",
        get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))) }),
    ))
    .await;

    let latest = registry(&base)
        .latest_version(&package("electron-prebuilt"), &auth())
        .await
        .unwrap();

    assert_eq!(latest, None);
}

#[tokio::test]
async fn test_latest_is_parsed_as_semver() {
    let base = serve(Router::new().route(
        "/electron-prebuilt/latest",
        get(|| async { Json(json!({ "name": "electron-prebuilt", "version": "3.0.0" })) }),
    ))
    .await;

    let latest = registry(&base)
        .latest_version(&package("electron-prebuilt"), &auth())
        .await
        .unwrap();

    assert_eq!(latest, Some(VersionString::parse("3.0.0").unwrap()));
}

#[tokio::test]
async fn test_unparseable_latest_is_a_decode_error() {
    let base = serve(Router::new().route(
        "/electron-prebuilt/latest",
        get(|| async { Json(json!({ "version": "three" })) }),
    ))
    .await;

    let err = registry(&base)
        .latest_version(&package("electron-prebuilt"), &auth())
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Decode { .. }), "{err:?}");
}

#[tokio::test]
async fn test_registry_outage_is_retryable() {
    let base = serve(Router::new().route(
        "/electron-prebuilt/latest",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error") }),
    ))
    .await;

    let err = registry(&base)
        .latest_version(&package("electron-prebuilt"), &auth())
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Status { status: 500, .. }), "{err:?}");
    assert!(err.retry_policy().is_retryable());
}

#[tokio::test]
async fn test_dist_tag_is_set_with_a_json_string_body() {
    let seen: Requests = Arc::default();
    let recorded = Arc::clone(&seen);
    let base = serve(Router::new().route(
        "/-/package/electron-prebuilt/dist-tags/latest",
        put(move |headers: ServerHeaders, Json(body): Json<Value>| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push((authorization(&headers), body));
                Json(json!({ "ok": true }))
            }
        }),
    ))
    .await;

    registry(&base)
        .set_dist_tag(
            &package("electron-prebuilt"),
            &VersionString::parse("3.0.0").unwrap(),
            &DistTag::latest(),
            &auth(),
        )
        .await
        .unwrap();

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.as_deref(), Some("Basic dG9rZW4="));
    assert_eq!(requests[0].1, json!("3.0.0"));
}

#[tokio::test]
async fn test_publish_uploads_downloaded_tarball() {
    let seen: Requests = Arc::default();
    let recorded = Arc::clone(&seen);
    let router = Router::new()
        .route("/tarball/v1.2.0", get(|| async { "package" }))
        .route(
            "/electron-prebuilt",
            put(move |headers: ServerHeaders, Json(body): Json<Value>| {
                let recorded = Arc::clone(&recorded);
                async move {
                    recorded.lock().unwrap().push((authorization(&headers), body));
                    Json(json!({ "success": true }))
                }
            }),
        );
    let base = serve(router).await;
    let mut req = request(json!({ "name": "electron-prebuilt", "version": "1.2.0" }));
    req.tarball_url = format!("{base}/tarball/v1.2.0");

    registry(&base).publish(&req, &auth()).await.unwrap();

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth_header, doc) = &requests[0];
    assert_eq!(auth_header.as_deref(), Some("Basic dG9rZW4="));
    assert_eq!(doc["dist-tags"], json!({ "latest": "1.2.0" }));
    assert_eq!(
        doc["_attachments"]["electron-prebuilt-1.2.0.tgz"]["data"],
        "cGFja2FnZQ=="
    );
    assert_eq!(
        doc["versions"]["1.2.0"]["dist"]["shasum"],
        "582681c2eae02b3f3d399c0c26d321560f6c567a"
    );
}

#[tokio::test]
async fn test_missing_tarball_fails_before_upload() {
    let seen: Requests = Arc::default();
    let recorded = Arc::clone(&seen);
    let router = Router::new().route(
        "/electron-prebuilt",
        put(move |Json(body): Json<Value>| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push((None, body));
                Json(json!({ "success": true }))
            }
        }),
    );
    let base = serve(router).await;
    let mut req = request(json!({}));
    req.tarball_url = format!("{base}/tarball/v1.2.0");

    let err = registry(&base).publish(&req, &auth()).await.unwrap_err();

    assert!(err.is_not_found(), "{err:?}");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_republishing_a_version_is_not_retryable() {
    let router = Router::new()
        .route("/tarball/v1.2.0", get(|| async { "package" }))
        .route(
            "/electron-prebuilt",
            put(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({
                        "error": "You cannot publish over the previously published versions: 1.2.0."
                    })),
                )
            }),
        );
    let base = serve(router).await;
    let mut req = request(json!({}));
    req.tarball_url = format!("{base}/tarball/v1.2.0");

    let err = registry(&base).publish(&req, &auth()).await.unwrap_err();

    assert!(
        matches!(err, RemoteError::Unauthorized { status: 403, ref message, .. }
            if message.contains("previously published")),
        "{err:?}"
    );
    assert!(!err.retry_policy().is_retryable());
}
