mod common;

use airgap_mirror::error::ErrorKind;
use airgap_mirror::registry::operations::{BlobSource, UploadOutcome};
use airgap_mirror::registry::{AuthHeaders, RegistryFlavor};
use axum::http::Method;
use common::{FakeRegistry, Reply, sha256};

const LAYER: &[u8] = b"layer-bytes-0123456789";

#[tokio::test]
async fn download_verifies_size_and_digest() {
    let fake = FakeRegistry::start().await;
    let digest = sha256(LAYER);
    fake.on(
        Method::GET,
        &format!("/v2/team/app/blobs/{}", digest),
        Reply::ok(LAYER),
    );
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let path = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .download_blob(&digest, Some(LAYER.len() as u64), work.path())
        .await
        .unwrap();
    assert_eq!(path, work.path().join(digest.replace(':', "_")));
    assert_eq!(std::fs::read(&path).unwrap(), LAYER);
}

#[tokio::test]
async fn truncated_download_is_an_integrity_error() {
    let fake = FakeRegistry::start().await;
    let digest = sha256(LAYER);
    fake.on(
        Method::GET,
        &format!("/v2/team/app/blobs/{}", digest),
        Reply::ok(&LAYER[..8]),
    );
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let err = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .download_blob(&digest, Some(LAYER.len() as u64), work.path())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(!work.path().join(digest.replace(':', "_")).exists());
}

#[tokio::test]
async fn oversized_download_is_an_integrity_error() {
    let fake = FakeRegistry::start().await;
    let digest = sha256(LAYER);
    let mut oversized = LAYER.to_vec();
    oversized.extend(std::iter::repeat_n(b'x', 64 * 1024));
    fake.on(
        Method::GET,
        &format!("/v2/team/app/blobs/{}", digest),
        Reply::ok(oversized),
    );
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let err = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .download_blob(&digest, Some(LAYER.len() as u64), work.path())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(err.to_string().contains("exceeds its declared size"));
    assert!(!work.path().join(digest.replace(':', "_")).exists());
}

#[tokio::test]
async fn malformed_digest_is_never_requested() {
    let fake = FakeRegistry::start().await;
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let err = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .download_blob("sha256:../../escape", None, work.path())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn corrupted_download_is_an_integrity_error() {
    let fake = FakeRegistry::start().await;
    let digest = sha256(LAYER);
    let mut corrupted = LAYER.to_vec();
    corrupted[0] ^= 0xff;
    fake.on(
        Method::GET,
        &format!("/v2/team/app/blobs/{}", digest),
        Reply::ok(corrupted),
    );
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let err = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .download_blob(&digest, Some(LAYER.len() as u64), work.path())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
}

#[tokio::test]
async fn existing_blob_is_not_uploaded() {
    let fake = FakeRegistry::start().await;
    let digest = sha256(LAYER);
    fake.on(
        Method::HEAD,
        &format!("/v2/team/app/blobs/{}", digest),
        Reply::ok(""),
    );
    fake.accept_uploads("team/app");
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let outcome = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .upload_blob(BlobSource::Bytes(LAYER.to_vec()), &digest, "application/octet-stream")
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Existing);
    assert_eq!(fake.count(Method::POST), 0);
    assert_eq!(fake.count(Method::PUT), 0);
}

#[tokio::test]
async fn missing_blob_is_uploaded_from_file() {
    let fake = FakeRegistry::start().await;
    let digest = sha256(LAYER);
    fake.accept_uploads("team/app");
    let work = tempfile::tempdir().unwrap();
    let file = work.path().join("layer");
    std::fs::write(&file, LAYER).unwrap();
    let client = common::client(work.path());

    let outcome = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .upload_blob(BlobSource::File(file), &digest, "application/octet-stream")
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::Uploaded);

    assert_eq!(fake.requests_to(Method::POST, "/v2/team/app/blobs/uploads/").len(), 1);
    let puts = fake.requests_to(Method::PUT, "/upload/team/app");
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].query_value("_state"), Some("s"));
    assert_eq!(puts[0].query_value("digest"), Some(digest.as_str()));
    assert_eq!(puts[0].body, LAYER);
}

#[tokio::test]
async fn registry_digest_mismatch_fails_upload() {
    let fake = FakeRegistry::start().await;
    let digest = sha256(LAYER);
    fake.accept_uploads("team/app");
    fake.on(
        Method::PUT,
        "/upload/team/app",
        Reply::status(201).header("Docker-Content-Digest", &sha256(b"something else")),
    );
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let err = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .upload_blob(BlobSource::Bytes(LAYER.to_vec()), &digest, "application/octet-stream")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
}

#[tokio::test]
async fn refused_upload_session_is_a_transport_error() {
    let fake = FakeRegistry::start().await;
    fake.on(Method::POST, "/v2/team/app/blobs/uploads/", Reply::status(500));
    let work = tempfile::tempdir().unwrap();
    let client = common::client(work.path());

    let err = client
        .blobs(&fake.endpoint(RegistryFlavor::Oci), "team/app", &AuthHeaders::Anonymous)
        .upload_blob(BlobSource::Bytes(LAYER.to_vec()), &sha256(LAYER), "application/octet-stream")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(fake.count(Method::PUT), 0);
}
