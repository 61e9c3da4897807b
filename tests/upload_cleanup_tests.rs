use schemaform::uploads::{DiskUploadStore, UploadStore};
use schemaform::SchemaError;
use std::time::Duration;

async fn seed(root: &std::path::Path) {
    tokio::fs::write(root.join("loose"), b"12345").await.expect("write file");
    let nested = root.join("chunked");
    tokio::fs::create_dir_all(&nested).await.expect("create dir");
    tokio::fs::write(nested.join("part"), b"abc").await.expect("write part");
}

#[tokio::test]
async fn test_dry_run_reports_without_deleting() {
    let dir = tempfile::tempdir().expect("temp dir");
    seed(dir.path()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let store = DiskUploadStore::new(dir.path(), 1024);
    let report = store.clean_stale(Duration::ZERO, true).await.expect("dry run");

    assert!(report.dry_run);
    assert_eq!(report.removed, vec![dir.path().join("chunked"), dir.path().join("loose")]);
    assert_eq!(report.bytes_freed, 8);
    assert!(dir.path().join("loose").exists());
    assert!(dir.path().join("chunked").join("part").exists());

    let report = store.clean_stale(Duration::ZERO, false).await.expect("clean");
    assert!(!report.dry_run);
    assert_eq!(report.removed.len(), 2);
    assert!(!dir.path().join("loose").exists());
    assert!(!dir.path().join("chunked").exists());
}

#[tokio::test]
async fn test_recent_uploads_are_kept() {
    let dir = tempfile::tempdir().expect("temp dir");
    seed(dir.path()).await;

    let store = DiskUploadStore::new(dir.path(), 1024);
    let report = store
        .clean_stale(Duration::from_secs(3600), false)
        .await
        .expect("clean");

    assert!(report.removed.is_empty());
    assert_eq!(report.kept, 2);
    assert!(dir.path().join("loose").exists());
}

#[tokio::test]
async fn test_missing_root_is_an_empty_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = DiskUploadStore::new(dir.path().join("never-created"), 1024);

    let report = store.clean_stale(Duration::ZERO, false).await.expect("clean");
    assert!(report.removed.is_empty());
    assert_eq!(report.kept, 0);
}

#[test]
fn test_directory_uploads_resolve_to_their_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = DiskUploadStore::new(dir.path(), 4);

    tokio_test::block_on(async {
        seed(dir.path()).await;

        let upload = store.resolve("chunked").await.expect("resolve");
        assert_eq!(upload.path, dir.path().join("chunked").join("part"));
        assert_eq!(upload.mime_type, "text/plain");
        assert_eq!(upload.size, 3);

        let too_big = store.resolve("loose").await.expect_err("over the limit");
        assert!(matches!(too_big, SchemaError::Upload(_)));

        let missing = store.resolve("absent").await.expect_err("missing");
        assert!(matches!(missing, SchemaError::NotFound(_)));

        let escape = store.resolve("../etc").await.expect_err("invalid key");
        assert!(matches!(escape, SchemaError::Upload(_)));
    });
}
