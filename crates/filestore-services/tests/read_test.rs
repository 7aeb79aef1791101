mod helpers;

use std::collections::HashMap;
use std::time::Duration;

use filestore_core::constants::{AV_STATUS, AV_TIMESTAMP};
use filestore_core::{ErrorCode, ErrorKind, ResourcePatch, ScanStatus};
use filestore_storage::TransportOp;
use helpers::{read_all, setup, BUCKET};

#[tokio::test]
async fn test_download_clean_resource() {
    let ctx = setup();
    ctx.seed("r1", "report.pdf", b"%PDF-1.4", Some("clean")).await;

    let file = ctx.service.download("r1").await.unwrap();
    let (metadata, stream) = file.into_parts();
    assert_eq!(metadata.name, "report.pdf");
    assert_eq!(read_all(stream).await, b"%PDF-1.4".to_vec());
}

#[tokio::test]
async fn test_download_unknown_resource_is_not_found() {
    let ctx = setup();
    let err = ctx.service.download("missing").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_download_without_verdict_is_rejected() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", None).await;

    let err = ctx.service.download("r1").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.code(), Some(ErrorCode::StatusAbsent));
    assert_eq!(ctx.transport.calls(TransportOp::Get).await, 0);
}

#[tokio::test]
async fn test_infected_resource_is_rejected_on_every_entry_point() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", Some("Infected")).await;

    let download = ctx.service.download("r1").await.err().unwrap();
    assert_eq!(download.code(), Some(ErrorCode::StatusInfected));

    let presign = ctx
        .service
        .presign("r1", None, &HashMap::new(), false)
        .await
        .unwrap_err();
    assert_eq!(presign.kind(), ErrorKind::BadRequest);
    assert_eq!(presign.code(), Some(ErrorCode::StatusInfected));

    assert_eq!(ctx.transport.calls(TransportOp::Get).await, 0);
    assert_eq!(ctx.transport.calls(TransportOp::Presign).await, 0);
}

#[tokio::test]
async fn test_legacy_header_verdict_allows_download() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", None).await;
    ctx.transport
        .set_header(BUCKET, &ctx.object_path("r1"), AV_STATUS, "clean")
        .await;

    assert!(ctx.service.download("r1").await.is_ok());
}

#[tokio::test]
async fn test_presign_uses_default_or_given_expiry() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", Some("clean")).await;

    let url = ctx
        .service
        .presign("r1", None, &HashMap::new(), false)
        .await
        .unwrap();
    assert!(url.contains("X-Amz-Expires=3600"));

    let mut params = HashMap::new();
    params.insert(
        "response-content-disposition".to_string(),
        "attachment".to_string(),
    );
    let url = ctx
        .service
        .presign("r1", Some(Duration::from_secs(60)), &params, false)
        .await
        .unwrap();
    assert!(url.contains("X-Amz-Expires=60"));
    assert!(url.contains("response-content-disposition=attachment"));
}

#[tokio::test]
async fn test_presign_bypass_skips_scan_gate() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", None).await;

    let url = ctx
        .service
        .presign("r1", None, &HashMap::new(), true)
        .await
        .unwrap();
    assert!(url.starts_with("memory://files/images/r1"));
    assert_eq!(ctx.transport.calls(TransportOp::GetTags).await, 0);
}

#[tokio::test]
async fn test_fetch_for_scan_reads_unverified_resource() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"payload", None).await;

    let file = ctx.service.fetch_for_scan("r1").await.unwrap();
    assert_eq!(read_all(file.stream).await, b"payload".to_vec());
}

#[tokio::test]
async fn test_patch_changes_only_name() {
    let ctx = setup();
    let original = ctx.seed("r1", "old.txt", b"a", Some("clean")).await;

    let patched = ctx
        .service
        .patch("r1", ResourcePatch::rename("new.txt"))
        .await
        .unwrap();

    assert_eq!(patched.name, "new.txt");
    assert!(patched.updated_on > original.updated_on);

    let mut expected = original.clone();
    expected.name = "new.txt".to_string();
    expected.updated_on = patched.updated_on;
    assert_eq!(patched, expected);
}

#[tokio::test]
async fn test_empty_patch_only_touches_updated_on() {
    let ctx = setup();
    let original = ctx.seed("r1", "keep.txt", b"a", Some("clean")).await;

    let patched = ctx
        .service
        .patch("r1", ResourcePatch::default())
        .await
        .unwrap();
    assert_eq!(patched.name, "keep.txt");
    assert!(patched.updated_on > original.updated_on);
}

#[tokio::test]
async fn test_processed_scan_status_only_reenters_queue() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", None).await;

    ctx.service
        .update_scan_status("r1", ScanStatus::Clean)
        .await
        .unwrap();
    let err = ctx
        .service
        .update_scan_status("r1", ScanStatus::Infected)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    ctx.service
        .update_scan_status("r1", ScanStatus::ScanningQueued)
        .await
        .unwrap();
    ctx.service
        .update_scan_status("r1", ScanStatus::Infected)
        .await
        .unwrap();
    assert_eq!(
        ctx.metadata.get("r1").await.unwrap().scan_status,
        ScanStatus::Infected
    );
}

#[tokio::test]
async fn test_record_verdict_tags_object_and_row() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", None).await;

    ctx.service
        .record_verdict("r1", ScanStatus::Clean)
        .await
        .unwrap();

    let tags = ctx
        .transport
        .object_tags(BUCKET, &ctx.object_path("r1"))
        .await
        .unwrap();
    assert_eq!(tags.get(AV_STATUS).map(String::as_str), Some("clean"));
    assert!(tags.contains_key(AV_TIMESTAMP));
    assert_eq!(
        ctx.metadata.get("r1").await.unwrap().scan_status,
        ScanStatus::Clean
    );
    assert!(ctx.service.download("r1").await.is_ok());

    let err = ctx
        .service
        .record_verdict("r1", ScanStatus::InScanning)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn test_get_metadata_many_reports_all_missing_ids() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", None).await;

    let err = ctx
        .service
        .get_metadata_many(&["r1".to_string(), "x".to_string(), "y".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("x, y"));

    let err = ctx.service.get_metadata_many(&[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}

#[tokio::test]
async fn test_stat_combines_object_and_verdict() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"abcd", Some("clean")).await;
    ctx.service
        .update_scan_status("r1", ScanStatus::Clean)
        .await
        .unwrap();

    let stat = ctx.service.stat("r1").await.unwrap();
    assert_eq!(stat.length, 4);
    assert_eq!(stat.scan_status, ScanStatus::Clean);
    assert!(!stat.etag.is_empty());
}

#[tokio::test]
async fn test_delete_removes_blob_and_row() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", Some("clean")).await;

    ctx.service.delete("r1").await.unwrap();
    assert!(ctx.metadata.get("r1").await.is_none());
    assert!(ctx
        .transport
        .object_bytes(BUCKET, &ctx.object_path("r1"))
        .await
        .is_none());

    let err = ctx.service.delete("r1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_failure_is_reported_as_internal() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", Some("clean")).await;
    ctx.transport
        .fail_next(
            TransportOp::Delete,
            filestore_storage::TransportError::Service("AccessDenied".into()),
            1,
        )
        .await;

    let err = ctx.service.delete("r1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("Unable to delete file"));
    assert!(ctx.metadata.get("r1").await.is_some());
}

#[tokio::test]
async fn test_folder_and_bucket_listing() {
    let ctx = setup();
    ctx.seed("r1", "a.txt", b"a", None).await;
    ctx.seed("r2", "b.txt", b"b", None).await;
    ctx.transport.insert_object(BUCKET, "other/c.txt", "c").await;

    let mut folder = ctx.service.list_folder("/images").await.unwrap();
    folder.sort();
    assert_eq!(folder, vec!["images/r1".to_string(), "images/r2".to_string()]);

    assert_eq!(ctx.service.list_bucket().await.unwrap().len(), 3);
}
