mod helpers;

use std::io::{Cursor, Read};

use filestore_core::{ErrorCode, ErrorKind, ScanStatus, UploadStatus};
use filestore_storage::TransportOp;
use helpers::{read_all, setup};

fn entries_of(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).expect("Invalid archive");
    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).expect("Missing entry");
        let mut data = Vec::new();
        file.read_to_end(&mut data).expect("Unreadable entry");
        entries.push((file.name().to_string(), data));
    }
    entries.sort();
    entries
}

#[tokio::test]
async fn test_bulk_download_dedupes_and_reports_archive_size() {
    let ctx = setup();
    ctx.seed("a", "alpha.txt", b"first file", Some("clean")).await;
    ctx.seed("b", "beta.bin", b"\x00\x01\x02second", Some("clean")).await;

    let ids = vec!["a".to_string(), "a".to_string(), "b".to_string()];
    let bundle = ctx.service.download_bulk(&ids, "out.zip").await.unwrap();
    let (metadata, stream) = bundle.into_parts();
    let archive = read_all(stream).await;

    assert_eq!(metadata.name, "out.zip");
    assert_eq!(metadata.content_type, "application/zip");
    assert_eq!(metadata.size_in_bytes, archive.len() as i64);
    assert_eq!(metadata.scan_status, ScanStatus::NotAssignable);
    assert_eq!(metadata.upload_status, UploadStatus::Completed);

    assert_eq!(
        entries_of(&archive),
        vec![
            ("alpha.txt".to_string(), b"first file".to_vec()),
            ("beta.bin".to_string(), b"\x00\x01\x02second".to_vec()),
        ]
    );
    assert_eq!(ctx.transport.calls(TransportOp::Get).await, 2);
}

#[tokio::test]
async fn test_bulk_download_is_not_persisted() {
    let ctx = setup();
    ctx.seed("a", "alpha.txt", b"a", Some("clean")).await;

    let bundle = ctx
        .service
        .download_bulk(&["a".to_string()], "out.zip")
        .await
        .unwrap();
    assert!(ctx.metadata.get(&bundle.metadata.resource_id).await.is_none());
    assert_eq!(ctx.metadata.len().await, 1);
}

#[tokio::test]
async fn test_bulk_download_rejects_non_zip_output_without_reads() {
    let ctx = setup();
    ctx.seed("a", "alpha.txt", b"a", Some("clean")).await;

    let err = ctx
        .service
        .download_bulk(&["a".to_string()], "out.txt")
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(err.to_string().contains("Unsupported package-type"));
    assert_eq!(ctx.transport.calls(TransportOp::GetTags).await, 0);
    assert_eq!(ctx.transport.calls(TransportOp::Head).await, 0);
    assert_eq!(ctx.transport.calls(TransportOp::Get).await, 0);
}

#[tokio::test]
async fn test_bulk_download_aborts_on_infected_member() {
    let ctx = setup();
    ctx.seed("a", "alpha.txt", b"a", Some("clean")).await;
    ctx.seed("b", "beta.txt", b"b", Some("infected")).await;

    let err = ctx
        .service
        .download_bulk(&["a".to_string(), "b".to_string()], "out.zip")
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.code(), Some(ErrorCode::StatusInfected));
}

#[tokio::test]
async fn test_bulk_download_with_unknown_id_is_not_found() {
    let ctx = setup();
    ctx.seed("a", "alpha.txt", b"a", Some("clean")).await;

    let err = ctx
        .service
        .download_bulk(&["a".to_string(), "ghost".to_string()], "out.zip")
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(ctx.transport.calls(TransportOp::Get).await, 0);
}

#[tokio::test]
async fn test_bulk_download_keeps_colliding_names_apart() {
    let ctx = setup();
    ctx.seed("a", "same.txt", b"one", Some("clean")).await;
    ctx.seed("b", "../same.txt", b"two", Some("clean")).await;

    let bundle = ctx
        .service
        .download_bulk(&["a".to_string(), "b".to_string()], "out.zip")
        .await
        .unwrap();
    let archive = read_all(bundle.stream).await;

    assert_eq!(
        entries_of(&archive),
        vec![
            ("b_same.txt".to_string(), b"two".to_vec()),
            ("same.txt".to_string(), b"one".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_bulk_download_prefixed_name_never_duplicates_stored_name() {
    let ctx = setup();
    ctx.seed("a", "same.txt", b"one", Some("clean")).await;
    ctx.seed("c", "b_same.txt", b"three", Some("clean")).await;
    ctx.seed("b", "same.txt", b"two", Some("clean")).await;

    let ids = vec!["a".to_string(), "c".to_string(), "b".to_string()];
    let bundle = ctx.service.download_bulk(&ids, "out.zip").await.unwrap();
    let archive = read_all(bundle.stream).await;

    assert_eq!(
        entries_of(&archive),
        vec![
            ("b_1_same.txt".to_string(), b"two".to_vec()),
            ("b_same.txt".to_string(), b"three".to_vec()),
            ("same.txt".to_string(), b"one".to_vec()),
        ]
    );
}
