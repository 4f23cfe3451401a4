mod common;

use bytes::Bytes;
use pdf_merge_backend::models::Principal;
use common::{TestEnv, count_files, page_markers, sample_pdf};
use pdf_merge_backend::services::staging_service::{StagingError, StagingService, UploadCandidate};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn candidate(filename: &str, data: Vec<u8>) -> UploadCandidate {
    UploadCandidate {
        filename: filename.to_string(),
        content_type: Some("application/pdf".to_string()),
        data: Bytes::from(data),
    }
}

fn pdf(filename: &str, label: &str, pages: usize) -> UploadCandidate {
    candidate(filename, sample_pdf(label, pages))
}

#[tokio::test]
async fn test_upload_appends_in_order_and_writes_blobs() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    let staged = staging
        .stage_uploads(&sid, vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 2)])
        .await
        .unwrap();
    assert_eq!(staged.len(), 2);

    let listed = staging.list(&sid).await.unwrap();
    let names: Vec<_> = listed.iter().map(|f| f.display_name.as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    assert_ne!(listed[0].id, listed[1].id);
    assert_ne!(listed[0].storage_key, listed[1].storage_key);
    assert!(listed.iter().all(|f| f.storage_key.starts_with(&sid)));
    assert_eq!(count_files(env.upload_dir()), 2);

    for file in &listed {
        assert!(env.storage.inner.root().join(&file.storage_key).is_file());
    }
}

#[tokio::test]
async fn test_same_display_name_gets_distinct_entries() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging.stage_uploads(&sid, vec![pdf("report.pdf", "x", 1)]).await.unwrap();
    staging.stage_uploads(&sid, vec![pdf("report.pdf", "y", 1)]).await.unwrap();

    let listed = staging.list(&sid).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].display_name, listed[1].display_name);
    assert_ne!(listed[0].storage_key, listed[1].storage_key);
    assert_eq!(count_files(env.upload_dir()), 2);
}

#[tokio::test]
async fn test_disallowed_extension_rejects_whole_batch() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    let err = staging
        .stage_uploads(
            &sid,
            vec![pdf("good.pdf", "g", 1), candidate("notes.txt", b"hello".to_vec())],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StagingError::Validation(_)));
    assert!(staging.list(&sid).await.unwrap().is_empty());
    assert_eq!(count_files(env.upload_dir()), 0);
}

#[tokio::test]
async fn test_extension_check_is_case_insensitive() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;

    let staged = env
        .state
        .staging
        .stage_uploads(&sid, vec![pdf("SCAN.PDF", "s", 1)])
        .await
        .unwrap();
    assert_eq!(staged[0].display_name, "SCAN.PDF");
}

#[tokio::test]
async fn test_empty_batch_and_empty_filename() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    match staging.stage_uploads(&sid, vec![]).await.unwrap_err() {
        StagingError::Validation(msg) => assert_eq!(msg, "No files selected"),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = staging
        .stage_uploads(&sid, vec![pdf("", "a", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, StagingError::Validation(_)));
}

#[tokio::test]
async fn test_non_pdf_content_is_rejected() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;

    let err = env
        .state
        .staging
        .stage_uploads(&sid, vec![candidate("fake.pdf", b"GIF89a not a pdf".to_vec())])
        .await
        .unwrap_err();
    assert!(matches!(err, StagingError::Validation(_)));
    assert_eq!(count_files(env.upload_dir()), 0);
}

#[tokio::test]
async fn test_oversized_file_is_payload_too_large() {
    let env = TestEnv::new().await;
    let mut config = env.config.clone();
    config.max_content_length = 64;
    let staging = StagingService::new(env.storage.clone(), env.sessions.clone(), config);
    let sid = env.open_session("alice").await;

    let err = staging
        .stage_uploads(&sid, vec![pdf("big.pdf", "big", 3)])
        .await
        .unwrap_err();
    assert!(matches!(err, StagingError::PayloadTooLarge(_)));
    assert!(staging.list(&sid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_too_many_files_in_one_batch() {
    let env = TestEnv::new().await;
    let mut config = env.config.clone();
    config.max_files_per_upload = 2;
    let staging = StagingService::new(env.storage.clone(), env.sessions.clone(), config);
    let sid = env.open_session("alice").await;

    let batch = (0..3).map(|i| pdf(&format!("{i}.pdf"), "p", 1)).collect();
    let err = staging.stage_uploads(&sid, batch).await.unwrap_err();
    assert!(matches!(err, StagingError::Validation(_)));
}

#[tokio::test]
async fn test_failed_write_rolls_back_batch() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging.stage_uploads(&sid, vec![pdf("keep.pdf", "k", 1)]).await.unwrap();
    env.storage.fail_uploads_after(1);

    let err = staging
        .stage_uploads(
            &sid,
            vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 1), pdf("c.pdf", "c", 1)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StagingError::UploadFailed(_)));

    let listed = staging.list(&sid).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].display_name, "keep.pdf");
    assert_eq!(count_files(env.upload_dir()), 1);
}

#[tokio::test]
async fn test_remove_deletes_entry_and_blob() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    let staged = staging
        .stage_uploads(&sid, vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 1)])
        .await
        .unwrap();

    let removed = staging.remove_file(&sid, &staged[0].id).await.unwrap();
    assert_eq!(removed.display_name, "a.pdf");

    let listed = staging.list(&sid).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, staged[1].id);
    assert_eq!(count_files(env.upload_dir()), 1);

    let again = staging.remove_file(&sid, &staged[0].id).await.unwrap_err();
    assert!(matches!(again, StagingError::NotFound));
}

#[tokio::test]
async fn test_remove_tolerates_missing_blob() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    let staged = staging.stage_uploads(&sid, vec![pdf("a.pdf", "a", 1)]).await.unwrap();
    std::fs::remove_file(env.storage.inner.root().join(&staged[0].storage_key)).unwrap();

    staging.remove_file(&sid, &staged[0].id).await.unwrap();
    assert!(staging.list(&sid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_cannot_reach_other_sessions() {
    let env = TestEnv::new().await;
    let alice = env.open_session("alice").await;
    let bob = env.open_session("bob").await;
    let staging = &env.state.staging;

    let staged = staging.stage_uploads(&alice, vec![pdf("a.pdf", "a", 1)]).await.unwrap();

    let err = staging.remove_file(&bob, &staged[0].id).await.unwrap_err();
    assert!(matches!(err, StagingError::NotFound));
    assert_eq!(staging.list(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sessions_with_same_filenames_stay_separate() {
    let env = TestEnv::new().await;
    let alice = env.open_session("alice").await;
    let bob = env.open_session("bob").await;
    let staging = &env.state.staging;

    staging.stage_uploads(&alice, vec![pdf("same.pdf", "alice", 1)]).await.unwrap();
    staging.stage_uploads(&bob, vec![pdf("same.pdf", "bob", 2)]).await.unwrap();

    let a = staging.list(&alice).await.unwrap();
    let b = staging.list(&bob).await.unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert_ne!(a[0].storage_key, b[0].storage_key);

    let merged = staging.merge(&alice).await.unwrap();
    assert_eq!(page_markers(&merged.bytes), vec!["alice-page-1"]);
    assert_eq!(staging.list(&bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_clear_empties_ledger_and_disk() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging
        .stage_uploads(&sid, vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 1)])
        .await
        .unwrap();

    assert_eq!(staging.clear(&sid).await.unwrap(), 2);
    assert!(staging.list(&sid).await.unwrap().is_empty());
    assert_eq!(count_files(env.upload_dir()), 0);

    assert_eq!(staging.clear(&sid).await.unwrap(), 0);
}

#[tokio::test]
async fn test_clear_continues_past_delete_failures() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging
        .stage_uploads(&sid, vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 1)])
        .await
        .unwrap();
    env.storage.fail_deletes.store(true, Ordering::SeqCst);

    assert_eq!(staging.clear(&sid).await.unwrap(), 2);
    assert!(staging.list(&sid).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_merge_concatenates_in_ledger_order() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging
        .stage_uploads(&sid, vec![pdf("a.pdf", "a", 2), pdf("b.pdf", "b", 3)])
        .await
        .unwrap();

    let merged = staging.merge(&sid).await.unwrap();
    assert_eq!(merged.page_count, 5);
    assert_eq!(merged.source_count, 2);
    assert_eq!(
        page_markers(&merged.bytes),
        vec!["a-page-1", "a-page-2", "b-page-1", "b-page-2", "b-page-3"]
    );

    assert!(staging.list(&sid).await.unwrap().is_empty());
    assert_eq!(count_files(env.upload_dir()), 0);
}

#[tokio::test]
async fn test_merge_follows_reordered_ledger() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    let staged = staging
        .stage_uploads(
            &sid,
            vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 1), pdf("c.pdf", "c", 1)],
        )
        .await
        .unwrap();

    let order: Vec<String> = staged.iter().rev().map(|f| f.id.clone()).collect();
    let reordered = staging.reorder(&sid, &order).await.unwrap();
    assert_eq!(reordered[0].display_name, "c.pdf");

    let merged = staging.merge(&sid).await.unwrap();
    assert_eq!(
        page_markers(&merged.bytes),
        vec!["c-page-1", "b-page-1", "a-page-1"]
    );
}

#[tokio::test]
async fn test_invalid_reorder_leaves_ledger_unchanged() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    let staged = staging
        .stage_uploads(&sid, vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 1)])
        .await
        .unwrap();
    let ids: Vec<String> = staged.iter().map(|f| f.id.clone()).collect();

    for bad in [
        vec![ids[0].clone()],
        vec![ids[0].clone(), ids[0].clone()],
        vec![ids[0].clone(), "unknown".to_string()],
        vec![ids[1].clone(), ids[0].clone(), "extra".to_string()],
    ] {
        let err = staging.reorder(&sid, &bad).await.unwrap_err();
        assert!(matches!(err, StagingError::Validation(_)));
    }

    let listed: Vec<String> = staging.list(&sid).await.unwrap().into_iter().map(|f| f.id).collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_merge_with_empty_ledger() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;

    match env.state.staging.merge(&sid).await.unwrap_err() {
        StagingError::Validation(msg) => assert_eq!(msg, "No files to merge"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_merge_still_consumes_staged_files() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging
        .stage_uploads(
            &sid,
            vec![
                pdf("good.pdf", "g", 1),
                candidate("broken.pdf", b"%PDF-1.4\nnot really a pdf".to_vec()),
            ],
        )
        .await
        .unwrap();

    let err = staging.merge(&sid).await.unwrap_err();
    assert!(matches!(err, StagingError::MergeFailed(_)));
    assert!(staging.list(&sid).await.unwrap().is_empty());
    assert_eq!(count_files(env.upload_dir()), 0);
}

#[tokio::test]
async fn test_unreadable_blob_fails_merge_and_cleans_up() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging.stage_uploads(&sid, vec![pdf("a.pdf", "a", 1)]).await.unwrap();
    env.storage.fail_reads.store(true, Ordering::SeqCst);

    let err = staging.merge(&sid).await.unwrap_err();
    assert!(matches!(err, StagingError::MergeFailed(_)));
    assert!(staging.list(&sid).await.unwrap().is_empty());
    assert_eq!(count_files(env.upload_dir()), 0);
}

#[tokio::test]
async fn test_close_session_discards_staged_files() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    staging
        .stage_uploads(&sid, vec![pdf("a.pdf", "a", 1), pdf("b.pdf", "b", 1)])
        .await
        .unwrap();

    let closed = staging.close_session(&sid).await.unwrap();
    assert_eq!(closed.username, "alice");
    assert_eq!(count_files(env.upload_dir()), 0);

    assert!(matches!(
        staging.list(&sid).await.unwrap_err(),
        StagingError::SessionClosed
    ));
    assert!(staging.close_session(&sid).await.is_none());
}

#[tokio::test]
async fn test_close_session_sweeps_orphaned_blobs() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = &env.state.staging;

    let staged = staging.stage_uploads(&sid, vec![pdf("a.pdf", "a", 1)]).await.unwrap();
    env.storage.fail_deletes.store(true, Ordering::SeqCst);
    staging.remove_file(&sid, &staged[0].id).await.unwrap();
    assert_eq!(count_files(env.upload_dir()), 1);

    env.storage.fail_deletes.store(false, Ordering::SeqCst);
    staging.close_session(&sid).await.unwrap();
    assert_eq!(count_files(env.upload_dir()), 0);
}

#[tokio::test]
async fn test_concurrent_uploads_to_one_session() {
    let env = TestEnv::new().await;
    let sid = env.open_session("alice").await;
    let staging = env.state.staging.clone();

    let mut handles = Vec::new();
    for i in 0..10 {
        let staging = Arc::clone(&staging);
        let sid = sid.clone();
        handles.push(tokio::spawn(async move {
            staging
                .stage_uploads(&sid, vec![pdf(&format!("{i}.pdf"), &format!("f{i}"), 1)])
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(staging.list(&sid).await.unwrap().len(), 10);
    assert_eq!(count_files(env.upload_dir()), 10);
}

#[tokio::test]
async fn test_expired_sessions_are_reclaimed_on_next_open() {
    let env = TestEnv::new().await;
    let staging = &env.state.staging;

    let stale = env.open_expired_session("alice").await;
    staging.stage_uploads(&stale, vec![pdf("a.pdf", "a", 1)]).await.unwrap();
    let live = env.open_session("bob").await;
    staging.stage_uploads(&live, vec![pdf("b.pdf", "b", 1)]).await.unwrap();
    assert_eq!(count_files(env.upload_dir()), 2);

    let fresh = staging
        .open_session(&Principal {
            username: "alice".to_string(),
        })
        .await;
    assert!(fresh.expires_at > chrono::Utc::now());

    assert_eq!(env.sessions.len(), 2);
    assert!(matches!(
        staging.list(&stale).await.unwrap_err(),
        StagingError::SessionClosed
    ));
    assert_eq!(staging.list(&live).await.unwrap().len(), 1);
    assert_eq!(count_files(env.upload_dir()), 1);
}
