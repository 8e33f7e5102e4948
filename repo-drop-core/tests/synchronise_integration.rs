use std::io::Write;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mockall::Sequence;
use repo_drop_core::aggregate::{BatchStatus, ItemFailure};
use repo_drop_core::contract::{
    Credential, MockRemoteStore, PutFileRequest, RemoteError, RemoteFileState, StoredFile,
};
use repo_drop_core::record::{FileRecord, MAX_CONTENT_SIZE};
use repo_drop_core::synchronise::{synchronise, SyncError, SyncRequest, FILE_TOO_LARGE};
use repo_drop_core::target::RepositoryTarget;
use tempfile::NamedTempFile;

fn target() -> RepositoryTarget {
    RepositoryTarget::parse("https://github.com/octo/site", None).expect("valid target")
}

fn request(items: Vec<FileRecord>) -> SyncRequest {
    SyncRequest {
        target: target(),
        credential: Credential::new("ghp_test"),
        commit_message: None,
        items,
    }
}

fn record(path: &str, size: usize) -> FileRecord {
    FileRecord::new(path, vec![b'x'; size]).expect("valid record")
}

fn stored(req: &PutFileRequest) -> Result<StoredFile, RemoteError> {
    Ok(StoredFile {
        path: req.path.clone(),
        version_token: Some(format!("sha-of-{}", req.path)),
        commit_sha: Some("c0ffee".into()),
    })
}

#[tokio::test]
async fn test_three_new_files_all_succeed() {
    let mut store = MockRemoteStore::new();
    store
        .expect_file_state()
        .times(3)
        .returning(|_, _, _| Err(RemoteError::NotFound));
    store
        .expect_put_file()
        .times(3)
        .withf(|_, _, req| req.version_token.is_none() && req.branch == "main")
        .returning(|_, _, req| stored(&req));

    let result = synchronise(
        &store,
        request(vec![record("a.txt", 10), record("docs/b.md", 20), record("c/d/e.rs", 30)]),
    )
    .await
    .expect("batch accepted");

    assert!(result.overall_success);
    assert_eq!(result.succeeded, vec!["a.txt", "docs/b.md", "c/d/e.rs"]);
    assert!(result.failures.is_empty());
    assert_eq!(result.status(), BatchStatus::FullySucceeded);
}

#[tokio::test]
async fn test_oversize_file_is_rejected_without_remote_calls() {
    let mut store = MockRemoteStore::new();
    store
        .expect_file_state()
        .times(1)
        .withf(|_, _, path| path == "small.txt")
        .returning(|_, _, _| Ok(RemoteFileState::Absent));
    store
        .expect_put_file()
        .times(1)
        .withf(|_, _, req| req.path == "small.txt")
        .returning(|_, _, req| stored(&req));

    let result = synchronise(
        &store,
        request(vec![record("big.bin", 2 * 1024 * 1024), record("small.txt", 10 * 1024)]),
    )
    .await
    .expect("batch accepted");

    assert!(result.overall_success);
    assert_eq!(result.succeeded, vec!["small.txt"]);
    assert_eq!(
        result.failures,
        vec![ItemFailure {
            path: "big.bin".into(),
            message: FILE_TOO_LARGE.into()
        }]
    );
    assert_eq!(result.status(), BatchStatus::PartiallySucceeded);
}

#[tokio::test]
async fn test_exactly_one_mebibyte_is_still_written() {
    let mut store = MockRemoteStore::new();
    store
        .expect_file_state()
        .returning(|_, _, _| Ok(RemoteFileState::Absent));
    store
        .expect_put_file()
        .times(1)
        .returning(|_, _, req| stored(&req));

    let result = synchronise(&store, request(vec![record("edge.bin", MAX_CONTENT_SIZE as usize)]))
        .await
        .expect("batch accepted");
    assert_eq!(result.succeeded, vec!["edge.bin"]);
}

#[tokio::test]
async fn test_existing_file_is_overwritten_with_its_version_token() {
    let mut store = MockRemoteStore::new();
    let mut seq = Sequence::new();
    store
        .expect_file_state()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, t, path| path == "index.html" && t.owner == "octo" && t.repo == "site")
        .returning(|_, _, _| {
            Ok(RemoteFileState::Present {
                version_token: "abc123".into(),
            })
        });
    store
        .expect_put_file()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, _, req| req.version_token.as_deref() == Some("abc123"))
        .returning(|_, _, req| stored(&req));

    let result = synchronise(&store, request(vec![record("index.html", 5)]))
        .await
        .expect("batch accepted");
    assert_eq!(result.succeeded, vec!["index.html"]);
}

#[tokio::test]
async fn test_probe_error_fails_item_and_skips_write() {
    let mut store = MockRemoteStore::new();
    store.expect_file_state().returning(|_, _, path| {
        if path == "secret.txt" {
            Err(RemoteError::Api {
                status: 403,
                message: "Resource not accessible by integration".into(),
            })
        } else {
            Ok(RemoteFileState::Absent)
        }
    });
    store
        .expect_put_file()
        .times(1)
        .withf(|_, _, req| req.path == "public.txt")
        .returning(|_, _, req| stored(&req));

    let result = synchronise(&store, request(vec![record("secret.txt", 3), record("public.txt", 3)]))
        .await
        .expect("batch accepted");

    assert_eq!(result.succeeded, vec!["public.txt"]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].path, "secret.txt");
    assert_eq!(result.failures[0].message, "Resource not accessible by integration");
}

#[tokio::test]
async fn test_write_rejection_is_isolated_and_batch_continues() {
    let mut store = MockRemoteStore::new();
    store
        .expect_file_state()
        .times(3)
        .returning(|_, _, _| Ok(RemoteFileState::Absent));
    store.expect_put_file().times(3).returning(|_, _, req| {
        if req.path == "b.txt" {
            Err(RemoteError::Api {
                status: 409,
                message: "b.txt does not match".into(),
            })
        } else {
            stored(&req)
        }
    });

    let result = synchronise(
        &store,
        request(vec![record("a.txt", 1), record("b.txt", 1), record("c.txt", 1)]),
    )
    .await
    .expect("batch accepted");

    assert_eq!(result.succeeded, vec!["a.txt", "c.txt"]);
    assert_eq!(result.failures[0].path, "b.txt");
    assert!(result.overall_success);
}

#[tokio::test]
async fn test_all_failures_report_no_overall_success() {
    let mut store = MockRemoteStore::new();
    store
        .expect_file_state()
        .returning(|_, _, _| Err(RemoteError::Transport("connection reset".into())));
    store.expect_put_file().never();

    let result = synchronise(&store, request(vec![record("a.txt", 1)]))
        .await
        .expect("batch accepted");

    assert!(!result.overall_success);
    assert!(result.succeeded.is_empty());
    assert_eq!(result.failures[0].message, "transport error: connection reset");
    assert_eq!(result.status(), BatchStatus::FullyFailed);
}

#[tokio::test]
async fn test_commit_message_defaults_per_path_and_content_is_base64() {
    let captured: Arc<Mutex<Vec<PutFileRequest>>> = Arc::default();
    let sink = captured.clone();

    let mut store = MockRemoteStore::new();
    store
        .expect_file_state()
        .returning(|_, _, _| Ok(RemoteFileState::Absent));
    store.expect_put_file().returning(move |_, _, req| {
        sink.lock().unwrap().push(req.clone());
        stored(&req)
    });

    let mut req = request(vec![FileRecord::new("notes/hello.txt", b"hello".to_vec()).unwrap()]);
    req.commit_message = Some("   ".into());
    synchronise(&store, req).await.expect("batch accepted");

    let mut req = request(vec![FileRecord::new("x.txt", b"x".to_vec()).unwrap()]);
    req.commit_message = Some("Publish docs".into());
    synchronise(&store, req).await.expect("batch accepted");

    let captured = captured.lock().unwrap();
    assert_eq!(captured[0].message, "Upload notes/hello.txt");
    assert_eq!(captured[0].content_base64, STANDARD.encode(b"hello"));
    assert_eq!(captured[1].message, "Publish docs");
}

#[tokio::test]
async fn test_request_shape_errors_attempt_nothing() {
    let mut store = MockRemoteStore::new();
    store.expect_file_state().never();
    store.expect_put_file().never();

    let err = synchronise(&store, request(Vec::new())).await.unwrap_err();
    assert_eq!(err, SyncError::NoItems);

    let mut req = request(vec![record("a.txt", 1)]);
    req.credential = Credential::new("  ");
    let err = synchronise(&store, req).await.unwrap_err();
    assert_eq!(err, SyncError::MissingCredential);
}

#[tokio::test]
async fn test_spooled_content_is_released_on_success_and_failure() {
    let mut store = MockRemoteStore::new();
    store.expect_file_state().returning(|_, _, path| {
        if path == "fails.txt" {
            Err(RemoteError::Api {
                status: 500,
                message: "Server Error".into(),
            })
        } else {
            Ok(RemoteFileState::Absent)
        }
    });
    store.expect_put_file().returning(|_, _, req| stored(&req));

    let spool = |bytes: &[u8]| {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    };
    let ok_file = spool(b"ok");
    let fail_file = spool(b"nope");
    let big_file = spool(&vec![0u8; MAX_CONTENT_SIZE as usize + 1]);
    let paths = [
        ok_file.path().to_path_buf(),
        fail_file.path().to_path_buf(),
        big_file.path().to_path_buf(),
    ];

    let items = vec![
        FileRecord::spooled("ok.txt", ok_file).unwrap(),
        FileRecord::spooled("fails.txt", fail_file).unwrap(),
        FileRecord::spooled("big.bin", big_file).unwrap(),
    ];
    let result = synchronise(&store, request(items)).await.expect("batch accepted");

    assert_eq!(result.succeeded, vec!["ok.txt"]);
    assert_eq!(result.failures.len(), 2);
    for path in &paths {
        assert!(!path.exists(), "{} should have been released", path.display());
    }
}
