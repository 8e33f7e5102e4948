//! High-level pipeline: reconciles a batch of file records against a remote store.
//!
//! For every record, in order and one at a time, the engine:
//!   - rejects it without any remote call when it exceeds [`MAX_CONTENT_SIZE`]
//!   - probes the remote store for the file's current state (a missing file is expected)
//!   - writes the content, attaching the version token when the file already exists
//!   - records a success or a failure for that record and releases its spooled content
//!
//! # Major Types
//! - [`SyncRequest`]: target, credential, optional commit message and the records
//! - [`BatchResult`]: what succeeded and what failed, with the cause of each failure
//!
//! # Responsibilities
//! - Request-shape problems (no credential, no records) reject the whole batch before
//!   any record is attempted
//! - Per-record problems never abort the batch: every record gets a terminal outcome
//! - No retries and no backoff; one pass per record
//!
//! # Concurrency
//! Records are processed strictly sequentially so the engine never races its own
//! writes on the branch. Nothing is shared between calls.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::aggregate::{BatchResult, UploadOutcome};
use crate::contract::{Credential, PutFileRequest, RemoteError, RemoteFileState, RemoteStore};
use crate::record::{FileRecord, MAX_CONTENT_SIZE};
use crate::target::RepositoryTarget;

pub const FILE_TOO_LARGE: &str = "file too large (max 1 MiB for the contents API)";

/// One synchronisation call.
#[derive(Debug)]
pub struct SyncRequest {
    pub target: RepositoryTarget,
    pub credential: Credential,
    /// Used for every write; blank or missing falls back to `Upload <path>`.
    pub commit_message: Option<String>,
    pub items: Vec<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("a credential is required")]
    MissingCredential,
    #[error("no files to upload")]
    NoItems,
}

/// Entrypoint: synchronise every record of `request` against `store`.
pub async fn synchronise<S>(store: &S, request: SyncRequest) -> Result<BatchResult, SyncError>
where
    S: RemoteStore + ?Sized,
{
    let SyncRequest {
        target,
        credential,
        commit_message,
        items,
    } = request;

    if credential.is_empty() {
        error!(%target, "[SYNC][ERROR] Rejecting batch without credential");
        release_all(items);
        return Err(SyncError::MissingCredential);
    }
    if items.is_empty() {
        error!(%target, "[SYNC][ERROR] Rejecting empty batch");
        return Err(SyncError::NoItems);
    }

    let commit_message = commit_message.filter(|m| !m.trim().is_empty());
    info!(%target, items = items.len(), "[SYNC] Starting batch synchronisation");

    let mut outcomes = Vec::with_capacity(items.len());
    for item in items {
        let outcome = sync_item(store, &credential, &target, commit_message.as_deref(), &item).await;
        match &outcome {
            UploadOutcome::Success(path) => info!(path = %path, "[SYNC][UPLOAD] Uploaded file"),
            UploadOutcome::Failure { path, message } => {
                error!(path = %path, error = %message, "[SYNC][ERROR][UPLOAD] Failed to upload file")
            }
        }
        outcomes.push(outcome);
        item.release();
    }

    let result = BatchResult::from_outcomes(outcomes);
    info!(
        succeeded = result.succeeded.len(),
        failed = result.failures.len(),
        overall_success = result.overall_success,
        "[SYNC] Batch synchronisation finished"
    );
    Ok(result)
}

async fn sync_item<S>(
    store: &S,
    credential: &Credential,
    target: &RepositoryTarget,
    commit_message: Option<&str>,
    item: &FileRecord,
) -> UploadOutcome
where
    S: RemoteStore + ?Sized,
{
    let path = item.relative_path();

    if item.size() > MAX_CONTENT_SIZE {
        warn!(path = %path, size = item.size(), "[SYNC] Skipping oversize file");
        return UploadOutcome::failure(path, FILE_TOO_LARGE);
    }

    let content = match item.content().bytes().await {
        Ok(content) => content,
        Err(e) => {
            return UploadOutcome::failure(path, format!("failed to read uploaded content: {e}"))
        }
    };

    let state = match store.file_state(credential, target, path).await {
        Ok(state) => state,
        Err(RemoteError::NotFound) => RemoteFileState::Absent,
        Err(e) => return UploadOutcome::failure(path, e.to_string()),
    };
    debug!(path = %path, exists = state.version_token().is_some(), "[SYNC] Probed remote file");

    let request = PutFileRequest {
        path: path.to_owned(),
        message: commit_message
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Upload {path}")),
        content_base64: STANDARD.encode(&content),
        branch: target.branch.clone(),
        version_token: state.version_token().map(str::to_owned),
    };

    match store.put_file(credential, target, request).await {
        Ok(stored) => {
            debug!(path = %stored.path, version_token = ?stored.version_token, "[SYNC][UPLOAD] Remote write accepted");
            UploadOutcome::Success(path.to_owned())
        }
        Err(e) => UploadOutcome::failure(path, e.to_string()),
    }
}

fn release_all(items: Vec<FileRecord>) {
    for item in items {
        item.release();
    }
}
