//! # contract: seams between the core and the outside world
//!
//! This module defines the traits the core logic is written against:
//!
//! - [`FileHandle`], [`DirectoryHandle`] and [`EntryReader`] describe a tree of
//!   sources the flattener can walk. A directory's children are only reachable
//!   through a paginated reader that must be called until it returns an empty batch.
//! - [`RemoteStore`] describes the remote contents store the synchronisation engine
//!   probes and writes, one file at a time.
//!
//! ## Mocking & Testing
//! - [`RemoteStore`] is annotated for `mockall`; enable the `test-export-mocks`
//!   feature (on by default) to get `MockRemoteStore` in downstream tests.
//! - In-memory source trees live in [`crate::memory`] under the same feature.
//!
//! ## Errors
//! - Sources fail with [`SourceError`]; the flattener drops the affected subtree.
//! - Remote calls fail with [`RemoteError`]. [`RemoteError::NotFound`] from a probe
//!   is an expected answer, not a failure.

use std::fmt;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::target::RepositoryTarget;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// A file whose bytes can be read asynchronously.
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn read(&self) -> Result<Vec<u8>, SourceError>;
}

/// A directory whose children are listed through an [`EntryReader`].
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Opens a fresh reader over the directory's children.
    async fn entries(&self) -> Result<Box<dyn EntryReader>, SourceError>;
}

/// Paginated listing of a directory.
#[async_trait]
pub trait EntryReader: Send {
    /// Returns the next batch of children. A batch may be partial; an empty batch
    /// means the listing is exhausted.
    async fn read_entries(&mut self) -> Result<Vec<SourceEntry>, SourceError>;
}

/// A root or child the flattener walks.
pub enum SourceEntry {
    File(Box<dyn FileHandle>),
    Directory(Box<dyn DirectoryHandle>),
}

impl SourceEntry {
    pub fn file(handle: impl FileHandle + 'static) -> Self {
        SourceEntry::File(Box::new(handle))
    }

    pub fn directory(handle: impl DirectoryHandle + 'static) -> Self {
        SourceEntry::Directory(Box::new(handle))
    }

    pub fn name(&self) -> &str {
        match self {
            SourceEntry::File(f) => f.name(),
            SourceEntry::Directory(d) => d.name(),
        }
    }
}

impl fmt::Debug for SourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceEntry::File(file) => f.debug_tuple("File").field(&file.name()).finish(),
            SourceEntry::Directory(dir) => f.debug_tuple("Directory").field(&dir.name()).finish(),
        }
    }
}

/// Opaque access token for the remote store. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// What the remote store currently holds at a path on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFileState {
    Absent,
    /// The token must accompany any overwrite of this file.
    Present { version_token: String },
}

impl RemoteFileState {
    pub fn version_token(&self) -> Option<&str> {
        match self {
            RemoteFileState::Absent => None,
            RemoteFileState::Present { version_token } => Some(version_token),
        }
    }
}

/// A create-or-update write of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutFileRequest {
    pub path: String,
    pub message: String,
    /// Base64 of the raw file bytes.
    pub content_base64: String,
    pub branch: String,
    /// Required when overwriting; `None` creates a new file.
    pub version_token: Option<String>,
}

/// The file as stored after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: String,
    pub version_token: Option<String>,
    pub commit_sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("not found")]
    NotFound,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote contents store (e.g. the GitHub contents API).
///
/// Implementations must not cache file state: every probe reflects the store at
/// the time of the call.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Looks up the file at `path` on `target.branch`. A missing file should be
    /// reported as `Ok(RemoteFileState::Absent)` or `Err(RemoteError::NotFound)`.
    async fn file_state(
        &self,
        credential: &Credential,
        target: &RepositoryTarget,
        path: &str,
    ) -> Result<RemoteFileState, RemoteError>;

    /// Creates or updates one file with a single commit.
    async fn put_file(
        &self,
        credential: &Credential,
        target: &RepositoryTarget,
        request: PutFileRequest,
    ) -> Result<StoredFile, RemoteError>;
}
