//! Flat, path-qualified file records and the content they carry.

use std::borrow::Cow;
use std::io;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Largest single file the remote contents API accepts (1 MiB).
pub const MAX_CONTENT_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("relative path must not be empty")]
    EmptyPath,
    #[error("failed to inspect spooled content: {0}")]
    Io(#[from] io::Error),
}

/// Bytes of a record, either held in memory or spooled to a temporary file.
///
/// Spooled content is deleted when the record is released or dropped.
#[derive(Debug)]
pub enum FileContent {
    InMemory(Vec<u8>),
    Spooled(NamedTempFile),
}

impl FileContent {
    pub async fn bytes(&self) -> io::Result<Cow<'_, [u8]>> {
        match self {
            FileContent::InMemory(bytes) => Ok(Cow::Borrowed(bytes)),
            FileContent::Spooled(file) => tokio::fs::read(file.path()).await.map(Cow::Owned),
        }
    }

    /// Removes any temporary storage backing this content.
    pub fn release(self) {
        if let FileContent::Spooled(file) = self {
            let path = file.path().to_path_buf();
            match file.close() {
                Ok(()) => debug!(path = %path.display(), "Released spooled upload"),
                Err(e) => warn!(error = ?e, path = %path.display(), "Failed to remove spooled upload"),
            }
        }
    }
}

/// One file of a batch: `/`-joined relative path, content and size in bytes.
#[derive(Debug)]
pub struct FileRecord {
    relative_path: String,
    content: FileContent,
    size: u64,
}

impl FileRecord {
    /// Builds a record from in-memory bytes. Leading slashes are stripped; an empty
    /// path is rejected.
    pub fn new(relative_path: impl AsRef<str>, content: Vec<u8>) -> Result<Self, RecordError> {
        let relative_path = normalise_path(relative_path.as_ref())?;
        let size = content.len() as u64;
        Ok(Self {
            relative_path,
            content: FileContent::InMemory(content),
            size,
        })
    }

    /// Builds a record whose bytes already live in a temporary file.
    pub fn spooled(relative_path: impl AsRef<str>, file: NamedTempFile) -> Result<Self, RecordError> {
        let relative_path = normalise_path(relative_path.as_ref())?;
        let size = file.as_file().metadata()?.len();
        Ok(Self {
            relative_path,
            content: FileContent::Spooled(file),
            size,
        })
    }

    /// A single picked file: its path is just its name.
    pub fn from_pick(name: &str, content: Vec<u8>) -> Result<Self, RecordError> {
        Self::new(name, content)
    }

    /// A file picked as part of a folder. Browsers supply the folder-relative path;
    /// when that is blank the file name is used instead.
    pub fn from_relative(
        relative_path: &str,
        name: &str,
        content: Vec<u8>,
    ) -> Result<Self, RecordError> {
        if relative_path.trim().is_empty() {
            Self::new(name, content)
        } else {
            Self::new(relative_path, content)
        }
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }

    pub fn is_oversize(&self) -> bool {
        self.size > MAX_CONTENT_SIZE
    }

    /// Releases the record's transient storage. See [`FileContent::release`].
    pub fn release(self) {
        self.content.release();
    }
}

fn normalise_path(raw: &str) -> Result<String, RecordError> {
    let path = raw.trim().replace('\\', "/");
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Err(RecordError::EmptyPath);
    }
    Ok(path.to_owned())
}
