//! Tree flattener: walks file and directory sources into a flat list of
//! [`FileRecord`]s whose paths are the `/`-joined chain of ancestor names.
//!
//! Sibling subtrees are walked concurrently. Each subtree returns its own list
//! and lists are concatenated at the join point, so no accumulator is shared
//! between tasks. A subtree whose listing or read fails is left out of the
//! result and its siblings carry on.

use futures::future::{join_all, BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::contract::{DirectoryHandle, FileHandle, SourceEntry, SourceError};
use crate::record::FileRecord;

/// Flattens `roots` into file records. Output order is unspecified; every
/// readable leaf file appears exactly once.
pub async fn flatten(roots: Vec<SourceEntry>) -> Vec<FileRecord> {
    info!(roots = roots.len(), "Flattening source entries");
    let walks = roots.into_iter().map(|root| walk(root, String::new()));
    let records: Vec<FileRecord> = join_all(walks).await.into_iter().flatten().collect();
    info!(count = records.len(), "Completed flattening source entries");
    records
}

fn walk(entry: SourceEntry, prefix: String) -> BoxFuture<'static, Vec<FileRecord>> {
    async move {
        match entry {
            SourceEntry::File(file) => read_file(file.as_ref(), &prefix).await.into_iter().collect(),
            SourceEntry::Directory(dir) => {
                let dir_prefix = format!("{prefix}{}/", dir.name());
                let children = match read_all_entries(dir.as_ref()).await {
                    Ok(children) => children,
                    Err(e) => {
                        warn!(error = %e, directory = %dir_prefix, "Skipping directory whose listing failed");
                        return Vec::new();
                    }
                };
                debug!(directory = %dir_prefix, children = children.len(), "Listed directory");
                let walks = children
                    .into_iter()
                    .map(|child| walk(child, dir_prefix.clone()));
                join_all(walks).await.into_iter().flatten().collect()
            }
        }
    }
    .boxed()
}

/// Drains a directory's paginated reader. Any failure discards everything
/// listed so far.
async fn read_all_entries(dir: &dyn DirectoryHandle) -> Result<Vec<SourceEntry>, SourceError> {
    let mut reader = dir.entries().await?;
    let mut entries = Vec::new();
    loop {
        let batch = reader.read_entries().await?;
        if batch.is_empty() {
            return Ok(entries);
        }
        entries.extend(batch);
    }
}

async fn read_file(file: &dyn FileHandle, prefix: &str) -> Option<FileRecord> {
    let path = format!("{prefix}{}", file.name());
    let content = match file.read().await {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, path = %path, "Skipping file that could not be read");
            return None;
        }
    };
    match FileRecord::new(&path, content) {
        Ok(record) => {
            debug!(path = %record.relative_path(), size = record.size(), "Flattened file");
            Some(record)
        }
        Err(e) => {
            warn!(error = %e, path = %path, "Skipping file with unusable path");
            None
        }
    }
}
