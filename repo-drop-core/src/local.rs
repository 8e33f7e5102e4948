//! Local filesystem sources for the flattener.
//!
//! Directories are listed through [`tokio::fs::read_dir`] and handed out in
//! pages of [`LocalOptions::page_size`] entries, the same paginated shape a
//! browser directory reader has. Directories named in
//! [`LocalOptions::excluded`] are skipped while listing, and so are symlinked
//! directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{self, DirEntry, ReadDir};
use tracing::{debug, warn};

use crate::contract::{DirectoryHandle, EntryReader, FileHandle, SourceEntry, SourceError};

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct LocalOptions {
    pub page_size: usize,
    /// Directory names never descended into (e.g. `.git`, `target`).
    pub excluded: Vec<String>,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            excluded: Vec::new(),
        }
    }
}

impl LocalOptions {
    fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| e == name)
    }
}

/// Opens a local path as a flattener root. The root's own name becomes the first
/// path segment of everything beneath it.
pub async fn open(path: &Path, options: &LocalOptions) -> Result<SourceEntry, SourceError> {
    let metadata = fs::metadata(path).await?;
    let name = root_name(path).await?;
    let options = Arc::new(options.clone());
    debug!(path = %path.display(), name = %name, is_dir = metadata.is_dir(), "Opened local source");
    if metadata.is_dir() {
        Ok(SourceEntry::directory(LocalDirectory {
            name,
            path: path.to_path_buf(),
            options,
        }))
    } else if metadata.is_file() {
        Ok(SourceEntry::file(LocalFile {
            name,
            path: path.to_path_buf(),
        }))
    } else {
        Err(SourceError::Other(format!(
            "{} is neither a file nor a directory",
            path.display()
        )))
    }
}

async fn root_name(path: &Path) -> Result<String, SourceError> {
    let resolved = match path.file_name() {
        Some(_) => path.to_path_buf(),
        // `.` or `..` have no file name of their own.
        None => fs::canonicalize(path).await?,
    };
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| SourceError::Other(format!("{} has no file name", path.display())))
}

struct LocalFile {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> Result<Vec<u8>, SourceError> {
        Ok(fs::read(&self.path).await?)
    }
}

struct LocalDirectory {
    name: String,
    path: PathBuf,
    options: Arc<LocalOptions>,
}

#[async_trait]
impl DirectoryHandle for LocalDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> Result<Box<dyn EntryReader>, SourceError> {
        let inner = fs::read_dir(&self.path).await?;
        Ok(Box::new(LocalReader {
            inner,
            options: self.options.clone(),
        }))
    }
}

struct LocalReader {
    inner: ReadDir,
    options: Arc<LocalOptions>,
}

#[async_trait]
impl EntryReader for LocalReader {
    async fn read_entries(&mut self) -> Result<Vec<SourceEntry>, SourceError> {
        let mut page = Vec::new();
        // Keep reading past excluded entries so an empty page only ever means exhaustion.
        while page.len() < self.options.page_size.max(1) {
            let Some(entry) = self.inner.next_entry().await? else {
                break;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let Some(kind) = entry_kind(&entry).await else {
                continue;
            };
            match kind {
                EntryKind::Directory => {
                    if self.options.is_excluded(&name) {
                        debug!(path = %path.display(), "Skipping excluded directory");
                        continue;
                    }
                    page.push(SourceEntry::directory(LocalDirectory {
                        name,
                        path,
                        options: self.options.clone(),
                    }));
                }
                EntryKind::File => page.push(SourceEntry::file(LocalFile { name, path })),
            }
        }
        Ok(page)
    }
}

enum EntryKind {
    File,
    Directory,
}

/// Classifies one listed entry. Symlinked files are followed; symlinked directories
/// are never descended, so a link back to an ancestor cannot loop. Entries that
/// cannot be inspected are skipped without failing their siblings.
async fn entry_kind(entry: &DirEntry) -> Option<EntryKind> {
    let path = entry.path();
    let file_type = match entry.file_type().await {
        Ok(file_type) => file_type,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Skipping entry that could not be inspected");
            return None;
        }
    };
    if file_type.is_dir() {
        return Some(EntryKind::Directory);
    }
    if file_type.is_file() {
        return Some(EntryKind::File);
    }
    if !file_type.is_symlink() {
        return None;
    }
    match fs::metadata(&path).await {
        Ok(target) if target.is_file() => Some(EntryKind::File),
        Ok(target) if target.is_dir() => {
            debug!(path = %path.display(), "Skipping symlinked directory");
            None
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Skipping dangling symlink");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    #[tokio::test]
    async fn flattens_local_tree_with_root_name_prefix() {
        let tmp = tempdir().unwrap();
        let site = tmp.path().join("site");
        create_dir_all(site.join("css")).unwrap();
        write(site.join("index.html"), b"<html>").unwrap();
        write(site.join("css/main.css"), b"body{}").unwrap();

        let options = LocalOptions {
            page_size: 1,
            ..LocalOptions::default()
        };
        let root = open(&site, &options).await.unwrap();
        let records = flatten(vec![root]).await;

        let mut paths: Vec<_> = records.iter().map(|r| r.relative_path().to_owned()).collect();
        paths.sort();
        assert_eq!(paths, vec!["site/css/main.css", "site/index.html"]);
    }

    #[tokio::test]
    async fn excluded_directories_are_not_descended() {
        let tmp = tempdir().unwrap();
        let repo = tmp.path().join("repo");
        create_dir_all(repo.join(".git/info")).unwrap();
        create_dir_all(repo.join("src")).unwrap();
        write(repo.join(".git/info/config"), b"x").unwrap();
        write(repo.join("src/lib.rs"), b"y").unwrap();

        let options = LocalOptions {
            page_size: 1,
            excluded: vec![".git".into()],
        };
        let records = flatten(vec![open(&repo, &options).await.unwrap()]).await;
        let paths: Vec<_> = records.iter().map(|r| r.relative_path()).collect();
        assert_eq!(paths, vec!["repo/src/lib.rs"]);
    }

    #[tokio::test]
    async fn single_file_root_is_just_its_name() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("notes.txt");
        write(&file, b"n").unwrap();

        let records = flatten(vec![open(&file, &LocalOptions::default()).await.unwrap()]).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relative_path(), "notes.txt");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_to_ancestor_is_not_walked_again() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        create_dir_all(&root).unwrap();
        write(root.join("a.txt"), b"a").unwrap();
        std::os::unix::fs::symlink(".", root.join("loop")).unwrap();
        std::os::unix::fs::symlink("..", root.join("up")).unwrap();

        let records = flatten(vec![open(&root, &LocalOptions::default()).await.unwrap()]).await;
        let paths: Vec<_> = records.iter().map(|r| r.relative_path()).collect();
        assert_eq!(paths, vec!["root/a.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_file_is_read_and_dangling_link_skips_only_itself() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("root");
        create_dir_all(&root).unwrap();
        write(root.join("a.txt"), b"a").unwrap();
        write(root.join("b.txt"), b"b").unwrap();
        write(tmp.path().join("outside.txt"), b"o").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("outside.txt"), root.join("linked.txt")).unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", root.join("dangling")).unwrap();

        let options = LocalOptions {
            page_size: 1,
            ..LocalOptions::default()
        };
        let records = flatten(vec![open(&root, &options).await.unwrap()]).await;
        let mut paths: Vec<_> = records.iter().map(|r| r.relative_path().to_owned()).collect();
        paths.sort();
        assert_eq!(paths, vec!["root/a.txt", "root/b.txt", "root/linked.txt"]);
    }

    #[tokio::test]
    async fn missing_path_fails_to_open() {
        let tmp = tempdir().unwrap();
        assert!(open(&tmp.path().join("nope"), &LocalOptions::default()).await.is_err());
    }
}
