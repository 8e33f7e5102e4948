//! In-memory source trees for tests and embedders.
//!
//! Directories hand out their children in pages of a configurable size and can
//! be told to fail part-way through a listing; files can be told to fail on read.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::contract::{DirectoryHandle, EntryReader, FileHandle, SourceEntry, SourceError};

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub enum MemoryNode {
    File {
        name: String,
        content: Vec<u8>,
        fail_read: bool,
    },
    Directory {
        name: String,
        children: Vec<MemoryNode>,
        page_size: usize,
        /// Fails the listing after the first page has been handed out.
        fail_listing: bool,
    },
}

impl MemoryNode {
    pub fn file(name: impl Into<String>, content: Vec<u8>) -> Self {
        MemoryNode::File {
            name: name.into(),
            content,
            fail_read: false,
        }
    }

    pub fn unreadable_file(name: impl Into<String>) -> Self {
        MemoryNode::File {
            name: name.into(),
            content: Vec::new(),
            fail_read: true,
        }
    }

    pub fn dir(name: impl Into<String>, children: Vec<MemoryNode>) -> Self {
        MemoryNode::Directory {
            name: name.into(),
            children,
            page_size: DEFAULT_PAGE_SIZE,
            fail_listing: false,
        }
    }

    /// No-op on files.
    pub fn with_page_size(mut self, size: usize) -> Self {
        if let MemoryNode::Directory { page_size, .. } = &mut self {
            *page_size = size.max(1);
        }
        self
    }

    /// No-op on files.
    pub fn failing_listing(mut self) -> Self {
        if let MemoryNode::Directory { fail_listing, .. } = &mut self {
            *fail_listing = true;
        }
        self
    }

    pub fn into_entry(self) -> SourceEntry {
        match self {
            MemoryNode::File {
                name,
                content,
                fail_read,
            } => SourceEntry::file(MemoryFile {
                name,
                content,
                fail_read,
            }),
            MemoryNode::Directory {
                name,
                children,
                page_size,
                fail_listing,
            } => SourceEntry::directory(MemoryDirectory {
                name,
                children,
                page_size,
                fail_listing,
            }),
        }
    }
}

struct MemoryFile {
    name: String,
    content: Vec<u8>,
    fail_read: bool,
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self) -> Result<Vec<u8>, SourceError> {
        if self.fail_read {
            return Err(SourceError::Other(format!("cannot read {}", self.name)));
        }
        Ok(self.content.clone())
    }
}

struct MemoryDirectory {
    name: String,
    children: Vec<MemoryNode>,
    page_size: usize,
    fail_listing: bool,
}

#[async_trait]
impl DirectoryHandle for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> Result<Box<dyn EntryReader>, SourceError> {
        Ok(Box::new(MemoryReader {
            remaining: self.children.iter().cloned().collect(),
            page_size: self.page_size,
            fail_listing: self.fail_listing,
            pages_served: 0,
            directory: self.name.clone(),
        }))
    }
}

struct MemoryReader {
    remaining: VecDeque<MemoryNode>,
    page_size: usize,
    fail_listing: bool,
    pages_served: usize,
    directory: String,
}

#[async_trait]
impl EntryReader for MemoryReader {
    async fn read_entries(&mut self) -> Result<Vec<SourceEntry>, SourceError> {
        if self.fail_listing && self.pages_served >= 1 {
            return Err(SourceError::Other(format!(
                "listing of {} failed",
                self.directory
            )));
        }
        self.pages_served += 1;
        let take = self.page_size.min(self.remaining.len());
        Ok(self
            .remaining
            .drain(..take)
            .map(MemoryNode::into_entry)
            .collect())
    }
}
