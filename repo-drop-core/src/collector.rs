//! Batch collector: accumulates flattened records across repeated picks and
//! drops until the batch is submitted.

use tracing::{debug, warn};

use crate::record::FileRecord;

/// A collected record and whether it exceeds the remote single-file limit.
///
/// Oversize items stay in the batch so the user can see them; the
/// synchronisation engine rejects them at submission time.
#[derive(Debug)]
pub struct BatchItem {
    pub record: FileRecord,
    pub oversize: bool,
}

impl From<FileRecord> for BatchItem {
    fn from(record: FileRecord) -> Self {
        let oversize = record.is_oversize();
        Self { record, oversize }
    }
}

#[derive(Debug, Default)]
pub struct BatchCollector {
    items: Vec<BatchItem>,
}

impl BatchCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `files` to the batch and returns how many of them are oversize.
    pub fn add(&mut self, files: impl IntoIterator<Item = FileRecord>) -> usize {
        let before = self.items.len();
        self.items.extend(files.into_iter().map(BatchItem::from));
        let added = &self.items[before..];
        let oversize = added.iter().filter(|item| item.oversize).count();
        if oversize > 0 {
            warn!(
                oversize,
                "Collected files larger than 1 MiB; they will be rejected on upload"
            );
        }
        debug!(added = added.len(), total = self.items.len(), "Added files to batch");
        oversize
    }

    /// Removes the item at `index`. Out-of-range indices are ignored.
    pub fn remove_at(&mut self, index: usize) -> Option<BatchItem> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn list(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|item| item.record.size()).sum()
    }

    pub fn oversize_count(&self) -> usize {
        self.items.iter().filter(|item| item.oversize).count()
    }

    /// Empties the batch, releasing any spooled content.
    pub fn clear(&mut self) {
        for item in self.items.drain(..) {
            item.record.release();
        }
    }

    pub fn into_records(self) -> Vec<FileRecord> {
        self.items.into_iter().map(|item| item.record).collect()
    }
}
