//! Per-process open-file table.
//!
//! Slots hold shared, reference-counted file resources owned by the stream
//! subsystem. The table only ever moves the counts: installing or inheriting a
//! slot takes a reference, clearing a slot gives it back.

use crate::MAX_FILEID;
use alloc::sync::Arc;
use core::any::Any;

/// A file resource whose lifetime is governed by an explicit reference count.
/// The underlying stream is closed when the count drops to zero.
pub trait SharedFile: Send + Sync {
    fn incref(&self);
    fn decref(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

pub type FileRef = Arc<dyn SharedFile>;

pub struct FileTable {
    slots: [Option<FileRef>; MAX_FILEID],
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTable {
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_FILEID],
        }
    }

    /// Copy every occupied slot of `parent`, taking one reference per slot.
    pub fn inherit_from(&mut self, parent: &FileTable) {
        for (slot, file) in self.slots.iter_mut().zip(parent.slots.iter()) {
            *slot = file.clone();
            if let Some(file) = slot {
                file.incref();
            }
        }
    }

    /// Install `file` in the lowest free slot and take a reference to it.
    /// Returns `None` when the table is full.
    pub fn install(&mut self, file: FileRef) -> Option<usize> {
        let fid = self.slots.iter().position(Option::is_none)?;
        file.incref();
        self.slots[fid] = Some(file);
        Some(fid)
    }

    pub fn get(&self, fid: usize) -> Option<&FileRef> {
        self.slots.get(fid)?.as_ref()
    }

    /// Clear slot `fid`, giving back its reference.
    pub fn close(&mut self, fid: usize) -> bool {
        match self.slots.get_mut(fid).and_then(Option::take) {
            Some(file) => {
                file.decref();
                true
            }
            None => false,
        }
    }

    /// Clear every slot, giving back one reference per occupied slot.
    pub fn release_all(&mut self) {
        for file in self.slots.iter_mut().filter_map(Option::take) {
            file.decref();
        }
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
