//! File control records shared between open-file tables.

use alloc::boxed::Box;
use alloc::sync::Arc;
use axerrno::LinuxResult;
use core::any::Any;
use core::sync::atomic::{AtomicUsize, Ordering};
use tinyk_process::files::SharedFile;

/// A byte stream behind a file id.
pub trait StreamObject: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> LinuxResult<usize>;
    fn write(&self, buf: &[u8]) -> LinuxResult<usize>;
    /// Called once, when the last reference to the file goes away.
    fn close(&self) -> LinuxResult;
}

/// Reference-counted handle on a stream, installed in open-file tables.
///
/// A fresh record holds no reference; every table slot holding it takes one,
/// and the stream is closed when the count returns to zero.
pub struct FileControl {
    refcount: AtomicUsize,
    stream: Box<dyn StreamObject>,
}

impl FileControl {
    pub fn new(stream: Box<dyn StreamObject>) -> Arc<Self> {
        Arc::new(Self {
            refcount: AtomicUsize::new(0),
            stream,
        })
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    pub fn read(&self, buf: &mut [u8]) -> LinuxResult<usize> {
        self.stream.read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> LinuxResult<usize> {
        self.stream.write(buf)
    }
}

impl SharedFile for FileControl {
    fn incref(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    fn decref(&self) {
        let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "[file] reference count underflow");
        if prev == 1 {
            if let Err(err) = self.stream.close() {
                warn!("[file] failed to close stream: {:?}", err);
            }
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
