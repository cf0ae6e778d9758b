use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use axerrno::{LinuxError, LinuxResult};
use spin::Mutex;
use syscall_trace::syscall_trace;
use tinyk_core::Kernel;
use tinyk_core::file::{FileControl, StreamObject};
use tinyk_core::task::current_kernel;
use tinyk_process::info::ProcInfo;

/// Read-only listing of the process table, one encoded [`ProcInfo`] per
/// read, in slot order.
pub struct InfoStream {
    kernel: Weak<Kernel>,
    cursor: Mutex<usize>,
}

impl InfoStream {
    pub fn new(kernel: &Arc<Kernel>) -> Self {
        Self {
            kernel: Arc::downgrade(kernel),
            cursor: Mutex::new(0),
        }
    }
}

impl StreamObject for InfoStream {
    fn read(&self, buf: &mut [u8]) -> LinuxResult<usize> {
        let Some(buf) = buf.first_chunk_mut::<{ ProcInfo::SIZE }>() else {
            return Err(LinuxError::EINVAL);
        };
        let kernel = self.kernel.upgrade().ok_or(LinuxError::EBADF)?;
        let mut cursor = self.cursor.lock();
        match kernel.snapshot(*cursor) {
            Some((next, info)) => {
                info.encode(buf);
                *cursor = next;
                Ok(ProcInfo::SIZE)
            }
            None => {
                *cursor = usize::MAX;
                Ok(0)
            }
        }
    }

    fn write(&self, _buf: &[u8]) -> LinuxResult<usize> {
        Err(LinuxError::EINVAL)
    }

    fn close(&self) -> LinuxResult {
        debug!("[info] listing closed");
        Ok(())
    }
}

/// Open the process listing, returning its file id.
#[syscall_trace]
pub fn sys_open_info() -> LinuxResult<usize> {
    let kernel = current_kernel()?;
    let file = FileControl::new(Box::new(InfoStream::new(&kernel)));
    kernel.install_file(file)
}
