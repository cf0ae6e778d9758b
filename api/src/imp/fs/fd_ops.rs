use alloc::sync::Arc;
use axerrno::{LinuxError, LinuxResult};
use syscall_trace::syscall_trace;
use tinyk_core::file::{FileControl, StreamObject};
use tinyk_core::task::current_kernel;

/// Get the file control record behind `fid`.
pub fn get_file(fid: usize) -> LinuxResult<Arc<FileControl>> {
    current_kernel()?
        .file(fid)?
        .into_any()
        .downcast::<FileControl>()
        .map_err(|_| LinuxError::EBADF)
}

/// Install `stream` in the lowest free file id of the calling process.
pub fn open_stream(stream: alloc::boxed::Box<dyn StreamObject>) -> LinuxResult<usize> {
    current_kernel()?.install_file(FileControl::new(stream))
}

#[syscall_trace]
pub fn sys_read(fid: usize, buf: &mut [u8]) -> LinuxResult<usize> {
    get_file(fid)?.read(buf)
}

#[syscall_trace]
pub fn sys_write(fid: usize, buf: &[u8]) -> LinuxResult<usize> {
    get_file(fid)?.write(buf)
}

/// Drop the calling process's reference on `fid`.
#[syscall_trace]
pub fn sys_close(fid: usize) -> LinuxResult {
    current_kernel()?.close_file(fid)
}
