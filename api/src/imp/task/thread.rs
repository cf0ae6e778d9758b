use axerrno::LinuxResult;
use syscall_trace::syscall_trace;
use tinyk_core::task::{current_kernel, current_thread};
use tinyk_process::task::Task;
use tinyk_process::thread::Tid;

/// Start a thread in the calling process running `task` on `args`.
#[syscall_trace]
pub fn sys_create_thread(task: Task, args: Option<&[u8]>) -> LinuxResult<Tid> {
    current_kernel()?.create_thread(task, args)
}

#[syscall_trace]
pub fn sys_thread_self() -> LinuxResult<Tid> {
    current_thread()
}

/// Wait for thread `tid` to exit, storing its exit value in `exit_value`.
///
/// Errors:
/// - `ESRCH`: `tid` is not a live thread of the calling process;
/// - `EDEADLK`: `tid` is the caller;
/// - `EINVAL`: the thread is detached, or got detached while waiting.
#[syscall_trace]
pub fn sys_thread_join(tid: Tid, exit_value: Option<&mut i32>) -> LinuxResult {
    let value = current_kernel()?.thread_join(tid)?;
    if let Some(exit_value) = exit_value {
        *exit_value = value;
    }
    Ok(())
}

#[syscall_trace]
pub fn sys_thread_detach(tid: Tid) -> LinuxResult {
    current_kernel()?.thread_detach(tid)
}
