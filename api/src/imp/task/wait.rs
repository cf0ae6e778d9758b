use axerrno::LinuxResult;
use syscall_trace::syscall_trace;
use tinyk_core::WaitTarget;
use tinyk_core::task::current_kernel;
use tinyk_process::Pid;

/// Reap a zombie child: `Some(pid)` waits for that child, `None` for the
/// first child to die. The exit code is stored in `status` when given.
///
/// Fails with `ECHILD` if `pid` is not a child of the caller, or if the
/// caller has no children at all.
#[syscall_trace]
pub fn sys_wait_child(pid: Option<Pid>, status: Option<&mut i32>) -> LinuxResult<Pid> {
    let target = match pid {
        Some(pid) => WaitTarget::Pid(pid),
        None => WaitTarget::Any,
    };
    let (child, code) = current_kernel()?.wait_child(target)?;
    if let Some(status) = status {
        *status = code;
    }
    Ok(child)
}
