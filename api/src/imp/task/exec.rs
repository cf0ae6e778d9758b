use axerrno::LinuxResult;
use syscall_trace::syscall_trace;
use tinyk_core::task::current_kernel;
use tinyk_process::Pid;
use tinyk_process::task::Task;

/// Create a child process running `task` on a private copy of `args`.
///
/// Without a task the child is created inert: it gets a pid but no thread,
/// and so never exits.
#[syscall_trace]
pub fn sys_exec(task: Option<Task>, args: Option<&[u8]>) -> LinuxResult<Pid> {
    current_kernel()?.exec(task, args)
}

#[syscall_trace]
pub fn sys_getpid() -> LinuxResult<Pid> {
    current_kernel()?.getpid()
}

/// Pid of the parent process, or `NOPROC` for the bootstrap processes and
/// orphans nobody adopted.
#[syscall_trace]
pub fn sys_getppid() -> LinuxResult<Pid> {
    current_kernel()?.getppid()
}
