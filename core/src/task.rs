use crate::kernel::Kernel;
use crate::sched::ContextExit;
use alloc::sync::Arc;
use axerrno::{LinuxError, LinuxResult};
use core::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use tinyk_process::Pid;
use tinyk_process::task::Task;
use tinyk_process::thread::Tid;

thread_local! {
    static CURRENT_KERNEL: RefCell<Option<Arc<Kernel>>> = const { RefCell::new(None) };
}

/// The kernel the calling context runs under.
pub fn current_kernel() -> LinuxResult<Arc<Kernel>> {
    CURRENT_KERNEL
        .with(|current| current.borrow().clone())
        .ok_or(LinuxError::EPERM)
}

pub fn current_pid() -> LinuxResult<Pid> {
    current_kernel()?.getpid()
}

pub fn current_thread() -> LinuxResult<Tid> {
    current_kernel()?.thread_self()
}

/// Makes a kernel current for the calling thread while alive.
pub(crate) struct KernelScope(Option<Arc<Kernel>>);

impl KernelScope {
    pub(crate) fn enter(kernel: Arc<Kernel>) -> Self {
        let prev = CURRENT_KERNEL.with(|current| current.borrow_mut().replace(kernel));
        Self(prev)
    }
}

impl Drop for KernelScope {
    fn drop(&mut self) {
        let prev = self.0.take();
        CURRENT_KERNEL.with(|current| *current.borrow_mut() = prev);
    }
}

/// Run `task`, turning a panic into exit value -1. A context terminating
/// itself from inside the task keeps unwinding.
fn run_task(task: &Task, args: &[u8]) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(|| task.call(args))) {
        Ok(value) => value,
        Err(payload) if payload.is::<ContextExit>() => panic::resume_unwind(payload),
        Err(_) => {
            error!("[task] {:?} panicked", task);
            -1
        }
    }
}

/// Entry of a process's main thread: run the process's task, then exit the
/// process with its return value.
pub(crate) fn main_trampoline(kernel: Arc<Kernel>) {
    let _scope = KernelScope::enter(kernel.clone());
    let (task, args) = match kernel.main_entry() {
        Ok(entry) => entry,
        Err(err) => {
            error!("[task] main thread started without an entry: {:?}", err);
            return;
        }
    };
    let code = run_task(&task, &args);
    kernel.exit(code)
}

/// Entry of a secondary thread: run its task, then exit the thread.
pub(crate) fn thread_trampoline(kernel: Arc<Kernel>) {
    let _scope = KernelScope::enter(kernel.clone());
    let (task, args) = match kernel.thread_entry() {
        Ok(entry) => entry,
        Err(err) => {
            error!("[task] thread started without an entry: {:?}", err);
            return;
        }
    };
    let value = run_task(&task, &args);
    kernel.thread_exit(value)
}
