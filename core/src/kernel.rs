//! The kernel monitor: one lock over the process table, and the blocking
//! side of every process and thread operation.
//!
//! Waits follow the monitor discipline. A waiter registers on a condition
//! variable while holding the lock, releases it, sleeps and relocks, then
//! re-checks its predicate. Broadcasts are delivered after the lock is
//! dropped.

use crate::sched::Scheduler;
use crate::task::{KernelScope, main_trampoline, thread_trampoline};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use axerrno::{LinuxError, LinuxResult};
use spin::{Mutex, MutexGuard};
use tinyk_process::files::FileRef;
use tinyk_process::info::ProcInfo;
use tinyk_process::process::ProcessRecord;
use tinyk_process::table::ProcessTable;
use tinyk_process::task::Task;
use tinyk_process::thread::{ThreadRecord, Tid};
use tinyk_process::{ContextId, IDLE_PID, INIT_PID, MAX_PROC, NOPROC, Pid};

type TableGuard<'a> = MutexGuard<'a, ProcessTable>;

#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Number of process table slots, at most [`MAX_PROC`].
    pub max_proc: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self { max_proc: MAX_PROC }
    }
}

/// Which child a `wait_child` call reaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    /// The oldest zombie child.
    Any,
    Pid(Pid),
}

#[derive(Debug, Clone, Copy)]
enum WaitChannel {
    ChildExit(Pid),
    ThreadExit(Tid),
    Halt,
}

/// Identity of the calling thread.
#[derive(Debug, Clone, Copy)]
struct Caller {
    ctx: ContextId,
    tid: Tid,
    pid: Pid,
}

pub struct Kernel {
    table: Mutex<ProcessTable>,
    scheduler: Arc<dyn Scheduler>,
}

impl Kernel {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Self::with_config(scheduler, KernelConfig::default())
    }

    /// Set up the process table and the idle process.
    pub fn with_config(scheduler: Arc<dyn Scheduler>, config: KernelConfig) -> Arc<Self> {
        let kernel = Arc::new(Self {
            table: Mutex::new(ProcessTable::new(config.max_proc)),
            scheduler,
        });
        let idle = kernel.table.lock().create_process(None, None, None);
        if idle != Some(IDLE_PID) {
            panic!("[process] idle process did not get pid {}: {:?}", IDLE_PID, idle);
        }
        kernel
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Run `init` as process 1 and block until it has exited. Returns its
    /// exit code.
    pub fn boot(self: &Arc<Self>, init: Task, args: Option<&[u8]>) -> LinuxResult<i32> {
        let _scope = KernelScope::enter(self.clone());
        let ctx = self.scheduler.adopt_current();
        let _adopted = Adopted(&*self.scheduler);

        let mut table = self.table.lock();
        let pid = self.start_process(&mut table, None, Some(init), args)?;
        if pid != INIT_PID {
            panic!("[process] init process got pid {}", pid);
        }
        info!("[boot] init process started");
        while !table.is_zombie(INIT_PID) {
            table = self.wait_on(table, ctx, WaitChannel::Halt);
        }
        let code = table.reap_parentless(INIT_PID).unwrap_or_default();
        info!("[boot] init exited with code {}", code);
        Ok(code)
    }

    fn caller(&self, table: &ProcessTable) -> LinuxResult<Caller> {
        let ctx = self.scheduler.current().ok_or(LinuxError::EPERM)?;
        let tid = table.bound_thread(ctx).ok_or(LinuxError::EPERM)?;
        let pid = table
            .thread(tid)
            .map(ThreadRecord::owner)
            .ok_or(LinuxError::EPERM)?;
        Ok(Caller { ctx, tid, pid })
    }

    fn wait_on<'a>(
        &'a self,
        mut table: TableGuard<'a>,
        ctx: ContextId,
        channel: WaitChannel,
    ) -> TableGuard<'a> {
        let signal = match channel {
            WaitChannel::ChildExit(pid) => table.child_exit_signal(pid),
            WaitChannel::ThreadExit(tid) => table.exit_signal(tid),
            WaitChannel::Halt => Some(table.halt_signal()),
        };
        match signal {
            Some(signal) => signal.enqueue(ctx),
            // gone: let the caller re-check
            None => return table,
        }
        trace!("[wait] {} sleeping on {:?}", ctx, channel);
        drop(table);
        self.scheduler.sleep();
        self.table.lock()
    }

    fn wake_all(&self, contexts: Vec<ContextId>) {
        for ctx in contexts {
            if !self.scheduler.wakeup(ctx) {
                trace!("[wait] {} is gone", ctx);
            }
        }
    }

    /// Allocate a process and start its main thread. Without a task the
    /// process is created inert, with no thread at all.
    fn start_process(
        self: &Arc<Self>,
        table: &mut ProcessTable,
        parent: Option<Pid>,
        task: Option<Task>,
        args: Option<&[u8]>,
    ) -> LinuxResult<Pid> {
        let Some(pid) = table.create_process(parent, task.clone(), args) else {
            warn!("[exec] process table is full");
            return Err(LinuxError::EAGAIN);
        };
        if task.is_none() {
            info!("[exec] process {} created without a thread", pid);
            return Ok(pid);
        }
        let Some(tid) = table.add_thread(pid, ThreadRecord::main(pid)) else {
            warn!("[exec] no thread record left for process {}", pid);
            table.discard_process(pid);
            return Err(LinuxError::EAGAIN);
        };
        table.set_main_thread(pid, tid);

        let kernel = self.clone();
        match self.scheduler.spawn(Box::new(move || main_trampoline(kernel))) {
            Ok(ctx) => {
                table.bind(tid, ctx);
                info!("[exec] process {} created, main thread {} on {}", pid, tid, ctx);
                Ok(pid)
            }
            Err(err) => {
                warn!("[exec] cannot start process {}: {:?}", pid, err);
                table.discard_process(pid);
                Err(err)
            }
        }
    }

    /// Create a child of the calling process running `task` on a private
    /// copy of `args`.
    pub fn exec(self: &Arc<Self>, task: Option<Task>, args: Option<&[u8]>) -> LinuxResult<Pid> {
        let mut table = self.table.lock();
        let caller = self.caller(&table)?;
        self.start_process(&mut table, Some(caller.pid), task, args)
    }

    pub fn getpid(&self) -> LinuxResult<Pid> {
        let table = self.table.lock();
        Ok(self.caller(&table)?.pid)
    }

    /// Parent of the calling process, [`NOPROC`] if it has none.
    pub fn getppid(&self) -> LinuxResult<Pid> {
        let table = self.table.lock();
        let caller = self.caller(&table)?;
        Ok(table
            .get(caller.pid)
            .and_then(ProcessRecord::parent)
            .unwrap_or(NOPROC))
    }

    /// Block until the chosen child is a zombie, then reap it. Returns the
    /// child's pid and exit code.
    pub fn wait_child(&self, target: WaitTarget) -> LinuxResult<(Pid, i32)> {
        let mut table = self.table.lock();
        let caller = self.caller(&table)?;
        loop {
            let zombie = match target {
                WaitTarget::Pid(child) => {
                    if !table.is_child_of(child, caller.pid) {
                        return Err(LinuxError::ECHILD);
                    }
                    table.is_zombie(child).then_some(child)
                }
                WaitTarget::Any => {
                    let has_children = table
                        .get(caller.pid)
                        .is_some_and(ProcessRecord::has_children);
                    if !has_children {
                        return Err(LinuxError::ECHILD);
                    }
                    table.first_exited(caller.pid)
                }
            };
            if let Some(child) = zombie {
                let code = table.reap(caller.pid, child);
                info!(
                    "[wait] process {} reaped child {} with code {}",
                    caller.pid, child, code
                );
                return Ok((child, code));
            }
            table = self.wait_on(table, caller.ctx, WaitChannel::ChildExit(caller.pid));
        }
    }

    /// Terminate the calling thread with `code` as the exit code of its
    /// process. Process 1 first reaps every child it has.
    pub fn exit(&self, code: i32) -> ! {
        let table = self.table.lock();
        let caller = match self.caller(&table) {
            Ok(caller) => caller,
            Err(err) => panic!("[exit] no process to exit: {:?}", err),
        };
        drop(table);
        if caller.pid == INIT_PID {
            while let Ok((child, status)) = self.wait_child(WaitTarget::Any) {
                debug!("[exit] init drained child {} ({})", child, status);
            }
        }
        let mut table = self.table.lock();
        table.record_exit_code(caller.pid, code);
        info!("[exit] process {} exiting with code {}", caller.pid, code);
        self.finish_thread(table, caller, code)
    }

    /// Retire the calling thread; the last one out turns its process into a
    /// zombie.
    fn finish_thread(&self, mut table: TableGuard<'_>, caller: Caller, value: i32) -> ! {
        let mut woken = table.mark_exited(caller.tid, value);
        table.unbind(caller.ctx);
        if table.retire_thread(caller.pid) == 0 {
            woken.extend(table.zombify(caller.pid, value));
            info!("[exit] process {} is a zombie", caller.pid);
        }
        drop(table);
        self.wake_all(woken);
        self.scheduler.exit_current()
    }

    /// Start a new thread of the calling process.
    pub fn create_thread(self: &Arc<Self>, task: Task, args: Option<&[u8]>) -> LinuxResult<Tid> {
        let mut table = self.table.lock();
        let caller = self.caller(&table)?;
        let record = ThreadRecord::new(caller.pid, Some(task), args.map(Box::from));
        let Some(tid) = table.add_thread(caller.pid, record) else {
            warn!("[thread] no thread record left for process {}", caller.pid);
            return Err(LinuxError::EAGAIN);
        };
        let kernel = self.clone();
        match self.scheduler.spawn(Box::new(move || thread_trampoline(kernel))) {
            Ok(ctx) => {
                table.bind(tid, ctx);
                debug!("[thread] process {} created thread {} on {}", caller.pid, tid, ctx);
                Ok(tid)
            }
            Err(err) => {
                table.discard_thread(tid);
                Err(err)
            }
        }
    }

    pub fn thread_self(&self) -> LinuxResult<Tid> {
        let table = self.table.lock();
        Ok(self.caller(&table)?.tid)
    }

    /// Wait for thread `target` of the calling process to exit and return
    /// its exit value. Fails with `EINVAL` if the thread is, or becomes,
    /// detached first.
    pub fn thread_join(&self, target: Tid) -> LinuxResult<i32> {
        let mut table = self.table.lock();
        let caller = self.caller(&table)?;
        let record = table
            .thread_of(caller.pid, target)
            .ok_or(LinuxError::ESRCH)?;
        if record.is_exited() {
            return Ok(record.exit_value());
        }
        if target == caller.tid {
            return Err(LinuxError::EDEADLK);
        }
        if record.is_detached() {
            return Err(LinuxError::EINVAL);
        }

        table.join_enter(target);
        while table
            .thread(target)
            .is_some_and(|record| !record.is_exited() && !record.is_detached())
        {
            table = self.wait_on(table, caller.ctx, WaitChannel::ThreadExit(target));
        }
        let value = table.join_leave(target);
        debug!("[thread] {} joined {}: {:?}", caller.tid, target, value);
        value.ok_or(LinuxError::EINVAL)
    }

    /// Make `target` unjoinable, releasing every pending joiner.
    pub fn thread_detach(&self, target: Tid) -> LinuxResult {
        let mut table = self.table.lock();
        let caller = self.caller(&table)?;
        let record = table
            .thread_of(caller.pid, target)
            .ok_or(LinuxError::ESRCH)?;
        if record.is_exited() || record.is_detached() {
            return Err(LinuxError::EINVAL);
        }
        let woken = table.detach(target);
        drop(table);
        debug!("[thread] {} detached", target);
        self.wake_all(woken);
        Ok(())
    }

    /// Terminate the calling thread with exit value `value`.
    pub fn thread_exit(&self, value: i32) -> ! {
        let table = self.table.lock();
        let caller = match self.caller(&table) {
            Ok(caller) => caller,
            Err(err) => panic!("[thread] no thread to exit: {:?}", err),
        };
        debug!("[thread] {} exiting with {}", caller.tid, value);
        self.finish_thread(table, caller, value)
    }

    /// Task and argument bytes the calling main thread has to run.
    pub(crate) fn main_entry(&self) -> LinuxResult<(Task, Vec<u8>)> {
        let table = self.table.lock();
        let caller = self.caller(&table)?;
        let process = table.get(caller.pid).ok_or(LinuxError::ESRCH)?;
        let task = process.main_task().cloned().ok_or(LinuxError::EINVAL)?;
        Ok((task, process.args().unwrap_or_default().to_vec()))
    }

    /// Task and argument bytes the calling secondary thread has to run.
    pub(crate) fn thread_entry(&self) -> LinuxResult<(Task, Vec<u8>)> {
        let table = self.table.lock();
        let caller = self.caller(&table)?;
        let record = table.thread(caller.tid).ok_or(LinuxError::ESRCH)?;
        let task = record.task().cloned().ok_or(LinuxError::EINVAL)?;
        Ok((task, record.args().unwrap_or_default().to_vec()))
    }

    /// Install `file` in the lowest free file id of the calling process.
    pub fn install_file(&self, file: FileRef) -> LinuxResult<usize> {
        let mut table = self.table.lock();
        let caller = self.caller(&table)?;
        table
            .install_file(caller.pid, file)
            .ok_or(LinuxError::EMFILE)
    }

    pub fn file(&self, fid: usize) -> LinuxResult<FileRef> {
        let table = self.table.lock();
        let caller = self.caller(&table)?;
        table
            .get(caller.pid)
            .and_then(|process| process.files().get(fid))
            .cloned()
            .ok_or(LinuxError::EBADF)
    }

    pub fn close_file(&self, fid: usize) -> LinuxResult {
        let mut table = self.table.lock();
        let caller = self.caller(&table)?;
        let closed = table
            .get_mut(caller.pid)
            .is_some_and(|process| process.files_mut().close(fid));
        if closed { Ok(()) } else { Err(LinuxError::EBADF) }
    }

    /// Snapshot of the first occupied slot at or after `cursor`.
    pub fn snapshot(&self, cursor: usize) -> Option<(usize, ProcInfo)> {
        self.table.lock().snapshot(cursor)
    }

    pub fn process_count(&self) -> usize {
        self.table.lock().process_count()
    }
}

/// Releases the adopted booting context.
struct Adopted<'a>(&'a dyn Scheduler);

impl Drop for Adopted<'_> {
    fn drop(&mut self) {
        self.0.release_current();
    }
}
