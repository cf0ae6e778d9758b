//! The process table: fixed slots, the free-list allocator, and the
//! non-blocking steps of the process and thread state machine.
//!
//! Every method must be called with the kernel lock held.

use crate::condvar::CondVar;
use crate::files::FileRef;
use crate::info::{PROCINFO_MAX_ARGS_SIZE, ProcInfo};
use crate::process::{ProcessRecord, ProcessState};
use crate::task::Task;
use crate::thread::{ThreadArena, ThreadRecord, Tid};
use crate::{ContextId, INIT_PID, MAX_PROC, MAX_THREADS, NOPROC, Pid};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

pub struct ProcessTable {
    slots: Vec<ProcessRecord>,
    free: Vec<Pid>,
    count: usize,
    threads: ThreadArena,
    bindings: BTreeMap<ContextId, Tid>,
    /// Broadcast when a parentless process becomes a zombie.
    halt: CondVar,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new(MAX_PROC)
    }
}

impl ProcessTable {
    /// Create a table of `capacity` free slots. The free list hands out the
    /// lowest pid first.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > INIT_PID as usize && capacity <= MAX_PROC,
            "[process] table capacity {} out of range",
            capacity
        );
        Self {
            slots: (0..capacity).map(|_| ProcessRecord::new()).collect(),
            free: (0..capacity as Pid).rev().collect(),
            count: 0,
            threads: ThreadArena::new(MAX_THREADS),
            bindings: BTreeMap::new(),
            halt: CondVar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots that are not free.
    pub fn process_count(&self) -> usize {
        self.count
    }

    pub fn thread_records(&self) -> usize {
        self.threads.len()
    }

    /// Pop the head of the free list and mark it alive.
    pub fn acquire(&mut self) -> Option<Pid> {
        let pid = self.free.pop()?;
        let record = &mut self.slots[pid as usize];
        assert!(
            record.state == ProcessState::Free,
            "[process] free list holds pid {} in use",
            pid
        );
        record.state = ProcessState::Alive;
        self.count += 1;
        Some(pid)
    }

    /// Reset the slot and push it back on the free list.
    pub fn release(&mut self, pid: Pid) {
        let record = &mut self.slots[pid as usize];
        assert!(
            record.state != ProcessState::Free,
            "[process] process {} is already free",
            pid
        );
        record.reset();
        self.free.push(pid);
        self.count -= 1;
    }

    /// The record of `pid`, unless the slot is free.
    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.slots
            .get(pid as usize)
            .filter(|record| record.state != ProcessState::Free)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessRecord> {
        self.slots
            .get_mut(pid as usize)
            .filter(|record| record.state != ProcessState::Free)
    }

    fn record_mut(&mut self, pid: Pid) -> &mut ProcessRecord {
        match self.get_mut(pid) {
            Some(record) => record,
            None => panic!("[process] process {} is not in the table", pid),
        }
    }

    fn pair_mut(&mut self, a: Pid, b: Pid) -> (&mut ProcessRecord, &mut ProcessRecord) {
        assert_ne!(a, b);
        let (a, b) = (a as usize, b as usize);
        if a < b {
            let (low, high) = self.slots.split_at_mut(b);
            (&mut low[a], &mut high[0])
        } else {
            let (low, high) = self.slots.split_at_mut(a);
            (&mut high[0], &mut low[b])
        }
    }

    pub fn thread(&self, tid: Tid) -> Option<&ThreadRecord> {
        self.threads.get(tid)
    }

    /// The thread record `tid`, provided it belongs to process `pid`.
    pub fn thread_of(&self, pid: Pid, tid: Tid) -> Option<&ThreadRecord> {
        self.threads.get(tid).filter(|record| record.owner() == pid)
    }

    /// The thread record bound to execution context `ctx`.
    pub fn bound_thread(&self, ctx: ContextId) -> Option<Tid> {
        self.bindings.get(&ctx).copied()
    }

    pub fn is_child_of(&self, child: Pid, parent: Pid) -> bool {
        self.get(child)
            .is_some_and(|record| record.parent == Some(parent))
    }

    pub fn is_zombie(&self, pid: Pid) -> bool {
        self.get(pid).is_some_and(ProcessRecord::is_zombie)
    }

    /// Oldest zombie child of `pid`.
    pub fn first_exited(&self, pid: Pid) -> Option<Pid> {
        self.get(pid)?.exited.front().copied()
    }

    pub fn child_exit_signal(&mut self, pid: Pid) -> Option<&mut CondVar> {
        Some(&mut self.get_mut(pid)?.child_exit)
    }

    pub fn exit_signal(&mut self, tid: Tid) -> Option<&mut CondVar> {
        Some(&mut self.threads.get_mut(tid)?.exit_signal)
    }

    pub fn halt_signal(&mut self) -> &mut CondVar {
        &mut self.halt
    }

    /// Allocate a process record with its entry task and a private copy of
    /// `args`. The bootstrap processes (pid 0 and 1) stay parentless; any
    /// other process becomes a child of `parent` and inherits its open files.
    pub fn create_process(
        &mut self,
        parent: Option<Pid>,
        task: Option<Task>,
        args: Option<&[u8]>,
    ) -> Option<Pid> {
        let pid = self.acquire()?;
        match parent {
            Some(ppid) if pid > INIT_PID => {
                let (child, parent) = self.pair_mut(pid, ppid);
                child.parent = Some(ppid);
                parent.children.push_back(pid);
                child.files.inherit_from(&parent.files);
            }
            _ => {}
        }
        let record = self.record_mut(pid);
        record.main_task = task;
        record.arg_length = args.map_or(0, <[u8]>::len);
        record.args = args.map(Box::from);
        Some(pid)
    }

    /// Give back a process that never got a runnable thread.
    pub fn discard_process(&mut self, pid: Pid) {
        let threads = core::mem::take(&mut self.record_mut(pid).threads);
        for tid in threads {
            self.unlink_thread(tid);
        }
        let record = self.record_mut(pid);
        record.files.release_all();
        let parent = record.parent;
        if let Some(ppid) = parent {
            if let Some(parent) = self.get_mut(ppid) {
                parent.children.retain(|&child| child != pid);
            }
        }
        self.release(pid);
    }

    /// Install `file` in the open-file table of `pid`.
    pub fn install_file(&mut self, pid: Pid, file: FileRef) -> Option<usize> {
        self.get_mut(pid)?.files.install(file)
    }

    /// Append `record` to the thread collection of `pid`.
    pub fn add_thread(&mut self, pid: Pid, record: ThreadRecord) -> Option<Tid> {
        let tid = self.threads.insert(record)?;
        let process = self.record_mut(pid);
        process.threads.push(tid);
        process.thread_count += 1;
        Some(tid)
    }

    pub fn set_main_thread(&mut self, pid: Pid, tid: Tid) {
        self.record_mut(pid).main_thread = Some(tid);
    }

    /// Bind thread record and execution context to each other.
    pub fn bind(&mut self, tid: Tid, ctx: ContextId) {
        if let Some(record) = self.threads.get_mut(tid) {
            record.bind(ctx);
            self.bindings.insert(ctx, tid);
        }
    }

    pub fn unbind(&mut self, ctx: ContextId) -> Option<Tid> {
        self.bindings.remove(&ctx)
    }

    /// Undo [`ProcessTable::add_thread`] for a thread that never ran.
    pub fn discard_thread(&mut self, tid: Tid) {
        if let Some(record) = self.unlink_thread(tid) {
            let process = self.record_mut(record.owner());
            process.thread_count -= 1;
            if process.main_thread == Some(tid) {
                process.main_thread = None;
            }
        }
    }

    /// Remove the record from its owner's collection and free it.
    fn unlink_thread(&mut self, tid: Tid) -> Option<ThreadRecord> {
        let record = self.threads.remove(tid)?;
        if let Some(process) = self.get_mut(record.owner()) {
            process.threads.retain(|&t| t != tid);
        }
        if let Some(ctx) = record.context() {
            if self.bindings.get(&ctx) == Some(&tid) {
                self.bindings.remove(&ctx);
            }
        }
        trace!("[thread] record {} released", tid);
        Some(record)
    }

    /// Mark `tid` exited with `value` and broadcast its exit signal. The record
    /// is freed at once if nobody is joining it.
    pub fn mark_exited(&mut self, tid: Tid, value: i32) -> Vec<ContextId> {
        let Some(record) = self.threads.get_mut(tid) else {
            return Vec::new();
        };
        record.exit_value = value;
        record.exited = true;
        let woken = record.exit_signal.broadcast();
        if record.join_waiters == 0 {
            self.unlink_thread(tid);
        }
        woken
    }

    /// Drop one live thread from `pid`'s count, returning the count left.
    pub fn retire_thread(&mut self, pid: Pid) -> usize {
        let process = self.record_mut(pid);
        assert!(
            process.thread_count > 0,
            "[process] process {} has no live thread to retire",
            pid
        );
        process.thread_count -= 1;
        process.thread_count
    }

    /// Register one more joiner of `tid`.
    pub fn join_enter(&mut self, tid: Tid) {
        if let Some(record) = self.threads.get_mut(tid) {
            record.join_waiters += 1;
        }
    }

    /// Deregister a joiner of `tid`, returning `Some(exit_value)` if the
    /// thread exited or `None` if the join was released by a detach. The last
    /// joiner of an exited thread frees its record.
    pub fn join_leave(&mut self, tid: Tid) -> Option<i32> {
        let record = self.threads.get_mut(tid)?;
        record.join_waiters = record.join_waiters.saturating_sub(1);
        let result = record.exited.then_some(record.exit_value);
        if record.exited && record.join_waiters == 0 {
            self.unlink_thread(tid);
        }
        result
    }

    /// Mark `tid` detached and release every pending joiner.
    pub fn detach(&mut self, tid: Tid) -> Vec<ContextId> {
        match self.threads.get_mut(tid) {
            Some(record) => {
                record.detached = true;
                record.exit_signal.broadcast()
            }
            None => Vec::new(),
        }
    }

    /// Record the code passed to `Exit`; it wins over the code of whichever
    /// thread happens to be the last to finish.
    pub fn record_exit_code(&mut self, pid: Pid, code: i32) {
        self.record_mut(pid).exit_code = Some(code);
    }

    /// Turn `pid`, whose last thread just finished, into a zombie: free its
    /// arguments and files, hand its children to init, queue it on its
    /// parent's exited list. Children left behind by init itself become
    /// parentless. Returns the contexts to wake.
    pub fn zombify(&mut self, pid: Pid, code: i32) -> Vec<ContextId> {
        let mut woken = Vec::new();
        let record = self.record_mut(pid);
        assert!(
            record.state == ProcessState::Alive,
            "[process] process {} is already exited",
            pid
        );
        assert!(
            record.thread_count == 0,
            "[process] process {} still has {} live threads",
            pid,
            record.thread_count
        );
        record.args = None;
        record.arg_length = 0;
        record.files.release_all();
        let leftover = core::mem::take(&mut record.threads);
        let parent = record.parent;
        for tid in leftover {
            self.unlink_thread(tid);
        }

        woken.extend(self.reparent_children(pid));

        let record = self.record_mut(pid);
        record.main_thread = None;
        record.state = ProcessState::Zombie;
        record.exit_code.get_or_insert(code);

        match parent {
            Some(ppid) => {
                let parent = self.record_mut(ppid);
                parent.exited.push_back(pid);
                woken.extend(parent.child_exit.broadcast());
            }
            None => {
                woken.extend(self.halt.broadcast());
                if pid > INIT_PID {
                    // an orphan nobody can reap
                    self.release(pid);
                }
            }
        }
        woken
    }

    fn reparent_children(&mut self, pid: Pid) -> Vec<ContextId> {
        let record = self.record_mut(pid);
        let children = core::mem::take(&mut record.children);
        let exited = core::mem::take(&mut record.exited);
        if children.is_empty() {
            return Vec::new();
        }

        let reaper = self
            .get(INIT_PID)
            .filter(|init| pid != INIT_PID && init.is_alive())
            .map(|_| INIT_PID);
        for &child in &children {
            self.record_mut(child).parent = reaper;
        }
        match reaper {
            Some(init) => {
                let init = self.record_mut(init);
                init.children.extend(children);
                if exited.is_empty() {
                    return Vec::new();
                }
                init.exited.extend(exited);
                init.child_exit.broadcast()
            }
            None => {
                warn!("[process] no reaper for the children of process {}", pid);
                for zombie in exited {
                    self.release(zombie);
                }
                Vec::new()
            }
        }
    }

    /// Reap zombie `child` of `parent`: unlink it from both of the parent's
    /// lists and free its slot. Returns its exit code.
    pub fn reap(&mut self, parent: Pid, child: Pid) -> i32 {
        assert!(
            self.is_zombie(child),
            "[process] process {} is not exited",
            child
        );
        let code = self.record_mut(child).exit_code.unwrap_or(0);
        let parent = self.record_mut(parent);
        parent.children.retain(|&pid| pid != child);
        parent.exited.retain(|&pid| pid != child);
        self.release(child);
        code
    }

    /// Reap a parentless zombie, i.e. the init process at shutdown.
    pub fn reap_parentless(&mut self, pid: Pid) -> Option<i32> {
        let record = self.get(pid).filter(|record| record.is_zombie() && record.parent.is_none())?;
        let code = record.exit_code.unwrap_or(0);
        self.release(pid);
        Some(code)
    }

    /// Snapshot of the first non-free slot at or after `cursor`, with the
    /// cursor to resume from.
    pub fn snapshot(&self, cursor: usize) -> Option<(usize, ProcInfo)> {
        let (index, record) = self
            .slots
            .iter()
            .enumerate()
            .skip(cursor)
            .find(|(_, record)| record.state != ProcessState::Free)?;
        let mut args = [0; PROCINFO_MAX_ARGS_SIZE];
        let carried = record.args().unwrap_or_default();
        let len = carried.len().min(PROCINFO_MAX_ARGS_SIZE);
        args[..len].copy_from_slice(&carried[..len]);
        let info = ProcInfo {
            pid: index as Pid,
            ppid: record.parent.unwrap_or(NOPROC),
            alive: record.is_alive(),
            thread_count: record.thread_count as u32,
            main_task: record.main_task().map_or(0, |task| task.id() as u64),
            argl: record.arg_length as u32,
            args,
        };
        Some((index + 1, info))
    }
}
