//! Process and thread records of the kernel.
//! The process table is a fixed array of slots, each `Free`, `Alive` or `Zombie`.
//! A process owns thread records, child processes and an open-file table.
//! Thread records live in an arena and are named by generation-checked handles,
//! so a stale handle never aliases a newer record.
//!
//! Nothing in this crate blocks. Every mutation is a plain `&mut` step and the
//! caller is expected to serialize them behind one kernel lock; steps that
//! broadcast a condition variable hand back the contexts to wake.
#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

pub mod condvar;
pub mod files;
pub mod info;
pub mod process;
pub mod table;
pub mod task;
pub mod thread;

/// Process ID, the index of the process slot in the table.
pub type Pid = u32;

/// Reported where a process id is required but there is no process,
/// e.g. the parent of a parentless process.
pub const NOPROC: Pid = Pid::MAX;

/// Pid of the idle (scheduler) process created at bootstrap.
pub const IDLE_PID: Pid = 0;

/// Pid of the init process, the reaper of every orphan.
pub const INIT_PID: Pid = 1;

/// Upper bound on the process table capacity.
pub const MAX_PROC: usize = 256;

/// Number of open-file slots of a process.
pub const MAX_FILEID: usize = 16;

/// Capacity of the thread record arena.
pub const MAX_THREADS: usize = 4096;

/// Opaque handle of a scheduler-level execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(pub u64);

impl core::fmt::Display for ContextId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}
