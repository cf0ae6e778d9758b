use crate::Pid;
use crate::condvar::CondVar;
use crate::files::FileTable;
use crate::task::Task;
use crate::thread::Tid;
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The slot is on the free list.
    Free,
    Alive,
    /// No live threads left, waiting to be reaped by the parent.
    Zombie,
}

pub struct ProcessRecord {
    pub(crate) state: ProcessState,
    pub(crate) parent: Option<Pid>,
    pub(crate) thread_count: usize,
    pub(crate) main_thread: Option<Tid>,
    pub(crate) main_task: Option<Task>,
    pub(crate) args: Option<Box<[u8]>>,
    pub(crate) arg_length: usize,
    /// Children that are alive or not yet reaped.
    pub(crate) children: VecDeque<Pid>,
    /// Zombie children, in order of death.
    pub(crate) exited: VecDeque<Pid>,
    pub(crate) threads: Vec<Tid>,
    pub(crate) child_exit: CondVar,
    pub(crate) files: FileTable,
    pub(crate) exit_code: Option<i32>,
}

impl ProcessRecord {
    pub(crate) const fn new() -> Self {
        Self {
            state: ProcessState::Free,
            parent: None,
            thread_count: 0,
            main_thread: None,
            main_task: None,
            args: None,
            arg_length: 0,
            children: VecDeque::new(),
            exited: VecDeque::new(),
            threads: Vec::new(),
            child_exit: CondVar::new(),
            files: FileTable::new(),
            exit_code: None,
        }
    }

    /// Return the record to its pristine, free form.
    pub(crate) fn reset(&mut self) {
        debug_assert!(self.children.is_empty() && self.exited.is_empty());
        debug_assert!(self.files.occupied() == 0);
        *self = Self::new();
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == ProcessState::Alive
    }

    pub fn is_zombie(&self) -> bool {
        self.state == ProcessState::Zombie
    }

    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn main_thread(&self) -> Option<Tid> {
        self.main_thread
    }

    pub fn main_task(&self) -> Option<&Task> {
        self.main_task.as_ref()
    }

    pub fn args(&self) -> Option<&[u8]> {
        self.args.as_deref()
    }

    pub fn arg_length(&self) -> usize {
        self.arg_length
    }

    pub fn children(&self) -> impl Iterator<Item = Pid> + '_ {
        self.children.iter().copied()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn exited_children(&self) -> impl Iterator<Item = Pid> + '_ {
        self.exited.iter().copied()
    }

    pub fn threads(&self) -> &[Tid] {
        &self.threads
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut FileTable {
        &mut self.files
    }

    /// Exit code of a zombie; `None` while no exit code was recorded.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}
