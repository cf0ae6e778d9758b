use crate::condvar::CondVar;
use crate::task::Task;
use crate::{ContextId, Pid};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// Handle of a thread record.
///
/// The generation is bumped each time an arena slot is freed, so a handle
/// kept past the record's release no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid {
    index: u32,
    generation: u32,
}

impl Tid {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

pub struct ThreadRecord {
    owner: Pid,
    context: Option<ContextId>,
    /// `None` for the main thread, whose entry is read from the process record.
    task: Option<Task>,
    args: Option<Box<[u8]>>,
    pub(crate) exit_value: i32,
    pub(crate) exited: bool,
    pub(crate) detached: bool,
    pub(crate) join_waiters: usize,
    pub(crate) exit_signal: CondVar,
}

impl ThreadRecord {
    /// Record of the thread running a process's entry task.
    pub fn main(owner: Pid) -> Self {
        Self::new(owner, None, None)
    }

    pub fn new(owner: Pid, task: Option<Task>, args: Option<Box<[u8]>>) -> Self {
        Self {
            owner,
            context: None,
            task,
            args,
            exit_value: 0,
            exited: false,
            detached: false,
            join_waiters: 0,
            exit_signal: CondVar::new(),
        }
    }

    pub fn owner(&self) -> Pid {
        self.owner
    }

    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    pub(crate) fn bind(&mut self, ctx: ContextId) {
        self.context = Some(ctx);
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn args(&self) -> Option<&[u8]> {
        self.args.as_deref()
    }

    pub fn arg_length(&self) -> usize {
        self.args.as_ref().map_or(0, |args| args.len())
    }

    pub fn exit_value(&self) -> i32 {
        self.exit_value
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn join_waiters(&self) -> usize {
        self.join_waiters
    }
}

struct Slot {
    generation: u32,
    record: Option<ThreadRecord>,
}

/// Arena owning every thread record of the kernel.
pub struct ThreadArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    capacity: usize,
}

impl ThreadArena {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `record`, returning its handle, or `None` when the arena is full.
    pub fn insert(&mut self, record: ThreadRecord) -> Option<Tid> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            return Some(Tid {
                index,
                generation: slot.generation,
            });
        }
        if self.slots.len() >= self.capacity {
            return None;
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        Some(Tid {
            index,
            generation: 0,
        })
    }

    pub fn get(&self, tid: Tid) -> Option<&ThreadRecord> {
        let slot = self.slots.get(tid.index as usize)?;
        if slot.generation != tid.generation {
            return None;
        }
        slot.record.as_ref()
    }

    pub fn get_mut(&mut self, tid: Tid) -> Option<&mut ThreadRecord> {
        let slot = self.slots.get_mut(tid.index as usize)?;
        if slot.generation != tid.generation {
            return None;
        }
        slot.record.as_mut()
    }

    /// Free the record behind `tid`. Its handle is dead afterwards.
    pub fn remove(&mut self, tid: Tid) -> Option<ThreadRecord> {
        let slot = self.slots.get_mut(tid.index as usize)?;
        if slot.generation != tid.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(tid.index);
        Some(record)
    }
}
