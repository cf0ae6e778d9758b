use crate::ContextId;
use alloc::vec::Vec;

/// Waiter list of a condition variable.
///
/// Waiting and waking are done by the kernel monitor: a waiter enqueues its
/// context under the kernel lock, releases the lock and sleeps; a broadcast
/// drains the list and the kernel wakes every drained context. Waiters always
/// re-check their predicate, since one list is shared by unrelated waiters.
#[derive(Debug, Default)]
pub struct CondVar {
    waiters: Vec<ContextId>,
}

impl CondVar {
    pub const fn new() -> Self {
        Self {
            waiters: Vec::new(),
        }
    }

    /// Register `ctx` as a waiter. A context that woke spuriously and waits
    /// again is not queued twice.
    pub fn enqueue(&mut self, ctx: ContextId) {
        if !self.waiters.contains(&ctx) {
            self.waiters.push(ctx);
        }
    }

    /// Take every waiter out of the list, for a broadcast.
    pub fn broadcast(&mut self) -> Vec<ContextId> {
        core::mem::take(&mut self.waiters)
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_deduplicates() {
        let mut cv = CondVar::new();
        cv.enqueue(ContextId(3));
        cv.enqueue(ContextId(3));
        cv.enqueue(ContextId(4));
        assert_eq!(cv.waiter_count(), 2);
    }

    #[test]
    fn test_broadcast_drains() {
        let mut cv = CondVar::new();
        cv.enqueue(ContextId(1));
        cv.enqueue(ContextId(2));
        assert_eq!(cv.broadcast(), [ContextId(1), ContextId(2)]);
        assert!(cv.is_empty());
        assert!(cv.broadcast().is_empty());
    }
}
