//! A [`Scheduler`] backed by host threads: every execution context is an OS
//! thread, parked on its own wakeup cell while asleep.

use crate::sched::{ContextEntry, ContextExit, Scheduler};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::sync::Arc;
use axerrno::{LinuxError, LinuxResult};
use core::cell::RefCell;
use core::sync::atomic::{AtomicU64, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use tinyk_process::ContextId;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Sticky wakeup flag of one context.
#[derive(Default)]
struct WakeCell {
    woken: Mutex<bool>,
    cond: Condvar,
}

impl WakeCell {
    fn notify(&self) {
        *self.woken.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_one();
    }

    fn wait(&self) {
        let mut woken = self.woken.lock().unwrap_or_else(PoisonError::into_inner);
        while !*woken {
            woken = self
                .cond
                .wait(woken)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *woken = false;
    }
}

type Registry = Mutex<BTreeMap<ContextId, Arc<WakeCell>>>;

thread_local! {
    static CURRENT: RefCell<Option<(ContextId, Arc<WakeCell>)>> = const { RefCell::new(None) };
}

fn current_cell() -> Option<(ContextId, Arc<WakeCell>)> {
    CURRENT.with(|current| current.borrow().clone())
}

pub struct HostScheduler {
    contexts: Arc<Registry>,
    limit: usize,
}

impl Default for HostScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostScheduler {
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// A scheduler refusing to hold more than `limit` live contexts.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            contexts: Arc::new(Mutex::new(BTreeMap::new())),
            limit,
        }
    }

    pub fn live_contexts(&self) -> usize {
        self.registry().len()
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<ContextId, Arc<WakeCell>>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self) -> LinuxResult<(ContextId, Arc<WakeCell>)> {
        let mut contexts = self.registry();
        if contexts.len() >= self.limit {
            warn!("[sched] context limit {} reached", self.limit);
            return Err(LinuxError::EAGAIN);
        }
        let ctx = ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed));
        let cell = Arc::new(WakeCell::default());
        contexts.insert(ctx, cell.clone());
        Ok((ctx, cell))
    }
}

impl Scheduler for HostScheduler {
    fn spawn(&self, entry: ContextEntry) -> LinuxResult<ContextId> {
        let (ctx, cell) = self.register()?;
        let contexts = self.contexts.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}", ctx))
            .spawn(move || {
                CURRENT.with(|current| *current.borrow_mut() = Some((ctx, cell)));
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
                    if !payload.is::<ContextExit>() {
                        error!("[sched] {} terminated by a panic", ctx);
                    }
                }
                CURRENT.with(|current| current.borrow_mut().take());
                contexts
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&ctx);
                trace!("[sched] {} finished", ctx);
            });
        match spawned {
            Ok(_) => {
                trace!("[sched] {} spawned", ctx);
                Ok(ctx)
            }
            Err(err) => {
                warn!("[sched] failed to start {}: {}", ctx, err);
                self.registry().remove(&ctx);
                Err(LinuxError::EAGAIN)
            }
        }
    }

    fn wakeup(&self, ctx: ContextId) -> bool {
        let cell = self.registry().get(&ctx).cloned();
        match cell {
            Some(cell) => {
                cell.notify();
                true
            }
            None => false,
        }
    }

    fn current(&self) -> Option<ContextId> {
        let (ctx, _) = current_cell()?;
        self.registry().contains_key(&ctx).then_some(ctx)
    }

    fn sleep(&self) {
        match current_cell() {
            Some((_, cell)) => cell.wait(),
            None => thread::yield_now(),
        }
    }

    fn exit_current(&self) -> ! {
        panic::resume_unwind(alloc::boxed::Box::new(ContextExit))
    }

    fn adopt_current(&self) -> ContextId {
        if let Some(ctx) = self.current() {
            return ctx;
        }
        let ctx = ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed));
        let cell = Arc::new(WakeCell::default());
        self.registry().insert(ctx, cell.clone());
        CURRENT.with(|current| *current.borrow_mut() = Some((ctx, cell)));
        ctx
    }

    fn release_current(&self) {
        if let Some((ctx, _)) = CURRENT.with(|current| current.borrow_mut().take()) {
            self.registry().remove(&ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_wakeup_before_sleep_is_not_lost() {
        let sched = HostScheduler::new();
        let ctx = sched.adopt_current();
        assert!(sched.wakeup(ctx));
        // returns at once: the wakeup is pending
        sched.sleep();
        sched.release_current();
        assert!(!sched.wakeup(ctx));
    }

    #[test]
    fn test_spawned_context_runs_and_unregisters() {
        let sched = Arc::new(HostScheduler::new());
        let (tx, rx) = mpsc::channel();
        let inner = sched.clone();
        let ctx = sched
            .spawn(alloc::boxed::Box::new(move || {
                tx.send(inner.current()).unwrap();
                inner.exit_current();
            }))
            .unwrap();
        assert_eq!(rx.recv().unwrap(), Some(ctx));
        while sched.live_contexts() > 0 {
            thread::yield_now();
        }
    }

    #[test]
    fn test_spawn_respects_limit() {
        let sched = HostScheduler::with_limit(1);
        let ctx = sched.adopt_current();
        assert_eq!(sched.current(), Some(ctx));
        assert_eq!(
            sched.spawn(alloc::boxed::Box::new(|| {})).err(),
            Some(LinuxError::EAGAIN)
        );
        sched.release_current();
        assert_eq!(sched.current(), None);
    }
}
