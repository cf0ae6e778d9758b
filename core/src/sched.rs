//! The execution-context capability consumed by the kernel.

use alloc::boxed::Box;
use axerrno::LinuxResult;
use tinyk_process::ContextId;

/// Body of a new execution context.
pub type ContextEntry = Box<dyn FnOnce() + Send + 'static>;

/// Unwinding payload of a context that terminated itself through
/// [`Scheduler::exit_current`]. Code catching panics around user tasks must
/// let it through.
#[derive(Debug)]
pub struct ContextExit;

pub trait Scheduler: Send + Sync {
    /// Create a context running `entry`. The context may start at once.
    fn spawn(&self, entry: ContextEntry) -> LinuxResult<ContextId>;

    /// Make `ctx` runnable. Returns `false` if no such context exists.
    ///
    /// A wakeup delivered to a context that is not asleep is remembered and
    /// consumed by its next [`Scheduler::sleep`].
    fn wakeup(&self, ctx: ContextId) -> bool;

    /// The context the caller runs in, if it belongs to this scheduler.
    fn current(&self) -> Option<ContextId>;

    /// Suspend the current context until it is woken.
    fn sleep(&self);

    /// Terminate the current context. Never returns.
    fn exit_current(&self) -> !;

    /// Register the calling thread of execution as a context, so it can
    /// sleep and be woken like any other.
    fn adopt_current(&self) -> ContextId;

    /// Undo [`Scheduler::adopt_current`].
    fn release_current(&self);
}
