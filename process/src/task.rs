use alloc::sync::Arc;
use core::fmt;

type TaskFn = dyn Fn(&[u8]) -> i32 + Send + Sync;

/// Entry function of a process or thread. It receives the argument payload
/// and returns the exit value.
#[derive(Clone)]
pub struct Task(Arc<TaskFn>);

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[u8]) -> i32 + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[u8]) -> i32 {
        (self.0)(args)
    }

    /// Identity of the entry function, stable for as long as any clone lives.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({:#x})", self.id())
    }
}

impl<F> From<F> for Task
where
    F: Fn(&[u8]) -> i32 + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}
