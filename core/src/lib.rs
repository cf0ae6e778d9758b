//! Kernel core: the process monitor and the execution contexts it drives.

extern crate alloc;
#[macro_use]
extern crate log;

pub mod file;
pub mod host;
pub mod kernel;
pub mod sched;
pub mod task;

pub use kernel::{Kernel, KernelConfig, WaitTarget};
