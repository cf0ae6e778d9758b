//! System-call surface of the kernel.
//!
//! Every call acts on behalf of the process and thread bound to the calling
//! execution context; called from anywhere else it fails with `EPERM`.

extern crate alloc;
#[macro_use]
extern crate log;

pub mod imp;

pub use tinyk_process::task::Task;
pub use tinyk_process::thread::Tid;
pub use tinyk_process::{NOPROC, Pid};
