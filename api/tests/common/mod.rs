#![allow(dead_code)]

use std::sync::{Arc, Condvar, Mutex};
use tinyk_api::Task;
use tinyk_core::host::HostScheduler;
use tinyk_core::{Kernel, KernelConfig};

/// Boot a fresh kernel running `init` and return init's exit code.
pub fn boot<F>(init: F) -> i32
where
    F: Fn(&[u8]) -> i32 + Send + Sync + 'static,
{
    boot_with(HostScheduler::new(), KernelConfig::default(), init)
}

pub fn boot_with<F>(scheduler: HostScheduler, config: KernelConfig, init: F) -> i32
where
    F: Fn(&[u8]) -> i32 + Send + Sync + 'static,
{
    let kernel = Kernel::with_config(Arc::new(scheduler), config);
    let code = kernel.boot(Task::new(init), None).expect("boot failed");
    assert_eq!(kernel.process_count(), 1, "only the idle process is left");
    code
}

/// One-shot latch a task can block on with a plain host wait.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (open, cond) = &*self.0;
        *open.lock().unwrap() = true;
        cond.notify_all();
    }

    pub fn wait(&self) {
        let (open, cond) = &*self.0;
        let mut open = open.lock().unwrap();
        while !*open {
            open = cond.wait(open).unwrap();
        }
    }
}
