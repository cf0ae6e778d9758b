#[macro_use]
extern crate log;

mod logger;

use std::sync::Arc;
use tinyk_api::imp::fs::{sys_close, sys_open_info, sys_read};
use tinyk_api::imp::task::{
    sys_create_thread, sys_exec, sys_getpid, sys_thread_join, sys_wait_child,
};
use tinyk_api::{NOPROC, Task};
use tinyk_core::Kernel;
use tinyk_core::host::HostScheduler;
use tinyk_process::info::ProcInfo;

fn worker(args: &[u8]) -> i32 {
    let pid = sys_getpid().unwrap_or(NOPROC);
    info!(
        "[demo] worker {} started with {:?}",
        pid,
        String::from_utf8_lossy(args)
    );
    let helper = sys_create_thread(Task::new(|args| args.len() as i32), Some(args));
    let mut value = 0;
    match helper {
        Ok(tid) => {
            if let Err(err) = sys_thread_join(tid, Some(&mut value)) {
                warn!("[demo] worker {} cannot join {}: {:?}", pid, tid, err);
            }
        }
        Err(err) => warn!("[demo] worker {} has no helper: {:?}", pid, err),
    }
    value
}

fn print_listing() {
    let Ok(fid) = sys_open_info() else {
        return;
    };
    let mut buf = [0; ProcInfo::SIZE];
    println!("{:>5} {:>10} {:>6} {:>7}  args", "pid", "ppid", "state", "threads");
    while let Ok(ProcInfo::SIZE) = sys_read(fid, &mut buf) {
        let Some(info) = ProcInfo::decode(&buf) else {
            break;
        };
        println!(
            "{:>5} {:>10} {:>6} {:>7}  {}",
            info.pid,
            info.ppid,
            if info.alive { "alive" } else { "zombie" },
            info.thread_count,
            String::from_utf8_lossy(info.args())
        );
    }
    if let Err(err) = sys_close(fid) {
        warn!("[demo] cannot close the listing: {:?}", err);
    }
}

fn init(_args: &[u8]) -> i32 {
    for name in ["alpha", "beta", "gamma"] {
        if let Err(err) = sys_exec(Some(Task::new(worker)), Some(name.as_bytes())) {
            warn!("[demo] cannot start {}: {:?}", name, err);
        }
    }
    print_listing();
    let mut status = 0;
    while let Ok(pid) = sys_wait_child(None, Some(&mut status)) {
        info!("[demo] child {} exited with {}", pid, status);
    }
    0
}

fn main() {
    logger::init();
    let kernel = Kernel::new(Arc::new(HostScheduler::new()));
    match kernel.boot(Task::new(init), Some(b"init")) {
        Ok(code) => info!("[demo] init exited with code {}", code),
        Err(err) => error!("[demo] boot failed: {:?}", err),
    }
}
