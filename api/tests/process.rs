mod common;

use axerrno::LinuxError;
use common::{Gate, boot, boot_with};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tinyk_api::imp::fs::{sys_close, sys_open_info, sys_read};
use tinyk_api::imp::task::*;
use tinyk_api::{NOPROC, Pid, Task};
use tinyk_core::{Kernel, KernelConfig};
use tinyk_core::host::HostScheduler;
use tinyk_process::INIT_PID;
use tinyk_process::info::ProcInfo;

fn listing() -> Vec<ProcInfo> {
    let fid = sys_open_info().unwrap();
    let mut buf = [0; ProcInfo::SIZE];
    let mut entries = Vec::new();
    while sys_read(fid, &mut buf).unwrap() == ProcInfo::SIZE {
        entries.push(ProcInfo::decode(&buf).unwrap());
    }
    sys_close(fid).unwrap();
    entries
}

/// Whether the listing shows `pid` as a zombie.
fn is_zombie(pid: Pid) -> bool {
    listing()
        .iter()
        .any(|info| info.pid == pid && !info.alive)
}

#[test]
fn test_init_gets_pid_one_and_its_exit_code_is_returned() {
    let code = boot(|_| {
        assert_eq!(sys_getpid(), Ok(INIT_PID));
        assert_eq!(sys_getppid(), Ok(NOPROC));
        17
    });
    assert_eq!(code, 17);
}

#[test]
fn test_syscalls_outside_a_process_fail() {
    assert_eq!(sys_getpid(), Err(LinuxError::EPERM));
    assert_eq!(
        sys_exec(Some(Task::new(|_| 0)), None),
        Err(LinuxError::EPERM)
    );
}

#[test]
fn test_child_sees_parent_and_its_args() {
    let code = boot(|_| {
        let child = sys_exec(
            Some(Task::new(|args| {
                assert_eq!(args, b"hello");
                assert_eq!(sys_getppid(), Ok(INIT_PID));
                assert_ne!(sys_getpid(), Ok(INIT_PID));
                3
            })),
            Some(b"hello"),
        )
        .unwrap();
        let mut status = 0;
        assert_eq!(sys_wait_child(Some(child), Some(&mut status)), Ok(child));
        assert_eq!(status, 3);
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_grandchild_is_reparented_to_init() {
    let code = boot(|_| {
        let grandchild = Arc::new(AtomicU32::new(NOPROC));
        let release = Gate::default();

        let task_a = {
            let grandchild = grandchild.clone();
            let release = release.clone();
            Task::new(move |_| {
                let grandchild_b = grandchild.clone();
                let release_c = release.clone();
                let b = sys_exec(
                    Some(Task::new(move |_| {
                        let release = release_c.clone();
                        let c = sys_exec(
                            Some(Task::new(move |_| {
                                release.wait();
                                assert_eq!(sys_getppid(), Ok(INIT_PID));
                                9
                            })),
                            None,
                        )
                        .unwrap();
                        grandchild_b.store(c, Ordering::SeqCst);
                        7
                    })),
                    None,
                )
                .unwrap();
                let mut status = 0;
                assert_eq!(sys_wait_child(Some(b), Some(&mut status)), Ok(b));
                assert_eq!(status, 7);
                let c = grandchild.load(Ordering::SeqCst);
                assert_eq!(sys_wait_child(Some(c), None), Err(LinuxError::ECHILD));
                assert_eq!(sys_wait_child(None, None), Err(LinuxError::ECHILD));
                release.open();
                0
            })
        };

        let a = sys_exec(Some(task_a), None).unwrap();
        let mut status = -1;
        assert_eq!(sys_wait_child(Some(a), Some(&mut status)), Ok(a));
        assert_eq!(status, 0);
        let c = grandchild.load(Ordering::SeqCst);
        assert_eq!(sys_wait_child(None, Some(&mut status)), Ok(c));
        assert_eq!(status, 9);
        assert_eq!(sys_wait_child(None, None), Err(LinuxError::ECHILD));
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_zombie_children_of_exiting_process_go_to_init() {
    let code = boot(|_| {
        let grandchild = Arc::new(AtomicU32::new(NOPROC));
        let shared = grandchild.clone();
        let b = sys_exec(
            Some(Task::new(move |_| {
                let c = sys_exec(Some(Task::new(|_| 5)), None).unwrap();
                shared.store(c, Ordering::SeqCst);
                while !is_zombie(c) {
                    thread::yield_now();
                }
                // exits without reaping c
                6
            })),
            None,
        )
        .unwrap();

        let mut reaped = Vec::new();
        let mut status = 0;
        while let Ok(pid) = sys_wait_child(None, Some(&mut status)) {
            reaped.push((pid, status));
        }
        let c = grandchild.load(Ordering::SeqCst);
        reaped.sort();
        let mut expected = vec![(b, 6), (c, 5)];
        expected.sort();
        assert_eq!(reaped, expected);
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_two_waiters_reap_a_child_exactly_once() {
    let code = boot(|_| {
        let parent = sys_exec(
            Some(Task::new(|_| {
                let release = Gate::default();
                let gate = release.clone();
                let child = sys_exec(
                    Some(Task::new(move |_| {
                        gate.wait();
                        5
                    })),
                    None,
                )
                .unwrap();

                let successes = Arc::new(AtomicUsize::new(0));
                let waiter = {
                    let successes = successes.clone();
                    Task::new(move |_| {
                        let mut status = 0;
                        match sys_wait_child(Some(child), Some(&mut status)) {
                            Ok(pid) => {
                                assert_eq!((pid, status), (child, 5));
                                successes.fetch_add(1, Ordering::SeqCst);
                                0
                            }
                            Err(err) => {
                                assert_eq!(err, LinuxError::ECHILD);
                                1
                            }
                        }
                    })
                };
                let first = sys_create_thread(waiter.clone(), None).unwrap();
                let second = sys_create_thread(waiter, None).unwrap();
                release.open();

                let (mut a, mut b) = (-1, -1);
                sys_thread_join(first, Some(&mut a)).unwrap();
                sys_thread_join(second, Some(&mut b)).unwrap();
                assert_eq!(a + b, 1);
                assert_eq!(successes.load(Ordering::SeqCst), 1);
                0
            })),
            None,
        )
        .unwrap();
        let mut status = -1;
        sys_wait_child(Some(parent), Some(&mut status)).unwrap();
        status
    });
    assert_eq!(code, 0);
}

#[test]
fn test_wait_on_non_child_fails() {
    let code = boot(|_| {
        assert_eq!(sys_wait_child(None, None), Err(LinuxError::ECHILD));
        assert_eq!(sys_wait_child(Some(0), None), Err(LinuxError::ECHILD));
        assert_eq!(sys_wait_child(Some(INIT_PID), None), Err(LinuxError::ECHILD));
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_exit_from_any_thread_sets_the_exit_code() {
    let code = boot(|_| {
        let child = sys_exec(
            Some(Task::new(|_| {
                sys_create_thread(Task::new(|_| sys_exit(3)), None).unwrap();
                // the main thread leaves without exiting the process
                sys_thread_exit(99)
            })),
            None,
        )
        .unwrap();
        let mut status = 0;
        sys_wait_child(Some(child), Some(&mut status)).unwrap();
        status
    });
    assert_eq!(code, 3);
}

#[test]
fn test_panicking_task_exits_with_minus_one() {
    let code = boot(|_| {
        let child = sys_exec(Some(Task::new(|_| panic!("task failure"))), None).unwrap();
        let mut status = 0;
        sys_wait_child(Some(child), Some(&mut status)).unwrap();
        status
    });
    assert_eq!(code, -1);
}

#[test]
fn test_exec_fails_when_table_is_full() {
    let config = KernelConfig { max_proc: 3 };
    let code = boot_with(HostScheduler::new(), config, |_| {
        let gate = Gate::default();
        let release = gate.clone();
        let child = sys_exec(
            Some(Task::new(move |_| {
                release.wait();
                0
            })),
            None,
        )
        .unwrap();
        assert_eq!(
            sys_exec(Some(Task::new(|_| 0)), None),
            Err(LinuxError::EAGAIN)
        );
        gate.open();
        sys_wait_child(Some(child), None).unwrap();
        // the slot is free again
        let again = sys_exec(Some(Task::new(|_| 0)), None).unwrap();
        assert_eq!(again, child);
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_exec_fails_when_no_context_can_be_spawned() {
    // the booting thread and init's main thread
    let scheduler = HostScheduler::with_limit(2);
    let code = boot_with(scheduler, KernelConfig::default(), |_| {
        assert_eq!(
            sys_exec(Some(Task::new(|_| 0)), None),
            Err(LinuxError::EAGAIN)
        );
        assert_eq!(
            sys_create_thread(Task::new(|_| 0), None),
            Err(LinuxError::EAGAIN)
        );
        assert_eq!(sys_wait_child(None, None), Err(LinuxError::ECHILD));
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_init_reaps_leftover_children_when_it_returns() {
    let code = boot(|_| {
        for _ in 0..2 {
            sys_exec(
                Some(Task::new(|_| {
                    thread::sleep(Duration::from_millis(20));
                    1
                })),
                None,
            )
            .unwrap();
        }
        let finished: Vec<_> = (0..3)
            .map(|code| sys_exec(Some(Task::new(move |_| code)), None).unwrap())
            .collect();
        for &pid in &finished {
            while !is_zombie(pid) {
                thread::yield_now();
            }
        }
        // returns without waiting for anyone
        11
    });
    assert_eq!(code, 11);
}

#[test]
fn test_init_leaving_by_thread_exit_orphans_its_children() {
    let kernel = Kernel::new(Arc::new(HostScheduler::new()));
    let release = Gate::default();
    let seen_parent = Arc::new(AtomicU32::new(INIT_PID));
    let init = {
        let release = release.clone();
        let seen_parent = seen_parent.clone();
        Task::new(move |_| {
            let release = release.clone();
            let seen_parent = seen_parent.clone();
            sys_exec(
                Some(Task::new(move |_| {
                    release.wait();
                    seen_parent.store(sys_getppid().unwrap_or(INIT_PID), Ordering::SeqCst);
                    5
                })),
                None,
            )
            .unwrap();
            sys_exec(Some(Task::new(|_| 6)), None).unwrap();
            sys_thread_exit(4)
        })
    };
    assert_eq!(kernel.boot(init, None), Ok(4));

    release.open();
    while kernel.process_count() > 1 {
        thread::yield_now();
    }
    assert_eq!(seen_parent.load(Ordering::SeqCst), NOPROC);
}

#[test]
fn test_exec_without_task_creates_an_inert_process() {
    let kernel = Kernel::new(Arc::new(HostScheduler::new()));
    let inert = Arc::new(AtomicU32::new(NOPROC));
    let shared = inert.clone();
    let init = Task::new(move |_| {
        let shared = shared.clone();
        let child = sys_exec(
            Some(Task::new(move |_| {
                let pid = sys_exec(None, Some(b"inert")).unwrap();
                shared.store(pid, Ordering::SeqCst);
                let info = listing().into_iter().find(|info| info.pid == pid).unwrap();
                assert!(info.alive);
                assert_eq!(info.thread_count, 0);
                assert_eq!(Ok(info.ppid), sys_getpid());
                assert_eq!(info.args(), b"inert");
                0
            })),
            None,
        )
        .unwrap();
        let mut status = -1;
        let _ = sys_wait_child(Some(child), Some(&mut status));
        // the inert process never exits, so init leaves without draining
        sys_thread_exit(status)
    });
    assert_eq!(kernel.boot(init, None), Ok(0));

    let pid = inert.load(Ordering::SeqCst);
    assert_eq!(kernel.process_count(), 2);
    let (_, info) = kernel.snapshot(pid as usize).unwrap();
    assert_eq!(info.pid, pid);
    assert!(info.alive);
    assert_eq!(info.ppid, NOPROC);
}
