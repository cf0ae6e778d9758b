mod common;

use axerrno::{LinuxError, LinuxResult};
use common::boot;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tinyk_api::imp::fs::*;
use tinyk_api::imp::task::*;
use tinyk_api::{NOPROC, Task};
use tinyk_core::file::StreamObject;
use tinyk_process::info::ProcInfo;
use tinyk_process::{IDLE_PID, INIT_PID, MAX_FILEID};

#[derive(Default)]
struct Counting {
    closes: Arc<AtomicUsize>,
}

impl StreamObject for Counting {
    fn read(&self, buf: &mut [u8]) -> LinuxResult<usize> {
        buf.fill(b'x');
        Ok(buf.len())
    }

    fn write(&self, buf: &[u8]) -> LinuxResult<usize> {
        Ok(buf.len())
    }

    fn close(&self) -> LinuxResult {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn read_listing() -> Vec<ProcInfo> {
    let fid = sys_open_info().unwrap();
    let mut buf = [0; ProcInfo::SIZE];
    let mut listing = Vec::new();
    while sys_read(fid, &mut buf).unwrap() == ProcInfo::SIZE {
        listing.push(ProcInfo::decode(&buf).unwrap());
    }
    // stays at the end
    assert_eq!(sys_read(fid, &mut buf), Ok(0));
    sys_close(fid).unwrap();
    listing
}

#[test]
fn test_inherited_files_are_closed_once() {
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();
    let code = boot(move |_| {
        let stream = Counting {
            closes: counter.clone(),
        };
        let fid = open_stream(Box::new(stream)).unwrap();
        assert_eq!(get_file(fid).unwrap().refcount(), 1);

        let child = sys_exec(
            Some(Task::new(move |_| {
                let mut buf = [0; 3];
                assert_eq!(sys_read(fid, &mut buf), Ok(3));
                assert_eq!(get_file(fid).unwrap().refcount(), 2);
                // leaves without closing
                0
            })),
            None,
        )
        .unwrap();
        sys_wait_child(Some(child), None).unwrap();
        assert_eq!(get_file(fid).unwrap().refcount(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        sys_close(fid).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(sys_close(fid), Err(LinuxError::EBADF));
        0
    });
    assert_eq!(code, 0);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_files_left_open_are_closed_at_exit() {
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();
    let code = boot(move |_| {
        let counter = counter.clone();
        let child = sys_exec(
            Some(Task::new(move |_| {
                let stream = Counting {
                    closes: counter.clone(),
                };
                let fid = open_stream(Box::new(stream)).unwrap();
                assert_eq!(sys_write(fid, b"abc"), Ok(3));
                0
            })),
            None,
        )
        .unwrap();
        sys_wait_child(Some(child), None).unwrap();
        0
    });
    assert_eq!(code, 0);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_open_fails_when_file_table_is_full() {
    let code = boot(|_| {
        for _ in 0..MAX_FILEID {
            open_stream(Box::new(Counting::default())).unwrap();
        }
        assert_eq!(sys_open_info(), Err(LinuxError::EMFILE));
        assert_eq!(sys_close(MAX_FILEID), Err(LinuxError::EBADF));
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_listing_reports_every_process() {
    let code = boot(|_| {
        let child = sys_exec(Some(Task::new(|_| read_listing().len() as i32)), Some(b"child-args")).unwrap();
        let listing = read_listing();
        assert!(listing.len() >= 2);
        assert_eq!(listing[0].pid, IDLE_PID);
        assert_eq!(listing[0].ppid, NOPROC);
        assert_eq!(listing[0].thread_count, 0);
        assert_eq!(listing[0].main_task, 0);
        assert_eq!(listing[1].pid, INIT_PID);
        assert_eq!(listing[1].ppid, NOPROC);
        assert!(listing[1].alive);
        assert_eq!(listing[1].thread_count, 1);
        assert_ne!(listing[1].main_task, 0);

        let mut status = 0;
        sys_wait_child(Some(child), Some(&mut status)).unwrap();
        // the child saw idle, init and itself
        assert_eq!(status, 3);
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_listing_carries_args() {
    let code = boot(|_| {
        let gate = common::Gate::default();
        let release = gate.clone();
        let child = sys_exec(
            Some(Task::new(move |_| {
                release.wait();
                0
            })),
            Some(b"child-args"),
        )
        .unwrap();
        let entry = read_listing().into_iter().find(|info| info.pid == child).unwrap();
        assert_eq!(entry.ppid, INIT_PID);
        assert_eq!(entry.args(), b"child-args");
        assert_eq!(entry.argl, 10);
        gate.open();
        sys_wait_child(Some(child), None).unwrap();
        0
    });
    assert_eq!(code, 0);
}

#[test]
fn test_info_stream_rejects_short_reads_and_writes() {
    let code = boot(|_| {
        let fid = sys_open_info().unwrap();
        let mut short = [0; ProcInfo::SIZE - 1];
        assert_eq!(sys_read(fid, &mut short), Err(LinuxError::EINVAL));
        assert_eq!(sys_write(fid, b"x"), Err(LinuxError::EINVAL));
        assert_eq!(sys_read(fid + 1, &mut short), Err(LinuxError::EBADF));
        sys_close(fid).unwrap();
        0
    });
    assert_eq!(code, 0);
}
