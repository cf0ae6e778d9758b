//! Snapshot records of the diagnostic process listing.

use crate::Pid;

/// Number of argument bytes carried by a snapshot; longer payloads are truncated.
pub const PROCINFO_MAX_ARGS_SIZE: usize = 128;

const PROCINFO_SIZE: usize = 32 + PROCINFO_MAX_ARGS_SIZE;

/// One entry of the process listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    pub pid: Pid,
    /// `NOPROC` for parentless processes.
    pub ppid: Pid,
    /// `true` for alive processes, `false` for zombies.
    pub alive: bool,
    pub thread_count: u32,
    /// Identity of the entry task, 0 for processes without one.
    pub main_task: u64,
    /// Full argument length, which may exceed the bytes carried in `args`.
    pub argl: u32,
    pub args: [u8; PROCINFO_MAX_ARGS_SIZE],
}

impl ProcInfo {
    /// Size of the encoded record.
    pub const SIZE: usize = PROCINFO_SIZE;

    /// The carried argument bytes.
    pub fn args(&self) -> &[u8] {
        let len = (self.argl as usize).min(PROCINFO_MAX_ARGS_SIZE);
        &self.args[..len]
    }

    /// Encode into the fixed little-endian layout:
    /// `pid:u32 ppid:u32 alive:u8 pad:3 thread_count:u32 main_task:u64 argl:u32 pad:4 args`.
    pub fn encode(&self, buf: &mut [u8; PROCINFO_SIZE]) {
        buf.fill(0);
        buf[0..4].copy_from_slice(&self.pid.to_le_bytes());
        buf[4..8].copy_from_slice(&self.ppid.to_le_bytes());
        buf[8] = self.alive as u8;
        buf[12..16].copy_from_slice(&self.thread_count.to_le_bytes());
        buf[16..24].copy_from_slice(&self.main_task.to_le_bytes());
        buf[24..28].copy_from_slice(&self.argl.to_le_bytes());
        buf[32..].copy_from_slice(&self.args);
    }

    /// Parse a record produced by [`ProcInfo::encode`].
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let buf: &[u8; PROCINFO_SIZE] = buf.get(..PROCINFO_SIZE)?.try_into().ok()?;
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let mut main_task = [0; 8];
        main_task.copy_from_slice(&buf[16..24]);
        let mut args = [0; PROCINFO_MAX_ARGS_SIZE];
        args.copy_from_slice(&buf[32..]);
        Some(Self {
            pid: u32_at(0),
            ppid: u32_at(4),
            alive: buf[8] != 0,
            thread_count: u32_at(12),
            main_task: u64::from_le_bytes(main_task),
            argl: u32_at(24),
            args,
        })
    }
}
