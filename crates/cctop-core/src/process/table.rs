//! OS process table access.
//!
//! Backed by `sysinfo`. `list` takes a fresh snapshot of the process table;
//! `cwd` and `start_time` answer from that snapshot, so a process that exits
//! after listing still resolves until the next `list`. Processes whose
//! details are hidden (other users, exited) fail on their own.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::error::{MonitorError, Result};

/// A listed process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Command line split into arguments
    pub args: Vec<String>,
}

impl ProcessEntry {
    /// Entry from a raw argv, keeping argument boundaries intact
    pub fn from_cmd(pid: u32, cmd: &[OsString]) -> Self {
        Self {
            pid,
            args: cmd.iter().map(|a| a.to_string_lossy().into_owned()).collect(),
        }
    }
}

/// Read access to the process table
pub trait ProcessTable: Send + Sync {
    /// All processes with a readable command line
    fn list(&self) -> Result<Vec<ProcessEntry>>;

    /// Current working directory of a process
    fn cwd(&self, pid: u32) -> Result<PathBuf>;

    /// Wall-clock time the process started
    fn start_time(&self, pid: u32) -> Result<SystemTime>;
}

/// Process table for the current platform
pub fn system_process_table() -> Box<dyn ProcessTable> {
    Box::new(SysinfoTable::new())
}

fn unavailable(pid: u32, reason: impl ToString) -> MonitorError {
    MonitorError::ProcessUnavailable {
        pid,
        reason: reason.to_string(),
    }
}

/// `sysinfo`-backed process table
pub struct SysinfoTable {
    system: Mutex<System>,
}

impl Default for SysinfoTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing()
            .with_cmd(UpdateKind::OnlyIfNotSet)
            .with_cwd(UpdateKind::Always)
    }

    fn with_process<T>(
        &self,
        pid: u32,
        f: impl FnOnce(&sysinfo::Process) -> Option<T>,
        missing: &str,
    ) -> Result<T> {
        let system = self
            .system
            .lock()
            .map_err(|_| unavailable(pid, "process table lock poisoned"))?;
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or_else(|| unavailable(pid, "not in process snapshot"))?;
        f(process).ok_or_else(|| unavailable(pid, missing))
    }
}

impl ProcessTable for SysinfoTable {
    fn list(&self) -> Result<Vec<ProcessEntry>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| unavailable(0, "process table lock poisoned"))?;
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());

        Ok(system
            .processes()
            .iter()
            // Kernel threads and hidden processes have no argv
            .filter(|(_, p)| !p.cmd().is_empty())
            .map(|(pid, p)| ProcessEntry::from_cmd(pid.as_u32(), p.cmd()))
            .collect())
    }

    fn cwd(&self, pid: u32) -> Result<PathBuf> {
        self.with_process(pid, |p| p.cwd().map(|c| c.to_path_buf()), "cwd not readable")
    }

    fn start_time(&self, pid: u32) -> Result<SystemTime> {
        self.with_process(
            pid,
            |p| Some(SystemTime::UNIX_EPOCH + Duration::from_secs(p.start_time())),
            "start time not readable",
        )
    }
}
