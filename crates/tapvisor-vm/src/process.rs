//! PID files, process table lookups and signals.

use crate::error::{Result, VmError};
use nix::sys::signal::Signal;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use sysinfo::{Pid, ProcessStatus, System};

/// A live process as seen in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Executable name, as reported by the OS
    pub name: String,
    pub zombie: bool,
}

/// Lookup of processes by PID.
pub trait ProcessTable: Send + Sync {
    /// `Ok(None)` when no process has this PID.
    fn lookup(&self, pid: u32) -> Result<Option<ProcessEntry>>;
}

/// Process table backed by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoTable;

impl ProcessTable for SysinfoTable {
    fn lookup(&self, pid: u32) -> Result<Option<ProcessEntry>> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(VmError::Config(
                "process table is not available on this platform".into(),
            ));
        }

        let mut system = System::new();
        let sys_pid = Pid::from_u32(pid);
        if !system.refresh_process(sys_pid) {
            return Ok(None);
        }

        Ok(system.process(sys_pid).map(|process| ProcessEntry {
            pid,
            name: process.name().to_string(),
            zombie: process.status() == ProcessStatus::Zombie,
        }))
    }
}

/// Whether a process-table name refers to `binary`.
///
/// Linux truncates command names to 15 bytes, so a 15-byte name also
/// matches a longer binary name it is a prefix of.
pub fn name_matches(name: &str, binary: &str) -> bool {
    const COMM_LEN: usize = 15;
    name == binary || (name.len() == COMM_LEN && binary.starts_with(name))
}

/// Read a PID file. `None` if missing or not a positive integer.
pub fn read_pid(path: &Path) -> Option<u32> {
    let text = fs::read_to_string(path).ok()?;
    text.trim().parse::<u32>().ok().filter(|&pid| pid > 0)
}

/// Write `pid` as decimal text with no trailing data.
pub fn write_pid(path: &Path, pid: u32) -> Result<()> {
    fs::write(path, pid.to_string())?;
    Ok(())
}

/// Parse a signal name or number.
///
/// Accepts `SIGTERM`, `TERM`, `term` and `15` alike.
pub fn parse_signal(text: &str) -> Result<Signal> {
    let trimmed = text.trim();
    let invalid = || VmError::InvalidSignal(text.to_string());

    if let Ok(number) = trimmed.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| invalid());
    }

    let upper = trimmed.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name).map_err(|_| invalid())
}

/// Deliver `signal` to `pid`.
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    let raw = i32::try_from(pid).map_err(|_| VmError::Signal {
        pid,
        source: nix::errno::Errno::ESRCH,
    })?;
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), signal)
        .map_err(|source| VmError::Signal { pid, source })
}
