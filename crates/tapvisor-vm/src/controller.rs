//! VmController - start, stop and observe hypervisor processes.

use crate::args::build_args;
use crate::config::VmSpec;
use crate::error::{Result, VmError};
use crate::process::{
    name_matches, parse_signal, read_pid, send_signal, write_pid, ProcessTable, SysinfoTable,
};
use crate::validate::validate;
use nix::sys::signal::Signal;
use serde::Serialize;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Liveness of a VM, derived from its PID file and the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "pid", rename_all = "snake_case")]
pub enum VmStatus {
    /// The recorded PID is a live hypervisor process
    Running(u32),
    /// A PID was recorded but that process is gone or is something else
    Stopped(u32),
    /// No usable PID file
    NotFound,
}

impl VmStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, VmStatus::Running(_))
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            VmStatus::Running(pid) | VmStatus::Stopped(pid) => Some(*pid),
            VmStatus::NotFound => None,
        }
    }
}

impl std::fmt::Display for VmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmStatus::Running(pid) => write!(f, "running (pid {pid})"),
            VmStatus::Stopped(pid) => write!(f, "stopped (pid {pid})"),
            VmStatus::NotFound => write!(f, "PID file not found"),
        }
    }
}

/// Result of [`VmController::up`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "pid", rename_all = "snake_case")]
pub enum UpOutcome {
    Started(u32),
    AlreadyRunning(u32),
}

impl UpOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            UpOutcome::Started(pid) | UpOutcome::AlreadyRunning(pid) => *pid,
        }
    }
}

/// Launches and signals hypervisor processes for [`VmSpec`]s.
#[derive(Clone)]
pub struct VmController {
    hypervisor: PathBuf,
    table: Arc<dyn ProcessTable>,
}

impl VmController {
    /// Controller for the hypervisor at `hypervisor`, resolved via `PATH`
    /// when it has no directory component.
    pub fn new(hypervisor: impl Into<PathBuf>) -> Self {
        Self {
            hypervisor: hypervisor.into(),
            table: Arc::new(SysinfoTable),
        }
    }

    /// Replace the process table used for liveness checks.
    pub fn with_process_table(mut self, table: Arc<dyn ProcessTable>) -> Self {
        self.table = table;
        self
    }

    pub fn hypervisor(&self) -> &Path {
        &self.hypervisor
    }

    /// Process name a live hypervisor is expected to have.
    fn binary_name(&self) -> String {
        self.hypervisor
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Full command line `up` would run.
    pub fn command_line(&self, spec: &VmSpec) -> Vec<String> {
        let mut argv = vec![self.hypervisor.to_string_lossy().into_owned()];
        argv.extend(build_args(spec));
        argv
    }

    /// Current liveness of `spec`.
    pub fn status(&self, spec: &VmSpec) -> VmStatus {
        let Some(pid) = read_pid(&spec.pid_file()) else {
            return VmStatus::NotFound;
        };

        match self.table.lookup(pid) {
            Err(e) => {
                tracing::warn!(vm = %spec.name, pid, error = %e, "process lookup failed");
                VmStatus::NotFound
            }
            Ok(None) => VmStatus::Stopped(pid),
            Ok(Some(entry)) if entry.zombie => VmStatus::Stopped(pid),
            Ok(Some(entry)) if !name_matches(&entry.name, &self.binary_name()) => {
                tracing::debug!(
                    vm = %spec.name,
                    pid,
                    name = %entry.name,
                    "pid belongs to another process"
                );
                VmStatus::Stopped(pid)
            }
            Ok(Some(_)) => VmStatus::Running(pid),
        }
    }

    /// Validate `spec` against the host and its current status.
    pub fn validate(&self, spec: &VmSpec) -> Result<()> {
        validate(spec, self.status(spec))
    }

    /// Start the hypervisor unless it is already running.
    ///
    /// The child is detached into its own process group and never waited
    /// on. Its PID is recorded before returning.
    pub fn up(&self, spec: &VmSpec) -> Result<UpOutcome> {
        if let VmStatus::Running(pid) = self.status(spec) {
            tracing::info!(vm = %spec.name, pid, "already running");
            return Ok(UpOutcome::AlreadyRunning(pid));
        }

        if spec.run_dir.as_os_str().is_empty() {
            return Err(VmError::Config(format!(
                "VM {} has no run directory",
                spec.name
            )));
        }

        let args = build_args(spec);
        tracing::info!(
            vm = %spec.name,
            cmd = %format!("{} {}", self.hypervisor.display(), args.join(" ")),
            "launching hypervisor"
        );

        let mut child = Command::new(&self.hypervisor)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| VmError::Launch {
                binary: self.hypervisor.display().to_string(),
                source,
            })?;

        let pid = child.id();
        if let Err(e) = write_pid(&spec.pid_file(), pid) {
            tracing::error!(vm = %spec.name, pid, error = %e, "cannot record PID, killing hypervisor");
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        tracing::info!(vm = %spec.name, pid, "hypervisor started");

        Ok(UpOutcome::Started(pid))
    }

    /// Signal a running VM. `None` sends SIGTERM.
    pub fn down(&self, spec: &VmSpec, signal: Option<&str>) -> Result<()> {
        let signal = match signal {
            Some(text) => parse_signal(text)?,
            None => Signal::SIGTERM,
        };
        self.kill(spec, signal)
    }

    /// Deliver `signal` to a running VM. The PID file is left in place.
    pub fn kill(&self, spec: &VmSpec, signal: Signal) -> Result<()> {
        if !self.status(spec).is_running() {
            return Err(VmError::NotRunning(spec.name.clone()));
        }

        let pid = read_pid(&spec.pid_file()).ok_or_else(|| VmError::NotRunning(spec.name.clone()))?;
        tracing::info!(vm = %spec.name, pid, %signal, "sending signal");
        send_signal(pid, signal)
    }
}

impl std::fmt::Debug for VmController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmController")
            .field("hypervisor", &self.hypervisor)
            .finish_non_exhaustive()
    }
}
