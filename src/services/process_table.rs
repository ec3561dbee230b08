//! Process table queries, in the spirit of `pgrep`.
//!
//! Backed by `sysinfo`; suspending, resuming and waiting use raw signals and
//! `waitpid` through `nix`, since the processes found here are usually not
//! our own children.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use regex::Regex;
use std::fmt;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, System, UpdateKind};
use tracing::{debug, warn};

use crate::error::{Result, WrapperError};

/// A process found in the process table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Process {
    pub pid: u32,
    pub command_line: Vec<String>,
}

impl Process {
    pub fn new(pid: u32, command_line: Vec<String>) -> Self {
        Self { pid, command_line }
    }

    fn nix_pid(&self) -> Pid {
        Pid::from_raw(self.pid as i32)
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        kill(self.nix_pid(), signal).map_err(|e| {
            WrapperError::Internal(format!("Failed to send {:?} to {}: {}", signal, self.pid, e))
        })
    }

    pub fn suspend(&self) -> Result<()> {
        debug!("suspending {}", self);
        self.signal(Signal::SIGSTOP)
    }

    pub fn resume(&self) -> Result<()> {
        debug!("resuming {}", self);
        self.signal(Signal::SIGCONT)
    }

    /// Wait for the process to exit, polling every `poll_interval`.
    ///
    /// Returns the exit status when the process is our child (directly or
    /// through the subreaper), `None` when it could only be observed to vanish.
    pub async fn wait(&self, poll_interval: Duration) -> Option<i32> {
        let pid = self.nix_pid();
        loop {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => return Some(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => return Some(128 + signal as i32),
                Ok(_) => {}
                Err(Errno::ECHILD) => {
                    if kill(pid, None) == Err(Errno::ESRCH) {
                        return None;
                    }
                }
                Err(e) => {
                    warn!("waitpid({}) failed: {}", self.pid, e);
                    return None;
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pid, self.command_line.join(" "))
    }
}

/// Query boundary over the live process table
pub trait ProcessTable: Send + Sync {
    /// Processes whose command line matches `pattern`. With `match_full`
    /// any argument or the whole command line may match, otherwise only
    /// `argv[0]`. The wrapper itself is never returned.
    fn find_processes(&self, pattern: &str, match_full: bool) -> Result<Vec<Process>>;
}

pub fn command_line_matches(regex: &Regex, command_line: &[String], match_full: bool) -> bool {
    let Some(first) = command_line.first() else {
        return false;
    };

    if match_full {
        command_line.iter().any(|arg| regex.is_match(arg)) || regex.is_match(&command_line.join(" "))
    } else {
        regex.is_match(first)
    }
}

/// Compile a process pattern. Matching is case-sensitive and unanchored,
/// like `pgrep`; unlike window patterns, Perl class escapes are allowed.
pub fn compile_process_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).or_else(|e| WrapperError::invalid_pattern(pattern, e.to_string()))
}

/// Process table backed by `/proc` via `sysinfo`
#[derive(Debug, Default)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessTable for SystemProcessTable {
    fn find_processes(&self, pattern: &str, match_full: bool) -> Result<Vec<Process>> {
        let regex = compile_process_pattern(pattern)?;
        let own_pid = std::process::id();

        let mut system = System::new();
        // command lines are not loaded by a plain refresh
        system.refresh_processes_specifics(ProcessRefreshKind::new().with_cmd(UpdateKind::Always));

        let mut found: Vec<Process> = system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own_pid)
            .filter(|(_, process)| command_line_matches(&regex, process.cmd(), match_full))
            .map(|(pid, process)| Process::new(pid.as_u32(), process.cmd().to_vec()))
            .collect();
        found.sort_by_key(|p| p.pid);

        Ok(found)
    }
}

/// Adopt orphaned descendants so a game that outlives its launcher can
/// still be waited on.
pub fn become_subreaper() {
    if let Err(e) = nix::sys::prctl::set_child_subreaper(true) {
        warn!("Failed to become a child subreaper: {}", e);
    }
}
