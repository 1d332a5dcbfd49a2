use crate::{Error, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Delivers suspend/resume signals to processes
pub trait Signaller {
    /// Suspend `pid` (SIGSTOP)
    fn stop(&self, pid: u32) -> Result<()>;

    /// Resume `pid` (SIGCONT)
    fn resume(&self, pid: u32) -> Result<()>;
}

/// Signals real processes through kill(2)
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Check if process exists
    ///
    /// Uses kill(pid, 0) - doesn't signal the process, only checks existence
    pub fn process_exists(pid: u32) -> Result<bool> {
        let process_pid = Self::target(pid)?;

        match kill(process_pid, None) {
            Ok(_) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(Errno::EPERM) => Ok(true), // No permission, but process exists
            Err(e) => Err(Error::Signal(format!(
                "Failed to check process {}: {}",
                pid, e
            ))),
        }
    }

    fn send(pid: u32, signal: Signal) -> Result<()> {
        let process_pid = Self::target(pid)?;

        if !Self::process_exists(pid)? {
            return Err(Error::ProcessNotFound(pid));
        }

        match kill(process_pid, signal) {
            Ok(_) => Ok(()),
            // Exited between the existence check and the signal
            Err(Errno::ESRCH) => Err(Error::ProcessNotFound(pid)),
            Err(e) => Err(Error::Signal(format!(
                "Failed to send {} to process {}: {}",
                signal, pid, e
            ))),
        }
    }

    /// kill(2) treats 0 and negative pids as process groups, never allow those
    fn target(pid: u32) -> Result<Pid> {
        match i32::try_from(pid) {
            Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
            _ => Err(Error::Signal(format!("Refusing to signal pid {}", pid))),
        }
    }
}

impl Signaller for ProcessExecutor {
    fn stop(&self, pid: u32) -> Result<()> {
        Self::send(pid, Signal::SIGSTOP)
    }

    fn resume(&self, pid: u32) -> Result<()> {
        Self::send(pid, Signal::SIGCONT)
    }
}
