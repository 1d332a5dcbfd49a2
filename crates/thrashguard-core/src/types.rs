use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Major-fault record for a single process, as read from `/proc/<pid>/stat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFaults {
    pub pid: u32,
    pub comm: String,
    pub majflt: u64,
}

impl ProcessFaults {
    pub fn new(pid: u32, comm: impl Into<String>, majflt: u64) -> Self {
        Self {
            pid,
            comm: comm.into(),
            majflt,
        }
    }
}

/// Process the scanner blames for the current fault spike
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub pid: u32,
    pub comm: String,
    /// Major faults since the previous scan
    pub delta: u64,
}

/// Controller tuning, fixed for the lifetime of a controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Time between two pressure samples
    pub interval: Duration,

    /// System-wide major faults per interval above which one process is frozen
    pub fault_threshold: u64,

    /// Cumulative major faults between two fault-history refresh scans
    pub scan_refresh_threshold: u64,

    /// Command names that are never frozen
    pub whitelist: HashSet<String>,

    /// Every N-th release takes the oldest frozen pid, the rest take the newest
    pub unfreeze_pop_ratio: u64,

    /// Consecutive runtime sampling failures tolerated before giving up
    pub sample_failure_limit: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            fault_threshold: 5,
            scan_refresh_threshold: 25,
            whitelist: ["init", "sshd", "bash", "xinit", "X", "chromium-browser"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            unfreeze_pop_ratio: 5,
            sample_failure_limit: 3,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::Config("Sampling interval must be > 0".to_string()));
        }

        if self.unfreeze_pop_ratio == 0 {
            return Err(Error::Config("Unfreeze pop ratio must be > 0".to_string()));
        }

        if self.sample_failure_limit == 0 {
            return Err(Error::Config("Sample failure limit must be > 0".to_string()));
        }

        Ok(())
    }

    pub fn is_whitelisted(&self, comm: &str) -> bool {
        self.whitelist.contains(comm)
    }
}

/// Counters kept by the control loop
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ControllerStats {
    pub cycles: u64,
    pub freezes: u64,
    pub unfreezes: u64,
    pub refresh_scans: u64,
    pub sample_failures: u64,
}

impl ControllerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&mut self) {
        self.cycles += 1;
    }

    pub fn record_freeze(&mut self) {
        self.freezes += 1;
    }

    pub fn record_unfreeze(&mut self) {
        self.unfreezes += 1;
    }

    pub fn record_refresh_scan(&mut self) {
        self.refresh_scans += 1;
    }

    pub fn record_sample_failure(&mut self) {
        self.sample_failures += 1;
    }
}

/// What a single control cycle ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleAction {
    /// Pid was stopped and appended to the frozen queue
    Froze(u32),
    /// Spike detected but no process qualified
    NoCandidate,
    /// Spike detected, candidate found, but it could not be frozen
    FreezeSkipped(u32),
    /// Pid was released from the frozen queue
    Unfroze(u32),
    /// Quiet cycle with nothing left to release
    QueueEmpty,
    /// Faults below threshold, nothing to do
    Idle,
    /// Pressure counter could not be read this cycle
    SampleFailed,
}
