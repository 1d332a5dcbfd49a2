use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_VMSTAT_PATH: &str = "/proc/vmstat";

/// Counter in `/proc/vmstat` holding system-wide major page faults
pub const MAJOR_FAULT_COUNTER: &str = "pgmajfault";

/// Source of the system-wide pressure signal
pub trait FaultSampler {
    /// Current absolute value of the cumulative major-fault counter
    fn sample(&self) -> Result<u64>;
}

/// Reads `pgmajfault` from a vmstat-formatted file
#[derive(Debug, Clone)]
pub struct VmstatSampler {
    path: PathBuf,
}

impl VmstatSampler {
    pub fn new() -> Self {
        Self::with_path(DEFAULT_VMSTAT_PATH)
    }

    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for VmstatSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultSampler for VmstatSampler {
    fn sample(&self) -> Result<u64> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::Sampler(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        parse_counter(&content, MAJOR_FAULT_COUNTER)
    }
}

/// Find `name` in vmstat format and parse its value
///
/// Format:
/// ```text
/// pgfault 2412839
/// pgmajfault 3187
/// ```
pub fn parse_counter(content: &str, name: &str) -> Result<u64> {
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some(name) {
            continue;
        }

        let value = parts
            .next()
            .ok_or_else(|| Error::Parse(format!("Counter '{}' has no value", name)))?;

        return value
            .parse::<u64>()
            .map_err(|e| Error::Parse(format!("Failed to parse {} '{}': {}", name, value, e)));
    }

    Err(Error::Sampler(format!("Counter '{}' not found", name)))
}
