use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thrashguard_core::ControllerConfig;

/// Main configuration for the thrashguard daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sampling cadence
    pub monitoring: MonitoringConfig,

    /// Fault thresholds
    pub thresholds: ThresholdConfig,

    /// Freeze policy
    pub freeze: FreezeConfig,

    /// Kernel interfaces
    pub paths: PathsConfig,

    /// Logging configuration
    pub logging: LogConfig,
}

/// Sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between two samples of the major-fault counter (default: 3)
    pub interval_secs: u64,

    /// Consecutive unreadable samples before the daemon gives up (default: 3)
    pub sample_failure_limit: u32,
}

/// Major-fault thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Faults per interval that trigger a freeze (default: 5)
    pub fault_threshold: u64,

    /// Faults between two fault-history refresh scans (default: 25)
    pub scan_refresh_threshold: u64,
}

/// Which processes may be frozen and how they are released
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    /// Command names that are never frozen
    pub whitelist: Vec<String>,

    /// Every N-th release resumes the oldest frozen process instead of the newest (default: 5)
    pub unfreeze_pop_ratio: u64,
}

/// Kernel interface locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// System-wide counters (default: /proc/vmstat)
    pub vmstat: PathBuf,

    /// Process table root (default: /proc)
    pub proc_root: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log directory path (default: ./logs/)
    pub log_dir: PathBuf,

    /// Daily-rotated log file name (default: thrashguard-daemon.log)
    pub file_name: String,

    /// Filter used when RUST_LOG is unset (default: info)
    pub level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            sample_failure_limit: 3,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            fault_threshold: 5,
            scan_refresh_threshold: 25,
        }
    }
}

impl Default for FreezeConfig {
    fn default() -> Self {
        let mut whitelist: Vec<String> = ControllerConfig::default().whitelist.into_iter().collect();
        whitelist.sort();

        Self {
            whitelist,
            unfreeze_pop_ratio: 5,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vmstat: PathBuf::from(thrashguard_core::sampler::DEFAULT_VMSTAT_PATH),
            proc_root: PathBuf::from(thrashguard_core::scanner::DEFAULT_PROC_ROOT),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            file_name: "thrashguard-daemon.log".to_string(),
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Example
    /// ```no_run
    /// use thrashguard_daemon::config::Config;
    ///
    /// let config = Config::load_from_file("/etc/thrashguard/config.toml").unwrap();
    /// println!("Fault threshold: {}", config.thresholds.fault_threshold);
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.monitoring.interval_secs == 0 {
            return Err("Sampling interval must be > 0".to_string());
        }

        if self.monitoring.sample_failure_limit == 0 {
            return Err("Sample failure limit must be > 0".to_string());
        }

        if self.freeze.unfreeze_pop_ratio == 0 {
            return Err("Unfreeze pop ratio must be > 0".to_string());
        }

        if self.thresholds.scan_refresh_threshold < self.thresholds.fault_threshold {
            return Err(format!(
                "Scan refresh threshold ({}) must be >= fault threshold ({})",
                self.thresholds.scan_refresh_threshold, self.thresholds.fault_threshold
            ));
        }

        if self.paths.vmstat.as_os_str().is_empty() || self.paths.proc_root.as_os_str().is_empty()
        {
            return Err("Kernel interface paths must not be empty".to_string());
        }

        if self.logging.file_name.is_empty() {
            return Err("Log file name must not be empty".to_string());
        }

        self.controller_config()
            .validate()
            .map_err(|e| e.to_string())
    }

    /// Controller settings derived from this configuration
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            interval: Duration::from_secs(self.monitoring.interval_secs),
            fault_threshold: self.thresholds.fault_threshold,
            scan_refresh_threshold: self.thresholds.scan_refresh_threshold,
            whitelist: self.freeze.whitelist.iter().cloned().collect(),
            unfreeze_pop_ratio: self.freeze.unfreeze_pop_ratio,
            sample_failure_limit: self.monitoring.sample_failure_limit,
        }
    }

    /// Get full path to the daemon log file
    pub fn log_path(&self) -> PathBuf {
        self.logging.log_dir.join(&self.logging.file_name)
    }
}
