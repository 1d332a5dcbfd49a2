use crate::{
    executor::Signaller,
    queue::{FreezeOutcome, FrozenQueue, PopPolicy},
    sampler::FaultSampler,
    scanner::{FaultScanner, ProcessSource},
    types::{ControllerConfig, ControllerStats, CycleAction},
    Result,
};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Thrashing control loop
///
/// Each cycle samples the system-wide major-fault counter and compares it with
/// the previous sample:
/// - more than `fault_threshold` new faults: freeze the worst faulting process
/// - no new faults at all: release one frozen process
/// - anything in between: wait
///
/// Independently, once `scan_refresh_threshold` faults have accumulated since the
/// last process scan, the fault history is refreshed so that the next freeze
/// decision compares against recent per-process counts.
pub struct ThrashController<S, P, K> {
    config: ControllerConfig,
    sampler: S,
    scanner: FaultScanner<P>,
    queue: FrozenQueue<K>,
    policy: PopPolicy,
    stats: ControllerStats,

    // Counter value at the previous cycle, drives freeze/unfreeze
    last_sample: u64,
    // Counter value at the previous process scan, drives history refresh
    scan_baseline: u64,

    consecutive_failures: u32,
}

impl<S, P, K> ThrashController<S, P, K>
where
    S: FaultSampler,
    P: ProcessSource,
    K: Signaller,
{
    /// Create a controller and take the initial pressure sample
    ///
    /// Fails if the configuration is invalid or the counter cannot be read:
    /// without the pressure signal no decision is safe.
    pub fn new(
        config: ControllerConfig,
        sampler: S,
        scanner: FaultScanner<P>,
        queue: FrozenQueue<K>,
    ) -> Result<Self> {
        config.validate()?;

        let initial = sampler.sample().map_err(|e| {
            error!("Cannot read initial major-fault counter: {}", e);
            e
        })?;

        info!(
            "Initial major-fault counter: {} (threshold {} per {:?}, refresh every {})",
            initial, config.fault_threshold, config.interval, config.scan_refresh_threshold
        );

        Ok(Self {
            policy: PopPolicy::new(config.unfreeze_pop_ratio),
            config,
            sampler,
            scanner,
            queue,
            stats: ControllerStats::new(),
            last_sample: initial,
            scan_baseline: initial,
            consecutive_failures: 0,
        })
    }

    /// Run one control cycle
    ///
    /// Returns `Err` only once sampling has failed `sample_failure_limit`
    /// times in a row.
    pub fn tick(&mut self) -> Result<CycleAction> {
        self.stats.record_cycle();

        let current = match self.sampler.sample() {
            Ok(value) => {
                self.consecutive_failures = 0;
                value
            }
            Err(e) => {
                self.stats.record_sample_failure();
                self.consecutive_failures += 1;

                if self.consecutive_failures >= self.config.sample_failure_limit {
                    error!(
                        "Major-fault counter unreadable {} times in a row: {}",
                        self.consecutive_failures, e
                    );
                    return Err(e);
                }

                warn!(
                    "Failed to sample major-fault counter ({}/{}): {}",
                    self.consecutive_failures, self.config.sample_failure_limit, e
                );
                return Ok(CycleAction::SampleFailed);
            }
        };

        let delta = current.saturating_sub(self.last_sample);
        self.last_sample = current;

        let mut scanned = false;

        let action = if delta > self.config.fault_threshold {
            scanned = true;
            self.freeze_worst(delta)
        } else if delta == 0 {
            self.unfreeze_one()
        } else {
            debug!(
                "{} major faults, below threshold {}",
                delta, self.config.fault_threshold
            );
            CycleAction::Idle
        };

        if scanned {
            self.scan_baseline = current;
        } else if current.saturating_sub(self.scan_baseline) > self.config.scan_refresh_threshold {
            self.refresh_history();
            self.scan_baseline = current;
        }

        Ok(action)
    }

    /// Run cycles forever, sleeping `interval` between them
    pub async fn run(&mut self) -> Result<()> {
        info!("Thrashing guard running, sampling every {:?}", self.config.interval);

        loop {
            self.tick()?;
            sleep(self.config.interval).await;
        }
    }

    fn freeze_worst(&mut self, delta: u64) -> CycleAction {
        // A queued pid is already stopped or was resumed behind our back
        let frozen = self.queue.pids();

        let candidate = match self.scanner.scan_excluding(&frozen) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                debug!("{} major faults but no process to blame", delta);
                return CycleAction::NoCandidate;
            }
            Err(e) => {
                warn!("Process scan failed: {}", e);
                return CycleAction::NoCandidate;
            }
        };

        warn!(
            "{} major faults in one interval, freezing PID {} ({}, {} faults)",
            delta, candidate.pid, candidate.comm, candidate.delta
        );

        match self.queue.freeze(candidate.pid) {
            FreezeOutcome::Frozen => {
                self.stats.record_freeze();
                CycleAction::Froze(candidate.pid)
            }
            _ => CycleAction::FreezeSkipped(candidate.pid),
        }
    }

    fn unfreeze_one(&mut self) -> CycleAction {
        let end = self.policy.end_for(self.stats.unfreezes);

        match self.queue.release(end) {
            Some(pid) => {
                self.stats.record_unfreeze();
                CycleAction::Unfroze(pid)
            }
            None => CycleAction::QueueEmpty,
        }
    }

    fn refresh_history(&mut self) {
        match self.scanner.scan() {
            Ok(_) => {
                self.stats.record_refresh_scan();
                debug!(
                    "Fault history refreshed ({} processes tracked)",
                    self.scanner.history_len()
                );
            }
            Err(e) => warn!("Fault history refresh failed: {}", e),
        }
    }

    pub fn queue(&self) -> &FrozenQueue<K> {
        &self.queue
    }

    pub fn scanner(&self) -> &FaultScanner<P> {
        &self.scanner
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}
