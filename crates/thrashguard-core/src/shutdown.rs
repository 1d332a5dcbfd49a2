use crate::{
    executor::Signaller,
    queue::{DrainReport, FrozenQueue},
    Result,
};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{info, warn};

/// SIGINT and SIGTERM listeners
///
/// Once registered, the default action of both signals (process exit) is
/// replaced for the lifetime of the process.
pub struct TerminationSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl TerminationSignals {
    pub fn register() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next termination signal, returning its name
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

/// Resumes every frozen process before the controller exits
pub struct ShutdownHandler<K> {
    queue: FrozenQueue<K>,
}

impl<K: Signaller> ShutdownHandler<K> {
    pub fn new(queue: FrozenQueue<K>) -> Self {
        Self { queue }
    }

    /// Drain the frozen queue, best effort
    pub fn drain(&self) -> DrainReport {
        let pending = self.queue.len();
        if pending > 0 {
            info!("Unfreezing {} frozen processes...", pending);
        }

        let report = self.queue.drain();

        if report.failed.is_empty() {
            info!("Shutdown drain complete: {} unfrozen", report.resumed.len());
        } else {
            warn!(
                "Shutdown drain complete: {} unfrozen, {} failed ({:?})",
                report.resumed.len(),
                report.failed.len(),
                report.failed
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSignaller, SignalOp};

    #[test]
    fn test_drain_issues_one_resume_per_pid() {
        let signaller = RecordingSignaller::new();
        let queue = FrozenQueue::new(signaller.clone());
        for pid in [100, 200, 300, 400] {
            queue.freeze(pid);
        }

        let handler = ShutdownHandler::new(queue.clone());
        let report = handler.drain();

        assert_eq!(report.resumed, vec![100, 200, 300, 400]);
        assert_eq!(signaller.count(SignalOp::Resume), 4);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_empty_queue() {
        let signaller = RecordingSignaller::new();
        let handler = ShutdownHandler::new(FrozenQueue::new(signaller.clone()));

        let report = handler.drain();
        assert_eq!(report.total(), 0);
        assert!(signaller.events().is_empty());
    }

    #[test]
    fn test_drain_continues_past_failures() {
        let signaller = RecordingSignaller::new();
        let queue = FrozenQueue::new(signaller.clone());
        for pid in [1, 2, 3] {
            queue.freeze(pid);
        }
        signaller.mark_gone(1);
        signaller.mark_denied(2);

        let report = ShutdownHandler::new(queue.clone()).drain();
        assert_eq!(report.resumed, vec![3]);
        assert_eq!(report.failed, vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_sigterm_is_caught() {
        let mut signals = TerminationSignals::register().unwrap();

        nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM).unwrap();

        assert_eq!(signals.recv().await, "SIGTERM");
    }
}
