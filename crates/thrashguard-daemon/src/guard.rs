use crate::config::Config;
use std::future::Future;
use thrashguard_core::{
    DrainReport, FaultScanner, FaultSampler, FrozenQueue, ProcessExecutor, ProcessSource,
    ProcfsSource, Result, ShutdownHandler, Signaller, ThrashController, VmstatSampler,
};
use tracing::{error, info};

/// Controller wired to the real kernel interfaces
pub type SystemController = ThrashController<VmstatSampler, ProcfsSource, ProcessExecutor>;

/// Why the guard stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardExit {
    /// Termination signal received
    Signalled(&'static str),
    /// Control loop hit a fatal error
    Failed(String),
}

impl GuardExit {
    pub fn is_success(&self) -> bool {
        matches!(self, GuardExit::Signalled(_))
    }
}

/// Build a controller from configuration
///
/// Fails when the major-fault counter cannot be read.
pub fn build_controller(config: &Config) -> Result<SystemController> {
    let controller_config = config.controller_config();

    let sampler = VmstatSampler::with_path(&config.paths.vmstat);
    let scanner = FaultScanner::new(
        ProcfsSource::with_root(&config.paths.proc_root),
        controller_config.whitelist.clone(),
    );
    let queue = FrozenQueue::new(ProcessExecutor::new());

    ThrashController::new(controller_config, sampler, scanner, queue)
}

/// Run the control loop until `termination` resolves or the loop fails
///
/// Either way the frozen queue is drained before returning, so no process
/// stays stopped once the guard is gone.
pub async fn supervise<S, P, K, F>(
    mut controller: ThrashController<S, P, K>,
    termination: F,
) -> (GuardExit, DrainReport)
where
    S: FaultSampler + Send + 'static,
    P: ProcessSource + Send + 'static,
    K: Signaller + Send + Sync + 'static,
    F: Future<Output = &'static str>,
{
    let handler = ShutdownHandler::new(controller.queue().clone());

    let mut task = tokio::spawn(async move { controller.run().await });

    let exit = tokio::select! {
        name = termination => {
            info!("Got {}, unfreezing frozen processes...", name);
            GuardExit::Signalled(name)
        }
        joined = &mut task => {
            let reason = match joined {
                Ok(Err(e)) => e.to_string(),
                Ok(Ok(())) => "control loop stopped".to_string(),
                Err(e) => format!("control loop panicked: {}", e),
            };
            error!("Thrashing guard stopped: {}", reason);
            GuardExit::Failed(reason)
        }
    };

    // Closes the queue first, so a cycle still in flight cannot freeze anything new
    let report = handler.drain();
    task.abort();

    (exit, report)
}
