//! thrashguard core library
//!
//! Watches the system-wide major page-fault counter and, during a fault storm,
//! suspends the process responsible for most of it. Suspended processes are
//! resumed once the storm is over, or all at once when the controller stops.

pub mod controller;
pub mod error;
pub mod executor;
pub mod queue;
pub mod sampler;
pub mod scanner;
pub mod shutdown;
pub mod types;

#[cfg(test)]
mod test_support;

pub use controller::ThrashController;
pub use error::{Error, Result};
pub use executor::{ProcessExecutor, Signaller};
pub use queue::{DrainReport, FreezeOutcome, FrozenQueue, PopPolicy, ReleaseEnd};
pub use sampler::{FaultSampler, VmstatSampler};
pub use scanner::{FaultScanner, ProcessSource, ProcfsSource};
pub use shutdown::{ShutdownHandler, TerminationSignals};
pub use types::{Candidate, ControllerConfig, ControllerStats, CycleAction, ProcessFaults};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
