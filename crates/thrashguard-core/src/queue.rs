//! Frozen process queue
//!
//! Every pid stopped by the controller lives here until it is released by the
//! control loop or drained on shutdown. The queue is shared between those two
//! tasks, so each operation holds the lock across the signal delivery and the
//! sequence update: a freeze can never slip in behind a drain.

use crate::{executor::Signaller, Error};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// End of the queue a release pops from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseEnd {
    /// Oldest frozen pid
    Head,
    /// Most recently frozen pid
    Tail,
}

/// Hybrid LIFO/FIFO release cadence
///
/// With ratio N, release number `k` (counting from 0) takes the head when
/// `k % N == 0` and the tail otherwise: one fair release in every N.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopPolicy {
    ratio: u64,
}

impl PopPolicy {
    /// A ratio of 0 is treated as 1 (always release the oldest)
    pub fn new(ratio: u64) -> Self {
        Self {
            ratio: ratio.max(1),
        }
    }

    pub fn ratio(&self) -> u64 {
        self.ratio
    }

    pub fn end_for(&self, unfreezes: u64) -> ReleaseEnd {
        if unfreezes % self.ratio == 0 {
            ReleaseEnd::Head
        } else {
            ReleaseEnd::Tail
        }
    }
}

/// Result of a freeze attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeOutcome {
    /// Stopped and appended to the tail
    Frozen,
    /// Process is gone, nothing to freeze
    Vanished,
    /// Already in the queue
    AlreadyFrozen,
    /// Queue was drained, no new freezes accepted
    Closed,
    /// Stop signal could not be delivered
    Failed,
}

/// Summary of a full drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub resumed: Vec<u32>,
    pub failed: Vec<u32>,
}

impl DrainReport {
    pub fn total(&self) -> usize {
        self.resumed.len() + self.failed.len()
    }
}

struct Inner {
    pids: VecDeque<u32>,
    closed: bool,
}

/// Shared handle to the queue of stopped processes
pub struct FrozenQueue<K> {
    inner: Arc<Mutex<Inner>>,
    signaller: Arc<K>,
}

impl<K> Clone for FrozenQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            signaller: Arc::clone(&self.signaller),
        }
    }
}

impl<K: Signaller> FrozenQueue<K> {
    pub fn new(signaller: K) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pids: VecDeque::new(),
                closed: false,
            })),
            signaller: Arc::new(signaller),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic elsewhere must not strand stopped processes
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop `pid` and append it to the tail
    pub fn freeze(&self, pid: u32) -> FreezeOutcome {
        let mut inner = self.lock();

        if inner.closed {
            warn!("Queue is drained, not freezing PID {}", pid);
            return FreezeOutcome::Closed;
        }

        if inner.pids.contains(&pid) {
            debug!("PID {} is already frozen", pid);
            return FreezeOutcome::AlreadyFrozen;
        }

        match self.signaller.stop(pid) {
            Ok(()) => {
                inner.pids.push_back(pid);
                info!("Froze PID {} ({} frozen)", pid, inner.pids.len());
                FreezeOutcome::Frozen
            }
            Err(Error::ProcessNotFound(_)) => {
                debug!("PID {} vanished before it could be frozen", pid);
                FreezeOutcome::Vanished
            }
            Err(e) => {
                warn!("Failed to freeze PID {}: {}", pid, e);
                FreezeOutcome::Failed
            }
        }
    }

    /// Pop one pid from `end` and resume it
    ///
    /// The pid leaves the queue even if the resume signal fails: a process
    /// that has exited is done with its freeze.
    pub fn release(&self, end: ReleaseEnd) -> Option<u32> {
        let mut inner = self.lock();

        let pid = match end {
            ReleaseEnd::Head => inner.pids.pop_front(),
            ReleaseEnd::Tail => inner.pids.pop_back(),
        }?;

        match self.signaller.resume(pid) {
            Ok(()) => info!("Unfroze PID {} from {:?} ({} frozen)", pid, end, inner.pids.len()),
            Err(Error::ProcessNotFound(_)) => {
                debug!("PID {} exited while frozen", pid)
            }
            Err(e) => warn!("Failed to unfreeze PID {}: {}", pid, e),
        }

        Some(pid)
    }

    /// Resume every queued pid, oldest first, and close the queue
    pub fn drain(&self) -> DrainReport {
        let mut inner = self.lock();
        inner.closed = true;

        let mut report = DrainReport::default();

        while let Some(pid) = inner.pids.pop_front() {
            match self.signaller.resume(pid) {
                Ok(()) => {
                    info!("PID {} unfrozen", pid);
                    report.resumed.push(pid);
                }
                Err(e) => {
                    warn!("Could not unfreeze PID {}: {}", pid, e);
                    report.failed.push(pid);
                }
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.lock().pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pids.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Queued pids, oldest first
    pub fn pids(&self) -> Vec<u32> {
        self.lock().pids.iter().copied().collect()
    }
}
