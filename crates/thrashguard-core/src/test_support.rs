//! In-memory stand-ins for /proc and kill(2)

use crate::{
    executor::Signaller, sampler::FaultSampler, scanner::ProcessSource, types::ProcessFaults,
    Error, Result,
};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Replays queued snapshots; the last one repeats once the queue runs dry
#[derive(Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<SourceState>>,
}

#[derive(Default)]
struct SourceState {
    snapshots: VecDeque<Vec<ProcessFaults>>,
    last: Vec<ProcessFaults>,
    fail_next: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, snapshot: Vec<ProcessFaults>) {
        self.state.lock().unwrap().snapshots.push_back(snapshot);
    }

    pub fn fail_next(&self) {
        self.state.lock().unwrap().fail_next = true;
    }
}

impl ProcessSource for ScriptedSource {
    fn snapshot(&self) -> Result<Vec<ProcessFaults>> {
        let mut state = self.state.lock().unwrap();

        if state.fail_next {
            state.fail_next = false;
            return Err(Error::Scanner("scripted failure".to_string()));
        }

        if let Some(snapshot) = state.snapshots.pop_front() {
            state.last = snapshot;
        }
        Ok(state.last.clone())
    }
}

/// Replays queued counter values; `None` entries fail
#[derive(Clone, Default)]
pub struct ScriptedSampler {
    values: Arc<Mutex<VecDeque<Option<u64>>>>,
}

impl ScriptedSampler {
    pub fn new(values: &[u64]) -> Self {
        let sampler = Self::default();
        for &v in values {
            sampler.push(v);
        }
        sampler
    }

    pub fn push(&self, value: u64) {
        self.values.lock().unwrap().push_back(Some(value));
    }

    pub fn push_failure(&self) {
        self.values.lock().unwrap().push_back(None);
    }
}

impl FaultSampler for ScriptedSampler {
    fn sample(&self) -> Result<u64> {
        match self.values.lock().unwrap().pop_front() {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(Error::Sampler("scripted failure".to_string())),
            None => Err(Error::Sampler("script exhausted".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOp {
    Stop,
    Resume,
}

/// Records every delivery attempt
#[derive(Clone, Default)]
pub struct RecordingSignaller {
    events: Arc<Mutex<Vec<(SignalOp, u32)>>>,
    gone: Arc<Mutex<HashSet<u32>>>,
    denied: Arc<Mutex<HashSet<u32>>>,
}

impl RecordingSignaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals to `pid` fail with `ProcessNotFound`
    pub fn mark_gone(&self, pid: u32) {
        self.gone.lock().unwrap().insert(pid);
    }

    /// Signals to `pid` fail with a permission error
    pub fn mark_denied(&self, pid: u32) {
        self.denied.lock().unwrap().insert(pid);
    }

    pub fn events(&self) -> Vec<(SignalOp, u32)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, op: SignalOp) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == op)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn deliver(&self, op: SignalOp, pid: u32) -> Result<()> {
        self.events.lock().unwrap().push((op, pid));

        if self.gone.lock().unwrap().contains(&pid) {
            return Err(Error::ProcessNotFound(pid));
        }
        if self.denied.lock().unwrap().contains(&pid) {
            return Err(Error::Signal(format!("EPERM for {}", pid)));
        }
        Ok(())
    }
}

impl Signaller for RecordingSignaller {
    fn stop(&self, pid: u32) -> Result<()> {
        self.deliver(SignalOp::Stop, pid)
    }

    fn resume(&self, pid: u32) -> Result<()> {
        self.deliver(SignalOp::Resume, pid)
    }
}
