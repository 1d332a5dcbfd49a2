use crate::{
    types::{Candidate, ProcessFaults},
    Error, Result,
};
use procfs::process::all_processes_with_root;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Enumerates per-process major-fault records
pub trait ProcessSource {
    fn snapshot(&self) -> Result<Vec<ProcessFaults>>;
}

/// Reads `<root>/<pid>/stat` for every visible process
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    root: PathBuf,
}

impl ProcfsSource {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_PROC_ROOT)
    }

    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for ProcfsSource {
    fn snapshot(&self) -> Result<Vec<ProcessFaults>> {
        let processes = all_processes_with_root(&self.root).map_err(|e| {
            Error::Scanner(format!(
                "Failed to enumerate processes in {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut records = Vec::new();

        for process in processes {
            // Processes routinely exit between listing and reading
            let stat = match process.and_then(|p| p.stat()) {
                Ok(stat) => stat,
                Err(e) => {
                    debug!("Skipping unreadable process record: {}", e);
                    continue;
                }
            };

            if stat.pid <= 0 {
                continue;
            }

            records.push(ProcessFaults::new(stat.pid as u32, stat.comm, stat.majflt));
        }

        Ok(records)
    }
}

/// Attributes major-fault pressure to a single process
///
/// Keeps the last observed `majflt` per pid and, on every scan, picks the
/// process whose count grew the most since the previous scan.
pub struct FaultScanner<P> {
    source: P,
    history: HashMap<u32, u64>,
    whitelist: HashSet<String>,
    self_pid: u32,
}

impl<P: ProcessSource> FaultScanner<P> {
    pub fn new(source: P, whitelist: HashSet<String>) -> Self {
        Self::with_self_pid(source, whitelist, std::process::id())
    }

    pub fn with_self_pid(source: P, whitelist: HashSet<String>, self_pid: u32) -> Self {
        Self {
            source,
            history: HashMap::new(),
            whitelist,
            self_pid,
        }
    }

    /// Find the process with the largest major-fault growth since the last scan
    ///
    /// Algorithm:
    /// 1. Snapshot all processes
    /// 2. delta = majflt - history[pid] (unknown pid counts from 0, shrinking counts give 0)
    /// 3. history[pid] = majflt for every record, selected or not
    /// 4. Skip zero deltas, whitelisted commands and our own pid
    /// 5. Keep the strictly largest delta, so the first one seen wins ties
    pub fn scan(&mut self) -> Result<Option<Candidate>> {
        self.scan_excluding(&[])
    }

    /// Like [`scan`](Self::scan), but `skip` pids are never selected
    ///
    /// Their history is still updated.
    pub fn scan_excluding(&mut self, skip: &[u32]) -> Result<Option<Candidate>> {
        let records = self.source.snapshot()?;
        let mut worst: Option<Candidate> = None;

        for record in records {
            let previous = self.history.insert(record.pid, record.majflt).unwrap_or(0);
            let delta = record.majflt.saturating_sub(previous);

            if delta == 0 {
                continue;
            }

            if record.pid == self.self_pid
                || skip.contains(&record.pid)
                || self.whitelist.contains(&record.comm)
            {
                continue;
            }

            if worst.as_ref().map_or(true, |w| delta > w.delta) {
                worst = Some(Candidate {
                    pid: record.pid,
                    comm: record.comm,
                    delta,
                });
            }
        }

        match &worst {
            Some(c) => debug!(
                "Worst faulting process: PID {} ({}), {} new major faults",
                c.pid, c.comm, c.delta
            ),
            None => debug!("No process qualifies as freeze candidate"),
        }

        Ok(worst)
    }

    /// Processes with the highest absolute major-fault counts, fault history untouched
    pub fn top(&self, n: usize) -> Result<Vec<ProcessFaults>> {
        let mut records = self.source.snapshot()?;
        records.sort_by(|a, b| b.majflt.cmp(&a.majflt));
        records.truncate(n);
        Ok(records)
    }

    pub fn last_seen(&self, pid: u32) -> Option<u64> {
        self.history.get(&pid).copied()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedSource;

    const SELF_PID: u32 = 999;

    fn whitelist(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn scanner(source: ScriptedSource) -> FaultScanner<ScriptedSource> {
        FaultScanner::with_self_pid(source, whitelist(&["sshd", "bash"]), SELF_PID)
    }

    #[test]
    fn test_picks_largest_delta() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(10, "a", 12),
            ProcessFaults::new(11, "b", 3),
        ]);

        let candidate = scanner(source).scan().unwrap().unwrap();
        assert_eq!(candidate.pid, 10);
        assert_eq!(candidate.comm, "a");
        assert_eq!(candidate.delta, 12);
    }

    #[test]
    fn test_delta_against_history() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(10, "a", 100),
            ProcessFaults::new(11, "b", 5),
        ]);
        source.push(vec![
            ProcessFaults::new(10, "a", 102),
            ProcessFaults::new(11, "b", 40),
        ]);

        let mut scanner = scanner(source);
        assert_eq!(scanner.scan().unwrap().unwrap().pid, 10);

        let candidate = scanner.scan().unwrap().unwrap();
        assert_eq!(candidate.pid, 11);
        assert_eq!(candidate.delta, 35);
    }

    #[test]
    fn test_no_activity_yields_no_candidate() {
        let snapshot = vec![
            ProcessFaults::new(10, "a", 100),
            ProcessFaults::new(11, "b", 5),
        ];
        let source = ScriptedSource::new();
        source.push(snapshot.clone());
        source.push(snapshot);

        let mut scanner = scanner(source);
        assert!(scanner.scan().unwrap().is_some());
        assert!(scanner.scan().unwrap().is_none());
    }

    #[test]
    fn test_whitelisted_and_self_never_selected() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(10, "sshd", 1_000_000),
            ProcessFaults::new(SELF_PID, "thrashguard", 500_000),
            ProcessFaults::new(12, "bash", 250_000),
            ProcessFaults::new(13, "stress", 1),
        ]);

        let mut scanner = scanner(source);
        let candidate = scanner.scan().unwrap().unwrap();
        assert_eq!(candidate.pid, 13);

        // Excluded processes still advance their history
        assert_eq!(scanner.last_seen(10), Some(1_000_000));
        assert_eq!(scanner.last_seen(SELF_PID), Some(500_000));
    }

    #[test]
    fn test_only_excluded_processes() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(10, "sshd", 50),
            ProcessFaults::new(SELF_PID, "thrashguard", 50),
        ]);

        assert!(scanner(source).scan().unwrap().is_none());
    }

    #[test]
    fn test_skipped_pids_are_not_selected_but_tracked() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(10, "frozen", 200),
            ProcessFaults::new(11, "next", 50),
        ]);

        let mut scanner = scanner(source);
        let candidate = scanner.scan_excluding(&[10]).unwrap().unwrap();

        assert_eq!(candidate.pid, 11);
        assert_eq!(candidate.delta, 50);
        assert_eq!(scanner.last_seen(10), Some(200));
    }

    #[test]
    fn test_tie_first_seen_wins() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(20, "first", 7),
            ProcessFaults::new(21, "second", 7),
        ]);

        assert_eq!(scanner(source).scan().unwrap().unwrap().pid, 20);
    }

    #[test]
    fn test_decreasing_count_is_not_a_candidate() {
        let source = ScriptedSource::new();
        source.push(vec![ProcessFaults::new(30, "old", 500)]);
        // pid reused by a fresh process with a smaller counter
        source.push(vec![ProcessFaults::new(30, "new", 20)]);
        source.push(vec![ProcessFaults::new(30, "new", 26)]);

        let mut scanner = scanner(source);
        assert!(scanner.scan().unwrap().is_some());
        assert!(scanner.scan().unwrap().is_none());
        assert_eq!(scanner.last_seen(30), Some(20));

        // History self-corrects on the next scan
        assert_eq!(scanner.scan().unwrap().unwrap().delta, 6);
    }

    #[test]
    fn test_history_is_never_pruned() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(1, "a", 1),
            ProcessFaults::new(2, "b", 1),
        ]);
        source.push(vec![ProcessFaults::new(1, "a", 1)]);

        let mut scanner = scanner(source);
        scanner.scan().unwrap();
        scanner.scan().unwrap();
        assert_eq!(scanner.history_len(), 2);
    }

    #[test]
    fn test_source_failure_propagates() {
        let source = ScriptedSource::new();
        source.fail_next();

        let err = scanner(source).scan().unwrap_err();
        assert!(matches!(err, Error::Scanner(_)));
    }

    #[test]
    fn test_top_sorted_by_majflt() {
        let source = ScriptedSource::new();
        source.push(vec![
            ProcessFaults::new(1, "low", 3),
            ProcessFaults::new(2, "high", 300),
            ProcessFaults::new(3, "mid", 30),
        ]);

        let scanner = scanner(source);
        let top = scanner.top(2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].comm, "high");
        assert_eq!(top[1].comm, "mid");
        assert_eq!(scanner.history_len(), 0);
    }
}
