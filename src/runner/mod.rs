//! Cancelable supervision of a job's child processes.
//!
//! A [`JobRunner`] is created once per job invocation (one build-task
//! execution), lives for the duration of that job, and is discarded
//! afterwards. It is never a process-wide singleton: two unrelated jobs
//! running in the same process must not share cancellation state.
//!
//! The runner owns exactly three pieces of shared mutable state: the
//! cancellation flag, the lazily published [`CancelSignal`], and the set of
//! in-flight child processes. The process set is guarded by a single mutex
//! held only for in-memory mutation and snapshotting, never across a kill or
//! a process-exit wait.

pub mod kill;
mod signal;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Instant;

use crate::job::JobOutcome;
use crate::job::JobState;
use crate::util::process::RunningProcess;

pub use signal::CancelSignal;

/// Bookkeeping entry for one registered child process.
#[derive(Debug, Clone)]
struct TrackedProcess {
    pid: u32,
    program: String,
    registered: Instant,
}

/// Per-job cancellation supervisor.
///
/// Lets a job launch child processes, sequentially or in parallel, while an
/// external caller may request cancellation at any point from any thread.
/// A cancel request stops new work from starting (via [`is_cancelled`]),
/// propagates to cooperative work in flight (via [`cancel_signal`]), and
/// forcibly terminates every registered process tree.
///
/// [`is_cancelled`]: JobRunner::is_cancelled
/// [`cancel_signal`]: JobRunner::cancel_signal
#[derive(Debug, Default)]
pub struct JobRunner {
    cancelled: AtomicBool,
    signal: OnceLock<CancelSignal>,
    active: Mutex<HashMap<u32, TrackedProcess>>,
    state: Mutex<JobState>,
}

impl JobRunner {
    /// Create a runner for one job invocation.
    pub fn new() -> Self {
        JobRunner::default()
    }

    /// Non-blocking read of the cancellation flag. Safe to poll from hot loops.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Current lifecycle state of the job this runner supervises.
    pub fn state(&self) -> JobState {
        *self.lock_state()
    }

    /// Request cancellation of the job. Callable from any thread, any number
    /// of times; repeated calls are no-ops.
    ///
    /// When this returns, every process registered before the call began has
    /// had a kill issued (or already exited), and any cooperative work
    /// observing the flag or the signal will see the cancellation. Kill
    /// failures are logged and swallowed; this never returns an error.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);

        {
            let mut state = self.lock_state();
            if !state.is_terminal() {
                *state = JobState::CancelRequested;
            }
        }

        // Triggering an already-cancelled signal is a no-op.
        if let Some(signal) = self.signal.get() {
            signal.trigger();
        }

        // Snapshot under the lock, kill outside it: a process exiting
        // naturally during the sweep must be able to unregister without
        // deadlocking against us.
        let snapshot: Vec<TrackedProcess> = self.lock_active().values().cloned().collect();
        if snapshot.is_empty() {
            return;
        }

        tracing::debug!(
            "Cancel requested, killing {} in-flight process(es)",
            snapshot.len()
        );

        // Kills fan out in parallel so N slow-to-kill trees cost O(1)
        // wall-clock, not O(N). The scope join still guarantees every kill
        // was issued before we return.
        thread::scope(|scope| {
            for tracked in &snapshot {
                scope.spawn(move || {
                    tracing::debug!(
                        "Killing `{}` (pid {}) after {:.1}s",
                        tracked.program,
                        tracked.pid,
                        tracked.registered.elapsed().as_secs_f64()
                    );
                    kill::kill_tree(tracked.pid);
                });
            }
        });
    }

    /// The cancellation signal for this runner, created lazily on first
    /// access. Every call observes the same signal.
    ///
    /// If [`request_cancel`](JobRunner::request_cancel) ran before the first
    /// call, the returned signal already reports cancelled: a late observer
    /// can never miss a cancel.
    pub fn cancel_signal(&self) -> CancelSignal {
        let signal = self.signal.get_or_init(CancelSignal::new);

        // Covers both cancel-before-first-access and a cancel racing the
        // publication above.
        if self.is_cancelled() {
            signal.trigger();
        }

        signal.clone()
    }

    /// Register a freshly spawned process with the runner.
    ///
    /// Call this immediately after the spawn succeeds, before waiting on the
    /// process, so a cancel arriving in the gap cannot leak an unkillable
    /// child. If the runner is already cancelled the process tree is killed
    /// on the spot rather than left to run unsupervised; it stays registered
    /// until the caller observes the exit and unregisters.
    pub fn register_process(&self, process: &RunningProcess) {
        let pid = process.pid();
        let tracked = TrackedProcess {
            pid,
            program: process.program().display().to_string(),
            registered: Instant::now(),
        };

        let previous = self.lock_active().insert(pid, tracked);
        if previous.is_some() {
            tracing::warn!("Process {} was already registered", pid);
        }

        if self.is_cancelled() {
            tracing::debug!("Runner already cancelled, killing new process {}", pid);
            kill::kill_tree(pid);
        }
    }

    /// Remove a process from the active set once it has exited.
    ///
    /// No-op if the process was never registered or already removed. Callers
    /// should reach this on every exit path (see [`track`](JobRunner::track)
    /// for the guard that guarantees it).
    pub fn unregister_process(&self, process: &RunningProcess) {
        self.unregister_pid(process.pid());
    }

    /// Register a process and return a guard that unregisters it on drop.
    ///
    /// The guard form makes unregistration unconditional: the active set
    /// cannot accumulate stale entries even when the caller's own logic
    /// errors out between spawn and exit.
    pub fn track<'a>(&'a self, process: &RunningProcess) -> ProcessGuard<'a> {
        self.register_process(process);
        ProcessGuard {
            runner: self,
            pid: process.pid(),
        }
    }

    /// Record the transition into active execution.
    pub fn mark_running(&self) {
        let mut state = self.lock_state();
        if *state == JobState::NotStarted {
            *state = JobState::Running;
        }
    }

    /// Record the job's terminal state from its outcome.
    pub fn mark_finished(&self, outcome: &JobOutcome) {
        let mut state = self.lock_state();
        *state = match outcome {
            JobOutcome::Completed => JobState::Completed,
            JobOutcome::Failed { .. } => JobState::Failed,
            JobOutcome::Cancelled => JobState::Cancelled,
        };
    }

    fn unregister_pid(&self, pid: u32) {
        self.lock_active().remove(&pid);
    }

    // The critical sections below never panic, so a poisoned lock only means
    // another thread died elsewhere; recover the data and carry on.
    fn lock_active(&self) -> MutexGuard<'_, HashMap<u32, TrackedProcess>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII registration of a child process with its runner.
///
/// Dropping the guard unregisters the process, whatever path the worker took
/// to get there.
#[derive(Debug)]
pub struct ProcessGuard<'a> {
    runner: &'a JobRunner,
    pid: u32,
}

impl Drop for ProcessGuard<'_> {
    fn drop(&mut self) {
        self.runner.unregister_pid(self.pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_cancelled_after_construction() {
        let runner = JobRunner::new();
        assert!(!runner.is_cancelled());
        assert_eq!(runner.state(), JobState::NotStarted);
    }

    #[test]
    fn test_request_cancel_is_idempotent() {
        let runner = JobRunner::new();

        runner.request_cancel();
        assert!(runner.is_cancelled());

        runner.request_cancel();
        runner.request_cancel();
        assert!(runner.is_cancelled());
        assert_eq!(runner.state(), JobState::CancelRequested);
    }

    #[test]
    fn test_cancel_with_no_processes_or_signal() {
        // Cancel before any signal was requested and with an empty active
        // set must not panic.
        let runner = JobRunner::new();
        runner.request_cancel();
    }

    #[test]
    fn test_cancel_signal_identity() {
        let runner = JobRunner::new();
        let first = runner.cancel_signal();
        let second = runner.cancel_signal();
        assert_eq!(first, second);
    }

    #[test]
    fn test_signal_observes_later_cancel() {
        let runner = JobRunner::new();
        let signal = runner.cancel_signal();
        assert!(!signal.is_cancelled());

        runner.request_cancel();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_cancel_then_observe_ordering() {
        let runner = JobRunner::new();
        runner.request_cancel();

        let signal = runner.cancel_signal();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_cross_thread_cancel_visibility() {
        let runner = JobRunner::new();

        thread::scope(|scope| {
            scope.spawn(|| runner.request_cancel());
        });

        assert!(runner.is_cancelled());
    }

    #[test]
    fn test_mark_running_and_finished() {
        let runner = JobRunner::new();
        runner.mark_running();
        assert_eq!(runner.state(), JobState::Running);

        runner.mark_finished(&JobOutcome::Completed);
        assert_eq!(runner.state(), JobState::Completed);
    }

    #[test]
    fn test_cancel_does_not_clobber_terminal_state() {
        let runner = JobRunner::new();
        runner.mark_running();
        runner.mark_finished(&JobOutcome::Failed { failures: 1 });

        runner.request_cancel();
        assert_eq!(runner.state(), JobState::Failed);
        assert!(runner.is_cancelled());
    }
}
