//! Cancel-aware parallel fan-out over work items.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;
use rayon::prelude::*;

use crate::job::JobOutcome;
use crate::runner::JobRunner;

/// Options for one dispatch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Parallelism cap; `None` lets rayon pick the core count.
    pub jobs: Option<usize>,
    /// Cancel the remaining work items as soon as one fails.
    pub fail_fast: bool,
}

/// Run `work` over every item with bounded parallelism, supervised by
/// `runner`.
///
/// Each work item checks the cancellation flag before starting and returns
/// early if it is set; items that spawn processes are expected to register
/// them with the runner around the spawn. Failures are tallied in a shared
/// atomic counter, never double-counted, and an item's error maps the job to
/// `Failed` unless cancellation was requested, in which case the job reports
/// `Cancelled` regardless of the count.
///
/// A fail-fast abort is the one exception to cancel-dominance: when the
/// dispatcher itself requested the cancel because an item failed, the
/// failure is the real outcome and is reported as such.
pub fn run<T, F>(runner: &JobRunner, items: &[T], opts: &DispatchOptions, work: F) -> JobOutcome
where
    T: Sync,
    F: Fn(&T) -> Result<()> + Sync,
{
    // Set up rayon thread pool; ignore if already set.
    if let Some(j) = opts.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(j)
            .build_global()
            .ok();
    }

    runner.mark_running();

    let failures = AtomicUsize::new(0);
    let failure_abort = AtomicBool::new(false);

    items.par_iter().for_each(|item| {
        if runner.is_cancelled() {
            return;
        }

        if let Err(e) = work(item) {
            tracing::debug!("Work item failed: {:#}", e);
            failures.fetch_add(1, Ordering::SeqCst);

            if opts.fail_fast {
                failure_abort.store(true, Ordering::SeqCst);
                runner.request_cancel();
            }
        }
    });

    let failed = failures.load(Ordering::SeqCst);
    let externally_cancelled = runner.is_cancelled() && !failure_abort.load(Ordering::SeqCst);

    let outcome = if externally_cancelled {
        JobOutcome::Cancelled
    } else if failed > 0 {
        JobOutcome::Failed { failures: failed }
    } else if runner.is_cancelled() {
        JobOutcome::Cancelled
    } else {
        JobOutcome::Completed
    };

    runner.mark_finished(&outcome);
    outcome
}
