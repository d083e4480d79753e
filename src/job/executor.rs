//! Job executor with progress reporting.

use std::time::Instant;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::job::dispatch::{self, DispatchOptions};
use crate::job::JobOutcome;
use crate::plan::{CommandStep, JobPlan};
use crate::runner::JobRunner;
use crate::util::process::ProcessBuilder;

/// Runs a job plan's steps through the dispatcher with progress tracking.
pub struct JobExecutor<'a> {
    runner: &'a JobRunner,
    verbose: bool,
}

impl<'a> JobExecutor<'a> {
    /// Create a new executor supervised by the given runner.
    pub fn new(runner: &'a JobRunner) -> Self {
        JobExecutor {
            runner,
            verbose: false,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Execute every step of the plan in parallel and report the outcome.
    pub fn execute(&self, plan: &JobPlan, opts: &DispatchOptions) -> JobOutcome {
        let start = Instant::now();

        if self.verbose {
            eprintln!("     Running {} step(s)", plan.steps.len());
        }

        let pb = if !self.verbose && plan.steps.len() > 1 {
            let pb = ProgressBar::new(plan.steps.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let outcome = dispatch::run(self.runner, &plan.steps, opts, |step| {
            let result = self.run_step(step);

            if let Some(ref pb) = pb {
                pb.inc(1);
            } else if self.verbose {
                match &result {
                    Ok(()) => eprintln!("          ok {}", step.label()),
                    Err(e) => eprintln!("      failed {}: {:#}", step.label(), e),
                }
            }

            result
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let elapsed = start.elapsed();
        eprintln!(
            "    Finished job `{}`: {} in {:.2}s",
            plan.name,
            outcome,
            elapsed.as_secs_f64()
        );

        outcome
    }

    /// Run one step: spawn its process, keep it registered with the runner
    /// for the whole wait, and map a non-zero exit to an error.
    fn run_step(&self, step: &CommandStep) -> Result<()> {
        let mut cmd = ProcessBuilder::new(&step.program).args(&step.args);

        if let Some(ref cwd) = step.cwd {
            cmd = cmd.cwd(cwd);
        }
        for (key, value) in &step.env {
            cmd = cmd.env(key, value);
        }

        tracing::debug!("Spawning `{}`", cmd.display_command());

        let process = cmd.spawn()?;
        let _guard = self.runner.track(&process);

        let output = process.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "step `{}` failed with exit code {:?}\n{}",
                step.label(),
                output.status.code(),
                stderr.trim_end()
            );
        }

        Ok(())
    }
}
