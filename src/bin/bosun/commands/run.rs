//! `bosun run` command

use anyhow::{bail, Result};

use bosun::job::dispatch::DispatchOptions;
use bosun::job::executor::JobExecutor;
use bosun::{JobOutcome, JobPlan, JobRunner};

use crate::cli::RunArgs;

pub fn execute(args: RunArgs, verbose: bool) -> Result<()> {
    let plan = JobPlan::load(&args.plan)?;

    // CLI flags override the plan's settings.
    let opts = DispatchOptions {
        jobs: args.jobs.or(plan.jobs),
        fail_fast: args.fail_fast || plan.fail_fast,
    };

    let runner = JobRunner::new();
    let outcome = JobExecutor::new(&runner).verbose(verbose).execute(&plan, &opts);

    match outcome {
        JobOutcome::Completed => Ok(()),
        JobOutcome::Failed { failures } => bail!("{} step(s) failed", failures),
        JobOutcome::Cancelled => bail!("job `{}` was cancelled", plan.name),
    }
}
