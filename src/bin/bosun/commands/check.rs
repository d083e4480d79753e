//! `bosun check` command
//!
//! Validates a plan without running anything: parses it, then resolves every
//! step's program on PATH.

use std::path::Path;

use anyhow::{bail, Result};

use bosun::util::process::find_executable;
use bosun::JobPlan;

use crate::cli::CheckArgs;

pub fn execute(args: CheckArgs) -> Result<()> {
    let plan = JobPlan::load(&args.plan)?;

    let mut missing = 0;
    for step in &plan.steps {
        // Absolute or relative paths are checked directly; bare names go
        // through PATH resolution.
        let program = Path::new(&step.program);
        let resolved = if program.components().count() > 1 {
            program.exists().then(|| program.to_path_buf())
        } else {
            find_executable(&step.program)
        };

        match resolved {
            Some(path) => eprintln!("          ok {} -> {}", step.label(), path.display()),
            None => {
                eprintln!("     missing {} ({})", step.label(), step.program);
                missing += 1;
            }
        }
    }

    if missing > 0 {
        bail!("{} step program(s) not found", missing);
    }

    eprintln!(
        "     Checked plan `{}`: {} step(s) ok",
        plan.name,
        plan.steps.len()
    );
    Ok(())
}
