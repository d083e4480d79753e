//! Job plan parsing and schema.
//!
//! A plan is a TOML file describing one job: a `[job]` table with execution
//! settings and one `[[step]]` entry per command to run. Steps are
//! independent and may execute in any order, in parallel.
//!
//! ```toml
//! [job]
//! name = "compile-objects"
//! jobs = 4
//! fail-fast = true
//!
//! [[step]]
//! name = "foo.o"
//! program = "cc"
//! args = ["-c", "foo.c", "-o", "foo.o"]
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Error loading or validating a job plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan file `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("plan `{name}` has no steps")]
    Empty { name: String },

    #[error("step `{step}` has an empty program")]
    MissingProgram { step: String },
}

/// One command to run as a work item: program, arguments, working directory,
/// and extra environment. Nothing about the command's own flag syntax or
/// output format is interpreted here.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandStep {
    /// Optional label for status output; defaults to the program name.
    pub name: Option<String>,

    /// Executable path or name to resolve on PATH.
    pub program: String,

    /// Command line arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the process.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Extra environment variables.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl CommandStep {
    /// Label used in status and error output.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.program)
    }
}

/// Execution settings from the `[job]` table.
#[derive(Debug, Clone, Deserialize)]
struct JobSection {
    name: String,

    /// Parallelism cap; absent means one worker per core.
    #[serde(default)]
    jobs: Option<usize>,

    /// Cancel remaining steps as soon as one fails.
    #[serde(default, rename = "fail-fast")]
    fail_fast: bool,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    job: JobSection,

    #[serde(default, rename = "step")]
    steps: Vec<CommandStep>,
}

/// A validated job plan.
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub name: String,
    pub jobs: Option<usize>,
    pub fail_fast: bool,
    pub steps: Vec<CommandStep>,
}

impl JobPlan {
    /// Load and validate a plan from a TOML file.
    pub fn load(path: &Path) -> Result<JobPlan, PlanError> {
        let contents = std::fs::read_to_string(path).map_err(|e| PlanError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        JobPlan::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<JobPlan, PlanError> {
        let file: PlanFile = toml::from_str(contents).map_err(|e| PlanError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        let plan = JobPlan {
            name: file.job.name,
            jobs: file.job.jobs,
            fail_fast: file.job.fail_fast,
            steps: file.steps,
        };

        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty {
                name: self.name.clone(),
            });
        }

        for step in &self.steps {
            if step.program.trim().is_empty() {
                return Err(PlanError::MissingProgram {
                    step: step.label().to_string(),
                });
            }
        }

        Ok(())
    }
}
