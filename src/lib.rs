//! Bosun - a cancelable parallel job runner for build-style tasks
//!
//! This crate provides the core library functionality for Bosun: a per-job
//! cancellation supervisor ([`JobRunner`]), a process-spawning layer that
//! cooperates with it, and a parallel dispatcher that fans work items out
//! while honouring an asynchronous cancel request.

pub mod job;
pub mod plan;
pub mod runner;
pub mod util;

pub use job::{JobOutcome, JobState};
pub use plan::{CommandStep, JobPlan};
pub use runner::{CancelSignal, JobRunner};
pub use util::process::{ProcessBuilder, RunningProcess};
