//! Shared utilities.

pub mod process;
