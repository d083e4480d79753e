//! Platform-specific process-tree termination.
//!
//! A build step's child process may spawn workers of its own (a compiler
//! driver forking its backend, a shell script fanning out), so killing only
//! the immediate child can leave orphans running. On Unix every child spawned
//! through [`ProcessBuilder::spawn`](crate::util::process::ProcessBuilder::spawn)
//! is the leader of its own process group, and the whole group is killed in
//! one signal. On Windows `taskkill /T /F` walks the tree for us.
//!
//! "Process already exited" is success here, never an error: a kill sweep
//! racing a natural exit is the expected case, not the exceptional one.

/// Kill the process with the given pid and all of its descendants.
///
/// Best-effort: failures are logged at debug/warn level and swallowed. Callers
/// must not rely on the process being gone when this returns; they should keep
/// waiting on the child handle, which is unblocked by the kill.
#[cfg(unix)]
pub fn kill_tree(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => {
            tracing::debug!("Sent SIGKILL to process group {}", pid);
        }
        // The group already exited, or ownership changed on the way out.
        Err(Errno::ESRCH) | Err(Errno::EPERM) => {
            tracing::debug!("Process group {} already exited", pid);
        }
        Err(e) => {
            tracing::warn!("Failed to kill process group {}: {}", pid, e);
        }
    }
}

/// Kill the process with the given pid and all of its descendants.
#[cfg(windows)]
pub fn kill_tree(pid: u32) {
    use crate::util::process::ProcessBuilder;

    let result = ProcessBuilder::new("taskkill")
        .arg("/T")
        .arg("/F")
        .arg("/PID")
        .arg(pid.to_string())
        .exec();

    match result {
        Ok(output) if output.status.success() => {
            tracing::debug!("Killed process tree {}", pid);
        }
        // taskkill fails when the pid is already gone; treat as success.
        Ok(_) => {
            tracing::debug!("Process tree {} already exited", pid);
        }
        Err(e) => {
            tracing::warn!("Failed to run taskkill for pid {}: {}", pid, e);
        }
    }
}
