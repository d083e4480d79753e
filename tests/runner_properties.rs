//! Observable properties of the job runner, exercised with real processes.

use std::thread;
use std::time::{Duration, Instant};

use bosun::JobRunner;

#[cfg(unix)]
use bosun::job::dispatch::{self, DispatchOptions};
#[cfg(unix)]
use bosun::{JobOutcome, ProcessBuilder, RunningProcess};

/// Bound on how long a killed process may take to actually exit.
const KILL_WAIT: Duration = Duration::from_secs(5);

#[cfg(unix)]
fn spawn_sleep() -> RunningProcess {
    ProcessBuilder::new("sleep").arg("30").spawn().unwrap()
}

/// Poll until the process exits or the timeout elapses.
#[cfg(unix)]
fn wait_for_exit(process: &mut RunningProcess, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process.is_alive() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn test_flag_false_then_true_and_sticky() {
    let runner = JobRunner::new();
    assert!(!runner.is_cancelled());

    runner.request_cancel();
    assert!(runner.is_cancelled());

    runner.request_cancel();
    runner.request_cancel();
    assert!(runner.is_cancelled());
}

#[test]
fn test_cancel_from_many_threads_never_panics() {
    let runner = JobRunner::new();

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| runner.request_cancel());
        }
    });

    assert!(runner.is_cancelled());
}

#[test]
fn test_signal_is_created_once() {
    let runner = JobRunner::new();
    let first = runner.cancel_signal();
    let second = runner.cancel_signal();

    assert_eq!(first, second);

    // Both observe the same underlying state.
    runner.request_cancel();
    assert!(first.is_cancelled());
    assert!(second.is_cancelled());
}

#[test]
fn test_signal_obtained_after_cancel_is_already_cancelled() {
    let runner = JobRunner::new();
    runner.request_cancel();

    let signal = runner.cancel_signal();
    assert!(signal.is_cancelled());
}

#[test]
fn test_concurrent_signal_access_yields_one_signal() {
    let runner = JobRunner::new();

    let signals: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| runner.cancel_signal())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for signal in &signals[1..] {
        assert_eq!(signals[0], *signal);
    }
}

#[test]
fn test_cancel_flag_visible_across_threads() {
    let runner = JobRunner::new();

    thread::scope(|scope| {
        let observer = scope.spawn(|| {
            let start = Instant::now();
            while start.elapsed() < KILL_WAIT {
                if runner.is_cancelled() {
                    return true;
                }
                thread::sleep(Duration::from_millis(10));
            }
            false
        });

        thread::sleep(Duration::from_millis(100));
        runner.request_cancel();

        assert!(observer.join().unwrap());
    });
}

#[cfg(unix)]
#[test]
fn test_register_after_cancel_kills_process() {
    let runner = JobRunner::new();
    runner.request_cancel();

    let mut process = spawn_sleep();
    runner.register_process(&process);

    assert!(
        wait_for_exit(&mut process, KILL_WAIT),
        "process registered into a cancelled runner must be killed"
    );
    runner.unregister_process(&process);
}

#[cfg(unix)]
#[test]
fn test_cancel_kills_registered_process() {
    let runner = JobRunner::new();

    let mut process = spawn_sleep();
    runner.register_process(&process);
    assert!(process.is_alive());

    runner.request_cancel();

    assert!(
        wait_for_exit(&mut process, KILL_WAIT),
        "registered process must be killed by request_cancel"
    );
    runner.unregister_process(&process);
}

#[cfg(unix)]
#[test]
fn test_unregistered_process_survives_cancel() {
    let runner = JobRunner::new();

    let mut process = spawn_sleep();
    runner.register_process(&process);
    runner.unregister_process(&process);

    runner.request_cancel();

    // Give a racing kill sweep every chance to show up (there must be none).
    thread::sleep(Duration::from_millis(300));
    assert!(
        process.is_alive(),
        "unregistered process must not be touched by the kill sweep"
    );

    // Clean up the survivor.
    process.kill_tree();
    assert!(wait_for_exit(&mut process, KILL_WAIT));
}

#[cfg(unix)]
#[test]
fn test_kill_reaches_descendant_processes() {
    let runner = JobRunner::new();

    // The shell spawns its own child; killing the tree must take both down.
    let mut process = ProcessBuilder::new("sh")
        .arg("-c")
        .arg("sleep 30 & wait")
        .spawn()
        .unwrap();
    runner.register_process(&process);

    runner.request_cancel();

    assert!(wait_for_exit(&mut process, KILL_WAIT));
    runner.unregister_process(&process);
}

#[cfg(unix)]
#[test]
fn test_fanout_cancelled_not_failed() {
    let runner = JobRunner::new();
    let items: Vec<usize> = (0..4).collect();
    let start = Instant::now();

    let outcome = thread::scope(|scope| {
        let dispatcher = scope.spawn(|| {
            dispatch::run(&runner, &items, &DispatchOptions::default(), |_| {
                let process = ProcessBuilder::new("sleep").arg("30").spawn()?;
                let _guard = runner.track(&process);
                let output = process.wait_with_output()?;
                if !output.status.success() {
                    anyhow::bail!("sleep was killed");
                }
                Ok(())
            })
        });

        // Let the workers get their processes in flight, then cancel from
        // the supervisor thread.
        thread::sleep(Duration::from_millis(500));
        runner.request_cancel();

        dispatcher.join().unwrap()
    });

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert!(
        start.elapsed() < Duration::from_secs(15),
        "cancel must unblock the waits well before the sleeps finish"
    );
}
