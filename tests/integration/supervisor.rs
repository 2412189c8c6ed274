#[path = "common/mod.rs"]
mod common;

use common::{
    send_signal, start_orchestrator, wait_for_exit, wait_for_process_exit, wait_for_workers,
};
use nix::sys::signal::Signal;

#[test]
fn replaces_killed_worker_and_shuts_down_on_sigterm() {
    let mut orchestrator =
        start_orchestrator(&["--workers", "2", "--log-level", "debug", "tick", "--interval", "1s"]);
    let parent = orchestrator.id();

    let workers = wait_for_workers(parent, 2, &[]);
    let victim = workers[0];
    let survivor = workers[1];

    send_signal(victim, Signal::SIGKILL);

    // The pool returns to two workers without the killed one.
    let replaced = wait_for_workers(parent, 2, &[victim]);
    assert!(replaced.contains(&survivor));

    send_signal(parent, Signal::SIGTERM);
    let status = wait_for_exit(&mut orchestrator);
    assert!(status.success(), "orchestrator exited with {status:?}");

    for pid in replaced {
        wait_for_process_exit(pid);
    }
}

#[test]
fn zero_workers_runs_one() {
    let mut orchestrator = start_orchestrator(&["--workers", "0", "tick"]);
    let parent = orchestrator.id();

    wait_for_workers(parent, 1, &[]);

    send_signal(parent, Signal::SIGINT);
    let status = wait_for_exit(&mut orchestrator);
    assert!(status.success(), "orchestrator exited with {status:?}");
}

#[test]
fn workers_that_exit_are_replaced_with_new_pids() {
    let mut orchestrator = start_orchestrator(&["--workers", "1", "tick"]);
    let parent = orchestrator.id();

    let first = wait_for_workers(parent, 1, &[]);
    send_signal(first[0], Signal::SIGTERM);
    let second = wait_for_workers(parent, 1, &first);
    send_signal(second[0], Signal::SIGKILL);
    let third = wait_for_workers(parent, 1, &[first[0], second[0]]);

    send_signal(parent, Signal::SIGHUP);
    assert!(wait_for_exit(&mut orchestrator).success());
    wait_for_process_exit(third[0]);
}

#[test]
fn sigquit_stops_the_pool() {
    let mut orchestrator = start_orchestrator(&["--workers", "2", "tick"]);
    let parent = orchestrator.id();

    let workers = wait_for_workers(parent, 2, &[]);

    send_signal(parent, Signal::SIGQUIT);
    let status = wait_for_exit(&mut orchestrator);
    assert!(status.success(), "orchestrator exited with {status:?}");
    for pid in workers {
        wait_for_process_exit(pid);
    }
}
