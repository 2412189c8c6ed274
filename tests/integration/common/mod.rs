#![allow(dead_code)]

use std::{
    fs,
    net::TcpListener,
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use nix::{
    sys::signal::{self, Signal},
    unistd,
};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// Starts the `respawn` binary as an orchestrator with `args`.
pub fn start_orchestrator(args: &[&str]) -> Child {
    Command::new(assert_cmd::cargo::cargo_bin!("respawn"))
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start respawn")
}

/// Live (non-zombie) child processes of `parent`.
pub fn live_workers(parent: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut workers: Vec<u32> = system
        .processes()
        .values()
        .filter(|process| process.thread_kind().is_none())
        .filter(|process| process.parent() == Some(Pid::from_u32(parent)))
        .filter(|process| !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
        .map(|process| process.pid().as_u32())
        .collect();
    workers.sort_unstable();
    workers
}

/// Waits until `parent` has exactly `expected` live workers, none of them in `excluded`.
pub fn wait_for_workers(parent: u32, expected: usize, excluded: &[u32]) -> Vec<u32> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let workers = live_workers(parent);
        if workers.len() == expected && workers.iter().all(|pid| !excluded.contains(pid)) {
            return workers;
        }

        if Instant::now() >= deadline {
            panic!(
                "Timed out waiting for {expected} workers of {parent}; found {:?}",
                workers
            );
        }

        thread::sleep(Duration::from_millis(100));
    }
}

pub fn send_signal(pid: u32, signal: Signal) {
    signal::kill(unistd::Pid::from_raw(pid as i32), signal).expect("failed to signal process");
}

/// Waits for `child` to exit and returns its status.
pub fn wait_for_exit(child: &mut Child) -> ExitStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait().expect("failed to poll orchestrator") {
            return status;
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("Timed out waiting for orchestrator {} to exit", child.id());
        }

        thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(target_os = "linux")]
pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    let proc_path = PathBuf::from(format!("/proc/{}", pid));
    let stat_path = PathBuf::from(format!("/proc/{}/stat", pid));

    while Instant::now() < deadline {
        if !proc_path.exists() {
            return;
        }

        // Check if process is a zombie (killed but not yet reaped)
        if let Ok(stat) = fs::read_to_string(&stat_path) {
            // The third field in /proc/{pid}/stat is the state character
            // Z = zombie, X = dead
            if let Some(state_start) = stat.rfind(')') {
                let state_part = &stat[state_start + 1..].trim();
                if let Some(state_char) = state_part.chars().next()
                    && (state_char == 'Z' || state_char == 'X')
                {
                    return;
                }
            }
        }

        thread::sleep(Duration::from_millis(100));
    }

    panic!("Timed out waiting for PID {} to exit", pid);
}

/// Returns a loopback address whose port was free a moment ago.
pub fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to probe for a free port");
    listener.local_addr().unwrap().to_string()
}
