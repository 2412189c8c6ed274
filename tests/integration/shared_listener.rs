#[path = "common/mod.rs"]
mod common;

use std::{
    collections::HashSet,
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    thread,
    time::{Duration, Instant},
};

use assert_cmd::Command;
use common::{
    free_addr, live_workers, send_signal, start_orchestrator, wait_for_exit, wait_for_workers,
};
use nix::sys::signal::Signal;
use predicates::str::contains;

fn get(addr: &str) -> Option<String> {
    let mut stream = TcpStream::connect(addr).ok()?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .ok()?;
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).ok()?;
    Some(response)
}

fn wait_for_response(addr: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(response) = get(addr) {
            return response;
        }

        if Instant::now() >= deadline {
            panic!("Timed out waiting for a response from {addr}");
        }

        thread::sleep(Duration::from_millis(100));
    }
}

fn responder_pid(response: &str) -> u32 {
    let body = response
        .rsplit("\r\n\r\n")
        .next()
        .expect("response has a body");
    body.strip_prefix("pid#")
        .and_then(|rest| rest.strip_suffix(": hello"))
        .and_then(|pid| pid.parse().ok())
        .unwrap_or_else(|| panic!("unexpected body: {body}"))
}

#[test]
fn workers_answer_from_the_shared_listener() {
    let addr = free_addr();
    let mut orchestrator = start_orchestrator(&["--workers", "2", "serve", "--addr", &addr]);
    let parent = orchestrator.id();

    let workers: HashSet<u32> = wait_for_workers(parent, 2, &[]).into_iter().collect();

    let mut responders = HashSet::new();
    for _ in 0..20 {
        let response = wait_for_response(&addr);
        assert!(response.starts_with("HTTP/1.1 200 OK"), "bad response: {response}");
        responders.insert(responder_pid(&response));
    }

    // Only workers answer; the orchestrator never accepts.
    assert!(
        responders.is_subset(&workers),
        "responders {responders:?} are not workers {workers:?}"
    );

    // A replacement keeps serving from the same socket.
    let victim = *workers.iter().next().unwrap();
    send_signal(victim, Signal::SIGKILL);
    wait_for_workers(parent, 2, &[victim]);
    let response = wait_for_response(&addr);
    assert_ne!(responder_pid(&response), victim);

    send_signal(parent, Signal::SIGTERM);
    assert!(wait_for_exit(&mut orchestrator).success());
}

#[test]
fn idle_connections_do_not_stall_the_pool() {
    let addr = free_addr();
    let mut orchestrator = start_orchestrator(&["--workers", "1", "serve", "--addr", &addr]);
    let parent = orchestrator.id();
    let workers = wait_for_workers(parent, 1, &[]);
    wait_for_response(&addr);

    let _idle: Vec<TcpStream> = (0..3)
        .map(|_| TcpStream::connect(&addr).expect("failed to connect idle client"))
        .collect();
    thread::sleep(Duration::from_millis(200));

    let response = get(&addr).expect("worker stopped answering with idle clients connected");
    assert_eq!(responder_pid(&response), workers[0]);

    send_signal(parent, Signal::SIGTERM);
    assert!(wait_for_exit(&mut orchestrator).success());
}

#[test]
fn busy_address_aborts_before_any_worker_starts() {
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap().to_string();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("respawn"));
    cmd.args(["--workers", "2", "serve", "--addr", &addr])
        .timeout(Duration::from_secs(10));
    cmd.assert().failure().stderr(contains("AddrInUse"));

    // The orchestrator is gone and the listener still belongs to this test.
    assert_eq!(occupied.local_addr().unwrap().to_string(), addr);
}

#[test]
fn orchestrator_without_workers_keeps_no_children_after_failure() {
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap().to_string();

    let mut orchestrator = start_orchestrator(&["--workers", "3", "serve", "--addr", &addr]);
    let parent = orchestrator.id();
    let status = wait_for_exit(&mut orchestrator);

    assert!(!status.success());
    assert!(live_workers(parent).is_empty());
}
