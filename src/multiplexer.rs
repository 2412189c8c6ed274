//! Orchestrator control loop.
//!
//! The loop blocks on every live worker's completion channel plus the termination channel
//! at once. A completed worker is replaced through the launcher; a termination signal
//! kills every tracked worker and ends the loop.
use std::{io, sync::Arc};

use crossbeam_channel::{Receiver, RecvError, Select, TryRecvError};
use nix::unistd::Pid;
use tracing::{debug, error, info, warn};

use crate::{
    launcher::{Launcher, WorkerCommand},
    monitor::{self, ChildExit},
    process,
};

/// One tracked worker.
#[derive(Debug)]
pub struct ChildRecord {
    /// Process id of the worker.
    pub pid: Pid,
    completion: Receiver<ChildExit>,
}

/// Dynamic set of completion channels waited on together with one fixed termination
/// channel.
///
/// Insertion and removal are O(1); the select over the current members is rebuilt per
/// wait. A completion that fires while its record is being removed stays buffered in its
/// channel, so nothing is lost.
#[derive(Debug, Default)]
struct WaitSet {
    records: Vec<ChildRecord>,
}

enum Ready {
    Child {
        index: usize,
        result: Result<ChildExit, RecvError>,
    },
    Termination,
}

impl WaitSet {
    fn insert(&mut self, record: ChildRecord) {
        self.records.push(record);
    }

    fn remove(&mut self, index: usize) -> ChildRecord {
        self.records.swap_remove(index)
    }

    /// Blocks until a completion or the termination channel is ready.
    ///
    /// When several are ready at once one is picked at random.
    fn wait(&self, termination: &Receiver<()>) -> Ready {
        let mut select = Select::new();
        for record in &self.records {
            select.recv(&record.completion);
        }
        let termination_index = select.recv(termination);

        let operation = select.select();
        let index = operation.index();
        if index == termination_index {
            // A disconnected termination sender means no signal can ever arrive; that is
            // treated the same as one arriving now.
            let _ = operation.recv(termination);
            return Ready::Termination;
        }

        let result = operation.recv(&self.records[index].completion);
        Ready::Child { index, result }
    }
}

/// Lifecycle of the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Replacing workers as they exit.
    Running,
    /// Workers have been killed; no further events are handled.
    ShuttingDown,
}

/// Result of handling a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The loop is still running.
    Continue,
    /// The loop has shut down.
    Shutdown,
}

/// Summary returned once the loop has shut down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that accepted the kill request during shutdown.
    pub killed: Vec<Pid>,
    /// Number of workers replaced while running.
    pub respawned: usize,
    /// Number of slots given up because a replacement could not be started.
    pub dropped: usize,
}

/// The orchestrator's event multiplexer.
pub struct EventLoop {
    launcher: Arc<dyn Launcher>,
    command: WorkerCommand,
    termination: Receiver<()>,
    children: WaitSet,
    state: LoopState,
    report: ShutdownReport,
}

impl EventLoop {
    /// Creates an empty loop. Workers are added with [`EventLoop::track`].
    pub fn new(
        launcher: Arc<dyn Launcher>,
        command: WorkerCommand,
        termination: Receiver<()>,
    ) -> Self {
        Self {
            launcher,
            command,
            termination,
            children: WaitSet::default(),
            state: LoopState::Running,
            report: ShutdownReport::default(),
        }
    }

    /// Attaches an exit monitor to `pid` and adds it to the wait-set.
    pub fn track(&mut self, pid: Pid) -> io::Result<()> {
        let completion = monitor::spawn(pid)?;
        self.children.insert(ChildRecord { pid, completion });
        Ok(())
    }

    /// Number of tracked workers.
    pub fn len(&self) -> usize {
        self.children.records.len()
    }

    /// Whether no workers are tracked.
    pub fn is_empty(&self) -> bool {
        self.children.records.is_empty()
    }

    /// Process ids of every tracked worker.
    pub fn live_pids(&self) -> Vec<Pid> {
        self.children.records.iter().map(|record| record.pid).collect()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until a termination signal arrives.
    pub fn run(mut self) -> ShutdownReport {
        debug!("Event loop started with workers {:?}", self.live_pids());
        while self.step() == Step::Continue {}
        info!("Event loop stopped");
        self.report
    }

    /// Blocks for and handles exactly one event.
    pub fn step(&mut self) -> Step {
        if self.state == LoopState::ShuttingDown {
            return Step::Shutdown;
        }

        match self.children.wait(&self.termination) {
            Ready::Termination => self.shutdown(),
            Ready::Child {
                index,
                result: Ok(exit),
            } => {
                self.children.remove(index);
                self.replace(exit)
            }
            Ready::Child {
                index,
                result: Err(_),
            } => {
                let record = self.children.remove(index);
                error!(
                    "Completion channel for worker {} closed without a status; no longer monitoring it",
                    record.pid
                );
                Step::Continue
            }
        }
    }

    fn replace(&mut self, exit: ChildExit) -> Step {
        let ChildExit { pid: old, outcome } = exit;

        // Shutdown wins over a respawn that races with it.
        match self.termination.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                info!("Worker {old} exited ({outcome}) while shutdown is pending; not replacing it");
                return self.shutdown();
            }
            Err(TryRecvError::Empty) => {}
        }

        let pid = match self.launcher.launch(&self.command) {
            Ok(pid) => pid,
            Err(err) => {
                error!("Worker {old} exited ({outcome}); launching a replacement failed: {err}");
                self.report.dropped += 1;
                return Step::Continue;
            }
        };

        match self.track(pid) {
            Ok(()) => {
                info!("Worker {old} exited ({outcome}); monitoring replacement {pid}");
                self.report.respawned += 1;
            }
            Err(err) => {
                error!("Failed to monitor replacement worker {pid}: {err}; giving up the slot");
                process::kill_and_reap(&[pid]);
                self.report.dropped += 1;
            }
        }

        Step::Continue
    }

    fn shutdown(&mut self) -> Step {
        self.state = LoopState::ShuttingDown;

        // A pid whose exit is already reported has been reaped and may belong to another
        // process by now.
        let mut pids = Vec::with_capacity(self.len());
        for record in &self.children.records {
            match record.completion.try_recv() {
                Err(TryRecvError::Empty) => pids.push(record.pid),
                Ok(ChildExit { pid, outcome }) => {
                    debug!("Worker {pid} already exited ({outcome}); not killing it")
                }
                Err(TryRecvError::Disconnected) => {
                    debug!("Worker {} is no longer monitored; not killing it", record.pid)
                }
            }
        }

        if pids.is_empty() {
            warn!("Shutting down with no live workers");
        } else {
            info!("Shutting down; killing workers {pids:?}");
        }
        self.report.killed = process::kill_all(&pids);
        Step::Shutdown
    }
}
