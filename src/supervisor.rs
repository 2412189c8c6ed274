//! Supervisor entry point wiring role detection, launching, monitoring and the event loop.
use std::{ffi::OsString, sync::Arc};

use crossbeam_channel::Receiver;
use nix::unistd::Pid;
use tracing::{debug, error, info};

use crate::{
    error::SupervisorError,
    launcher::{Launcher, StdioLauncher, WorkerCommand},
    multiplexer::{EventLoop, ShutdownReport},
    process,
    role::{self, Role},
    signals,
};

/// Worker count used when the configured count is zero.
pub const DEFAULT_WORKERS: usize = 1;

/// Function a worker process runs. Receives the argument list with the worker marker removed.
pub type WorkerEntry = Box<dyn FnOnce(Vec<OsString>)>;

/// Caller-facing configuration of a [`Supervisor`].
#[derive(Default)]
pub struct SupervisorConfig {
    workers: usize,
    entry: Option<WorkerEntry>,
    launcher: Option<Arc<dyn Launcher>>,
    args: Option<Vec<OsString>>,
}

impl SupervisorConfig {
    /// Creates a configuration where every setting falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of workers to keep alive. Zero means [`DEFAULT_WORKERS`].
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Function run by every worker process. Defaults to a no-op.
    pub fn entry<F>(mut self, entry: F) -> Self
    where
        F: FnOnce(Vec<OsString>) + 'static,
    {
        self.entry = Some(Box::new(entry));
        self
    }

    /// Strategy used to create workers. Defaults to [`StdioLauncher`].
    pub fn launcher<L>(mut self, launcher: L) -> Self
    where
        L: Launcher + 'static,
    {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Argument list the process was started with, program name first. Defaults to
    /// [`std::env::args_os`].
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }
}

/// Keeps a fixed pool of copies of the running binary alive.
pub struct Supervisor {
    role: Role,
    args: Vec<OsString>,
    workers: usize,
    entry: WorkerEntry,
    launcher: Arc<dyn Launcher>,
}

impl Supervisor {
    /// Resolves the defaults of `config` and detects the role of this process.
    pub fn new(config: SupervisorConfig) -> Self {
        let SupervisorConfig {
            workers,
            entry,
            launcher,
            args,
        } = config;

        let args = args.unwrap_or_else(|| std::env::args_os().collect());
        let (role, args) = role::detect(args);

        Self {
            role,
            args,
            workers: if workers == 0 { DEFAULT_WORKERS } else { workers },
            entry: entry.unwrap_or_else(|| Box::new(|_: Vec<OsString>| {})),
            launcher: launcher.unwrap_or_else(|| Arc::new(StdioLauncher)),
        }
    }

    /// Role this process was detected to play.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Resolved worker count.
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Runs the supervisor.
    ///
    /// A worker runs its entry point and returns `Ok(None)`. The orchestrator launches the
    /// pool, supervises it until SIGINT, SIGTERM or SIGHUP arrives, and returns the shutdown
    /// report.
    pub fn run(self) -> Result<Option<ShutdownReport>, SupervisorError> {
        if self.role == Role::Worker {
            self.run_worker();
            return Ok(None);
        }

        let termination = signals::termination()?;
        self.orchestrate(termination).map(Some)
    }

    /// Like [`Supervisor::run`], with shutdown driven by `termination` instead of OS signals.
    pub fn run_with_termination(
        self,
        termination: Receiver<()>,
    ) -> Result<Option<ShutdownReport>, SupervisorError> {
        if self.role == Role::Worker {
            self.run_worker();
            return Ok(None);
        }

        self.orchestrate(termination).map(Some)
    }

    fn run_worker(self) {
        debug!("Running worker entry point in pid {}", Pid::this());
        (self.entry)(self.args);
    }

    fn orchestrate(
        self,
        termination: Receiver<()>,
    ) -> Result<ShutdownReport, SupervisorError> {
        let command = WorkerCommand::current_exe(&role::mark(self.args))?;
        info!("Starting {} worker(s) from {:?}", self.workers, command.program);

        let mut pids = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            match self.launcher.launch(&command) {
                Ok(pid) => pids.push(pid),
                Err(err) => {
                    error!("Failed to launch worker: {err}");
                    release(&pids, 0);
                    return Err(err.into());
                }
            }
        }

        let mut event_loop = EventLoop::new(Arc::clone(&self.launcher), command, termination);
        for (index, &pid) in pids.iter().enumerate() {
            if let Err(source) = event_loop.track(pid) {
                error!("Failed to monitor worker {pid}: {source}");
                release(&pids, index);
                return Err(SupervisorError::Monitor {
                    pid: pid.as_raw(),
                    source,
                });
            }
        }

        Ok(event_loop.run())
    }
}

/// Kills a pool whose setup failed. The first `monitored` workers are reaped by their
/// exit monitors; the rest are reaped here.
fn release(pids: &[Pid], monitored: usize) {
    let (watched, unwatched) = pids.split_at(monitored);
    process::kill_all(watched);
    process::kill_and_reap(unwatched);
}
