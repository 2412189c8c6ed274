//! Launch strategies for re-executing the current binary as a worker.
use std::{
    ffi::OsString,
    path::PathBuf,
    process::{Command, Stdio},
};

use nix::unistd::Pid;
use tracing::debug;

use crate::error::LaunchError;

/// Program and arguments a worker is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments passed after the program name. Already carries the worker marker.
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    /// Builds a command that re-executes the running binary with `argv[1..]` of `argv`.
    pub fn current_exe(argv: &[OsString]) -> Result<Self, LaunchError> {
        let program = std::env::current_exe().map_err(LaunchError::CurrentExe)?;
        Ok(Self {
            program,
            args: argv.iter().skip(1).cloned().collect(),
        })
    }

    /// Returns a [`Command`] that inherits the environment and the three standard streams.
    ///
    /// Every other descriptor the orchestrator holds is close-on-exec, so nothing else is
    /// handed to the worker unless a strategy arranges it.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }
}

/// Policy deciding how a worker process is created and which resources it inherits.
pub trait Launcher: Send + Sync {
    /// Starts one worker and returns its process id.
    fn launch(&self, command: &WorkerCommand) -> Result<Pid, LaunchError>;
}

impl<F> Launcher for F
where
    F: Fn(&WorkerCommand) -> Result<Pid, LaunchError> + Send + Sync,
{
    fn launch(&self, command: &WorkerCommand) -> Result<Pid, LaunchError> {
        self(command)
    }
}

/// Default strategy: the worker inherits standard input, output and error only.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioLauncher;

impl Launcher for StdioLauncher {
    fn launch(&self, command: &WorkerCommand) -> Result<Pid, LaunchError> {
        spawn(command.to_command())
    }
}

/// Spawns `cmd` and hands the child over to pid-based supervision.
///
/// The [`std::process::Child`] handle is dropped on purpose: reaping happens through
/// `waitpid` in the exit monitor, which never needs the handle.
pub(crate) fn spawn(mut cmd: Command) -> Result<Pid, LaunchError> {
    debug!("Executing command: {cmd:?}");
    let child = cmd.spawn().map_err(LaunchError::Spawn)?;
    let pid = Pid::from_raw(child.id() as i32);
    debug!("Worker started with PID: {pid}");
    Ok(pid)
}
