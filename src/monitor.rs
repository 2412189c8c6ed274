//! Per-worker exit monitor.
use std::{fmt, io, thread};

use crossbeam_channel::{Receiver, Sender, bounded};
use nix::{
    errno::Errno,
    sys::{
        signal::Signal,
        wait::{WaitStatus, waitpid},
    },
    unistd::Pid,
};
use tracing::{debug, error, info, warn};

/// How a monitored worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The worker exited with the given code.
    Exited(i32),
    /// The worker was terminated by a signal.
    Signaled(Signal),
    /// The worker could not be waited on; it is treated as gone.
    Unknown(String),
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exit status {code}"),
            ExitOutcome::Signaled(signal) => write!(f, "signal: {signal}"),
            ExitOutcome::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// Completion notification sent once per monitored worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildExit {
    /// The worker that ended.
    pub pid: Pid,
    /// How it ended.
    pub outcome: ExitOutcome,
}

/// Sends the completion value when dropped, so the notification also goes out if the
/// monitor thread unwinds.
struct Completion {
    pid: Pid,
    outcome: Option<ExitOutcome>,
    tx: Sender<ChildExit>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| ExitOutcome::Unknown("monitor stopped before reaping".into()));

        // The receiver is gone once the event loop has shut down.
        if self
            .tx
            .try_send(ChildExit {
                pid: self.pid,
                outcome,
            })
            .is_err()
        {
            debug!("Completion for pid {} had no listener", self.pid);
        }
    }
}

/// Starts a monitor thread for `pid` and returns the receiving end of its completion
/// channel.
///
/// The thread blocks until the worker is reaped, logs its status and delivers exactly one
/// [`ChildExit`]. A wait failure is logged and delivered as [`ExitOutcome::Unknown`].
pub fn spawn(pid: Pid) -> io::Result<Receiver<ChildExit>> {
    let (tx, rx) = bounded(1);

    thread::Builder::new()
        .name(format!("exit-monitor-{pid}"))
        .spawn(move || {
            let mut completion = Completion {
                pid,
                outcome: None,
                tx,
            };
            completion.outcome = Some(wait_for_exit(pid));
        })?;

    Ok(rx)
}

fn wait_for_exit(pid: Pid) -> ExitOutcome {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                if code == 0 {
                    info!("Worker {pid} exited normally.");
                } else {
                    warn!("Worker {pid} exited with status {code}.");
                }
                return ExitOutcome::Exited(code);
            }
            Ok(WaitStatus::Signaled(_, signal, core_dumped)) => {
                warn!("Worker {pid} was terminated by {signal} (core dumped: {core_dumped}).");
                return ExitOutcome::Signaled(signal);
            }
            Ok(status) => {
                debug!("Worker {pid} reported {status:?}; still waiting");
            }
            Err(Errno::EINTR) => continue,
            Err(err) => {
                error!("Failed to wait on worker {pid}: {err}");
                return ExitOutcome::Unknown(err.to_string());
            }
        }
    }
}
