//! Signal delivery to worker processes.
use nix::{
    sys::{
        signal::{self, Signal},
        wait::waitpid,
    },
    unistd::Pid,
};
use tracing::{error, info};

/// Sends `SIGKILL` to every pid in `pids`.
///
/// Failures are logged and never stop the remaining kills. Returns the pids that accepted
/// the signal.
pub fn kill_all<'a, I>(pids: I) -> Vec<Pid>
where
    I: IntoIterator<Item = &'a Pid>,
{
    let mut killed = Vec::new();
    for &pid in pids {
        match signal::kill(pid, Signal::SIGKILL) {
            Ok(()) => {
                info!("Killed worker {pid}");
                killed.push(pid);
            }
            Err(err) => error!("Failed to kill worker {pid}: {err}"),
        }
    }
    killed
}

/// Like [`kill_all`], then waits for every killed pid.
///
/// Only for children that no exit monitor is waiting on. Reap failures are logged.
pub fn kill_and_reap<'a, I>(pids: I) -> Vec<Pid>
where
    I: IntoIterator<Item = &'a Pid>,
{
    let killed = kill_all(pids);
    for &pid in &killed {
        if let Err(err) = waitpid(pid, None) {
            error!("Failed to reap worker {pid}: {err}");
        }
    }
    killed
}
