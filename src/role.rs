//! Orchestrator/worker role detection from the process arguments.
use std::ffi::{OsStr, OsString};

/// Reserved flag the orchestrator appends to the arguments of every worker it launches.
pub const WORKER_FLAG: &str = "respawn-worker";

/// Which side of the process tree the current process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The original process; launches and supervises workers.
    Orchestrator,
    /// A process launched by the orchestrator to run the worker entry point.
    Worker,
}

/// Inspects `args` for the worker marker and returns the detected role together with the
/// argument list stripped of every marker occurrence.
///
/// The first argument (program name) is never treated as a marker. Both `-respawn-worker`
/// and `--respawn-worker` are recognised, including `=value` suffixed forms.
pub fn detect<I>(args: I) -> (Role, Vec<OsString>)
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut stripped = Vec::new();
    stripped.extend(args.next());

    let mut role = Role::Orchestrator;
    for arg in args {
        if is_marker(&arg) {
            role = Role::Worker;
            continue;
        }
        stripped.push(arg);
    }

    (role, stripped)
}

/// Appends the worker marker so that a process started with `args` detects itself as a worker.
pub fn mark(mut args: Vec<OsString>) -> Vec<OsString> {
    args.push(OsString::from(format!("--{WORKER_FLAG}")));
    args
}

fn is_marker(arg: &OsStr) -> bool {
    // Non UTF-8 arguments can never carry the ASCII marker.
    let Some(arg) = arg.to_str() else {
        return false;
    };

    arg.strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))
        .is_some_and(|flag| flag.starts_with(WORKER_FLAG))
}
