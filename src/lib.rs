//! Respawn is a self-respawning process supervisor. A single executable re-executes
//! itself to run a fixed pool of worker processes, replaces any worker that exits, and
//! kills the whole pool when the orchestrator receives a termination signal. Workers can
//! optionally share one pre-bound listening socket.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Worker programs used by the `respawn` binary.
pub mod demo;

/// Error handling.
pub mod error;

/// Launch strategies.
pub mod launcher;

/// Exit monitors.
pub mod monitor;

/// Orchestrator event loop.
pub mod multiplexer;

/// Signal delivery to workers.
pub mod process;

/// Shared listening socket strategy.
pub mod reuse;

/// Orchestrator/worker role detection.
pub mod role;

/// Termination signal source.
pub mod signals;

/// Supervisor entry point.
pub mod supervisor;


pub use error::{LaunchError, SignalError, SupervisorError};
pub use launcher::{Launcher, StdioLauncher, WorkerCommand};
pub use reuse::SharedListenerLauncher;
pub use supervisor::{Supervisor, SupervisorConfig};
