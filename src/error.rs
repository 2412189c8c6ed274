//! Error handling for respawn.
use std::{io, sync::Arc};

use thiserror::Error;

/// Errors raised while creating a worker process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The path of the running executable could not be resolved.
    #[error("Failed to resolve current executable: {0}")]
    CurrentExe(#[source] io::Error),

    /// The OS refused to create the worker process.
    #[error("Failed to spawn worker process: {0}")]
    Spawn(#[source] io::Error),

    /// The shared listening socket could not be bound.
    ///
    /// The source is reference counted so that the cached failure can be handed to
    /// every later launch attempt.
    #[error("Failed to listen on '{addr}': {source}")]
    Listener {
        /// The address the listener was asked to bind.
        addr: String,
        /// The underlying error that occurred.
        #[source]
        source: Arc<io::Error>,
    },
}

impl LaunchError {
    /// Returns the underlying I/O error kind.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            LaunchError::CurrentExe(err) | LaunchError::Spawn(err) => err.kind(),
            LaunchError::Listener { source, .. } => source.kind(),
        }
    }
}

/// Errors returned by [`crate::supervisor::Supervisor::run`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A worker could not be launched while the initial pool was being created.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The termination signal handlers could not be installed.
    #[error(transparent)]
    Signal(#[from] SignalError),

    /// An exit monitor thread could not be started.
    #[error("Failed to start exit monitor for pid {pid}: {source}")]
    Monitor {
        /// The worker the monitor was meant to watch.
        pid: i32,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },
}

/// Errors raised while installing the termination signal handlers.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The SIGINT, SIGTERM and SIGHUP handler could not be set.
    #[error("Failed to install termination handler: {0}")]
    Handler(#[from] ctrlc::Error),

    /// The SIGQUIT handler or its forwarding thread could not be set up.
    #[error("Failed to register SIGQUIT handler: {0}")]
    Register(#[source] io::Error),
}

/// Errors raised while loading the `respawn` configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A `${VAR}` reference names an unset environment variable.
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    /// A value could not be interpreted.
    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        /// The offending configuration key.
        field: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
}
