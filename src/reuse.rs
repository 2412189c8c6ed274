//! Socket-reuse launch strategy: every worker inherits one pre-bound listening socket.
//!
//! The orchestrator binds the address exactly once. Each worker receives a duplicate of the
//! listener at [`INHERITED_LISTENER_FD`], so all workers accept from the same kernel queue
//! and nobody races to bind.
use std::{
    io,
    net::{SocketAddr, TcpListener},
    os::{
        fd::{AsRawFd, FromRawFd, RawFd},
        unix::process::CommandExt,
    },
    sync::{Arc, OnceLock},
};

use nix::unistd::Pid;
use tracing::{debug, info};

use crate::{
    error::LaunchError,
    launcher::{self, Launcher, WorkerCommand},
};

/// Descriptor number the shared listener occupies inside every worker, right after stdio.
pub const INHERITED_LISTENER_FD: RawFd = 3;

/// Launch strategy that shares one listening TCP socket with every worker.
#[derive(Debug)]
pub struct SharedListenerLauncher {
    addr: String,
    listener: OnceLock<Result<TcpListener, Arc<io::Error>>>,
}

impl SharedListenerLauncher {
    /// Creates a launcher that will bind `addr` on its first launch.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            listener: OnceLock::new(),
        }
    }

    /// Address the listener binds.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Binds the listener on first use and returns its descriptor.
    ///
    /// Later calls return the same descriptor, or the same bind failure, without touching
    /// the network stack again.
    pub fn listener_fd(&self) -> Result<RawFd, LaunchError> {
        self.listener().map(AsRawFd::as_raw_fd)
    }

    /// Local address of the bound listener, binding it first if needed.
    pub fn local_addr(&self) -> Result<SocketAddr, LaunchError> {
        self.listener()?.local_addr().map_err(|err| LaunchError::Listener {
            addr: self.addr.clone(),
            source: Arc::new(err),
        })
    }

    fn listener(&self) -> Result<&TcpListener, LaunchError> {
        let slot = self.listener.get_or_init(|| {
            let result = TcpListener::bind(&self.addr).map_err(Arc::new);
            match &result {
                Ok(listener) => info!(
                    "Shared listener bound on {} (fd {})",
                    self.addr,
                    listener.as_raw_fd()
                ),
                Err(err) => debug!("Binding shared listener on {} failed: {err}", self.addr),
            }
            result
        });

        slot.as_ref().map_err(|source| LaunchError::Listener {
            addr: self.addr.clone(),
            source: Arc::clone(source),
        })
    }
}

impl Launcher for SharedListenerLauncher {
    fn launch(&self, command: &WorkerCommand) -> Result<Pid, LaunchError> {
        let fd = self.listener_fd()?;
        let mut cmd = command.to_command();

        unsafe {
            cmd.pre_exec(move || {
                if fd == INHERITED_LISTENER_FD {
                    // Already in place; only the close-on-exec flag has to go.
                    let flags = libc::fcntl(fd, libc::F_GETFD);
                    if flags < 0
                        || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0
                    {
                        return Err(io::Error::last_os_error());
                    }
                } else if libc::dup2(fd, INHERITED_LISTENER_FD) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        launcher::spawn(cmd)
    }
}

/// Rebuilds the listener a worker inherited from a [`SharedListenerLauncher`].
///
/// Fails with `EBADF` when the process was not started with an inherited listener.
pub fn inherited_listener() -> io::Result<TcpListener> {
    if unsafe { libc::fcntl(INHERITED_LISTENER_FD, libc::F_GETFD) } < 0 {
        return Err(io::Error::last_os_error());
    }

    let listener = unsafe { TcpListener::from_raw_fd(INHERITED_LISTENER_FD) };
    // Guards against fd 3 being something other than a socket.
    listener.local_addr()?;
    Ok(listener)
}
