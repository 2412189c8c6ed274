//! Worker programs run by the `respawn` binary.
use std::{io, net::TcpListener, thread, time::Duration};

use chrono::Local;
use nix::unistd::Pid;
use tiny_http::{Response, Server};
use tracing::{debug, info, warn};

/// Interval used by [`tick`] when none is configured.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Address used by the `serve` worker when none is configured.
pub const DEFAULT_SERVE_ADDR: &str = "127.0.0.1:8080";

/// Prints the worker pid and the local time every `interval`, forever.
pub fn tick(interval: Duration) -> ! {
    let pid = Pid::this();
    info!("Worker {pid} ticking every {interval:?}");
    loop {
        thread::sleep(interval);
        println!(
            "pid-{pid}: time: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
    }
}

/// Body returned by every `serve` worker; names the pid so callers can tell workers apart.
pub fn hello_body(pid: Pid) -> String {
    format!("pid#{pid}: hello")
}

/// Serves HTTP on `listener`, answering every request with [`hello_body`].
///
/// Each connection is handled on its own thread, so a slow or idle client never holds up
/// the others. Failures to answer a request are logged and do not stop the worker.
pub fn serve(listener: TcpListener) -> io::Result<()> {
    let pid = Pid::this();
    info!("Worker {pid} serving on {}", listener.local_addr()?);
    let server = Server::from_listener(listener, None).map_err(io::Error::other)?;

    for request in server.incoming_requests() {
        debug!(
            "Worker {pid} got '{} {}' from {:?}",
            request.method(),
            request.url(),
            request.remote_addr()
        );
        if let Err(err) = request.respond(Response::from_string(hello_body(pid))) {
            warn!("Worker {pid} failed to answer request: {err}");
        }
    }

    Ok(())
}
