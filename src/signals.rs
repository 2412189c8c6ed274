//! Termination signal source for the orchestrator.
//!
//! SIGINT, SIGTERM and SIGHUP are caught through `ctrlc`, SIGQUIT through `signal-hook`.
//! Both forward into one channel that the event loop selects on alongside worker
//! completions.
use std::{sync::Mutex, thread};

use crossbeam_channel::{Receiver, Sender, bounded};
use signal_hook::{consts::SIGQUIT, iterator::Signals};
use tracing::{debug, info};

use crate::error::SignalError;

static TERMINATION: Mutex<Option<Receiver<()>>> = Mutex::new(None);

/// Returns a receiver that yields once per termination signal delivered to this process.
///
/// The handlers are installed on the first call; later calls share the same channel
/// because a process can only carry one handler. Signals arriving while a previous one is
/// still unconsumed are coalesced.
pub fn termination() -> Result<Receiver<()>, SignalError> {
    let mut slot = TERMINATION
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(rx) = slot.as_ref() {
        return Ok(rx.clone());
    }

    let (tx, rx) = bounded(1);

    let mut quit = Signals::new([SIGQUIT]).map_err(SignalError::Register)?;
    let quit_tx = tx.clone();
    thread::Builder::new()
        .name("sigquit".into())
        .spawn(move || {
            for _ in quit.forever() {
                forward(&quit_tx, "SIGQUIT");
            }
        })
        .map_err(SignalError::Register)?;

    ctrlc::set_handler(move || forward(&tx, "SIGINT, SIGTERM or SIGHUP"))?;

    *slot = Some(rx.clone());
    Ok(rx)
}

fn forward(tx: &Sender<()>, name: &str) {
    info!("Termination signal received ({name})");
    if tx.try_send(()).is_err() {
        debug!("Termination already pending");
    }
}
