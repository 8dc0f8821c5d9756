//! Signal handling for graceful shutdown.
//!
//! SIGINT (Ctrl+C) and SIGTERM are turned into a `Shutdown` trigger, so the
//! event currently being handled always runs to completion.

use std::sync::mpsc::Sender;

use tracing::info;

use crate::backup::Trigger;
use crate::error::{SaveKeepError, SaveKeepResult};

/// Register a process-wide handler that sends `Trigger::Shutdown`
///
/// Can only be installed once per process.
pub fn install_shutdown_handler(triggers: Sender<Trigger>) -> SaveKeepResult<()> {
    ctrlc::set_handler(move || {
        info!("termination signal received");
        let _ = triggers.send(Trigger::Shutdown);
    })
    .map_err(|e| SaveKeepError::Config(format!("Failed to install signal handler: {}", e)))
}
