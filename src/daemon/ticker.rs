//! Periodic sweep ticker
//!
//! Sends a `Tick` immediately and then once per period until stopped.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::backup::Trigger;
use crate::error::{SaveKeepError, SaveKeepResult};

/// Background thread feeding `Tick` triggers
pub struct Ticker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Start ticking every `period`, first tick right away
    pub fn start(period: Duration, triggers: Sender<Trigger>) -> SaveKeepResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("sweep-ticker".to_string())
            .spawn(move || loop {
                if triggers.send(Trigger::Tick).is_err() {
                    debug!("event loop closed, stopping ticker");
                    break;
                }
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| SaveKeepError::Watch(format!("Failed to spawn ticker thread: {}", e)))?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop ticking and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
