//! AOF Persister
//!
//! Dedicated thread that runs writer cycles on a fixed schedule.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{after, bounded, select, tick, Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::store::Aof;
use crate::error::Result;

/// Handle to the persistence thread.
///
/// Dropping the handle shuts the thread down with the default timeout.
pub struct Persister {
    aof: Arc<Aof>,
    /// Disconnecting this sender tells the thread to stop
    stop: Option<Sender<()>>,
    /// Signalled by the thread right before it exits
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

/// How long shutdown waits for an in-flight cycle
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shortest gap between two cycles; a zero interval would spin
pub const MIN_PERSIST_INTERVAL: Duration = Duration::from_millis(1);

impl Persister {
    /// Spawn the persistence thread.
    ///
    /// The first cycle runs after `initial_delay`, then one every `interval`
    /// (never less than `MIN_PERSIST_INTERVAL`).
    pub fn start(aof: Arc<Aof>, initial_delay: Duration, interval: Duration) -> Result<Self> {
        if interval < MIN_PERSIST_INTERVAL {
            warn!(?interval, min = ?MIN_PERSIST_INTERVAL, "AOF interval too short, clamping");
        }
        let interval = interval.max(MIN_PERSIST_INTERVAL);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(1);
        let worker = Arc::clone(&aof);

        let handle = thread::Builder::new()
            .name("aof-persist".to_string())
            .spawn(move || {
                Self::run(&worker, &stop_rx, initial_delay, interval);
                let _ = done_tx.send(());
            })?;

        info!(?initial_delay, ?interval, "AOF persister started");

        Ok(Self {
            aof,
            stop: Some(stop_tx),
            done: done_rx,
            handle: Some(handle),
            interval,
        })
    }

    /// Gap between two cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn run(aof: &Aof, stop: &Receiver<()>, initial_delay: Duration, interval: Duration) {
        select! {
            recv(after(initial_delay)) -> _ => {}
            recv(stop) -> _ => return,
        }

        let ticker = tick(interval);
        loop {
            match aof.persist_cycle() {
                Ok(Some(0)) => {}
                Ok(Some(written)) => debug!(written, "AOF cycle finished"),
                Ok(None) => debug!("AOF cycle skipped"),
                Err(e) => error!(error = %e, "AOF cycle failed, batches stay queued"),
            }

            select! {
                recv(ticker) -> _ => {}
                recv(stop) -> _ => return,
            }
        }
    }

    /// Stop scheduling cycles, wait up to `timeout` for a running one, then
    /// drain whatever is still queued.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        let Some(stop) = self.stop.take() else {
            return Ok(());
        };
        drop(stop);

        if self.done.recv_timeout(timeout).is_err() {
            warn!(?timeout, "AOF persister did not stop in time, skipping final drain");
            return Ok(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("AOF persister thread panicked");
            }
        }

        let written = self.aof.persist_blocking()?;
        info!(written, put_index = self.aof.put_index(), "AOF persister stopped");
        Ok(())
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
            error!(error = %e, "AOF shutdown drain failed");
        }
    }
}
