//! Engine Module
//!
//! Coordinates the keyspace and the append-only log.
//!
//! ## Responsibilities
//! - Replay the log into the keyspace before any client is served
//! - Execute command batches against the keyspace
//! - Queue successfully executed write batches for persistence
//! - Stop the persister and drain the queue on close

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::aof::{Aof, Persister, ReplayStats, DEFAULT_SHUTDOWN_TIMEOUT};
use crate::command::{self, Session};
use crate::config::Config;
use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::protocol::{CommandBatch, WireValue};

/// The main engine
///
/// ## Concurrency Model
///
/// - Every command runs under the `keyspace` mutex, one at a time
/// - A write batch is queued for the log while that mutex is still held, so
///   the log records batches in exactly the order they were executed
/// - The persister thread only touches the queue and the segment files,
///   never the keyspace
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// All keys and values
    keyspace: Mutex<Keyspace>,

    /// Append-only log, absent when persistence is disabled
    aof: Option<Arc<Aof>>,

    /// Background writer; taken on close
    persister: Mutex<Option<Persister>>,

    /// What startup replay found
    replay_stats: ReplayStats,
}

impl Engine {
    /// Open an engine with the given config
    ///
    /// On startup:
    /// 1. Open the log (creating its directory)
    /// 2. Replay every persisted batch through the non-persisting path
    /// 3. Start the persister
    pub fn open(config: Config) -> Result<Self> {
        let keyspace = Mutex::new(Keyspace::new());

        let (aof, replay_stats) = if config.aof_enabled {
            let aof = Arc::new(Aof::open(&config)?);
            let stats = {
                let mut ks = keyspace.lock();
                let mut session = Session::new();
                aof.replay(|batch| Self::apply_to(&mut ks, &mut session, &batch))?
            };
            (Some(aof), stats)
        } else {
            info!("AOF disabled, starting with an empty keyspace");
            (None, ReplayStats::default())
        };

        let persister = match &aof {
            Some(aof) => Some(Persister::start(
                Arc::clone(aof),
                config.aof_initial_delay,
                config.aof_interval,
            )?),
            None => None,
        };

        info!(keys = keyspace.lock().len(), "Engine ready");

        Ok(Self {
            config,
            keyspace,
            aof,
            persister: Mutex::new(persister),
            replay_stats,
        })
    }

    /// Execute one client batch and queue it for the log if it changed state
    pub fn execute(&self, session: &mut Session, batch: CommandBatch) -> WireValue {
        let tokens = match command::tokenize(&batch) {
            Ok(tokens) => tokens,
            Err(e) => return e.into(),
        };
        let kind = match command::classify(&tokens) {
            Ok(kind) => kind,
            Err(e) => return e.into(),
        };

        let mut ks = self.keyspace.lock();
        let reply = command::execute(&mut ks, session, kind, &tokens);

        if kind.is_write() && !reply.is_error() {
            if let Some(aof) = &self.aof {
                if let Some(logged) = command::persisted_tokens(&mut ks, kind, tokens, &reply) {
                    aof.append(logged.into_iter().map(WireValue::bulk).collect());
                }
            }
        }
        reply
    }

    /// Execute a batch without recording it
    ///
    /// Used for replay; anything run through here is assumed to be in the log
    /// already.
    pub fn apply(&self, batch: &[WireValue]) -> WireValue {
        let mut ks = self.keyspace.lock();
        Self::apply_to(&mut ks, &mut Session::new(), batch)
    }

    fn apply_to(ks: &mut Keyspace, session: &mut Session, batch: &[WireValue]) -> WireValue {
        let result = command::tokenize(batch).and_then(|tokens| {
            let kind = command::classify(&tokens)?;
            Ok(command::execute(ks, session, kind, &tokens))
        });
        match result {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "Rejected batch");
                e.into()
            }
        }
    }

    /// Write every queued batch to disk now
    ///
    /// Returns the number of batches written, 0 when persistence is disabled.
    pub fn sync(&self) -> Result<usize> {
        match &self.aof {
            Some(aof) => aof.persist_blocking(),
            None => Ok(0),
        }
    }

    /// Close the engine gracefully
    ///
    /// Stops the persister and drains whatever is still queued. Calling it
    /// twice is harmless.
    pub fn close(&self) -> Result<()> {
        if let Some(mut persister) = self.persister.lock().take() {
            persister.shutdown(DEFAULT_SHUTDOWN_TIMEOUT)?;
        }
        info!("Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The log, if persistence is enabled
    pub fn aof(&self) -> Option<&Arc<Aof>> {
        self.aof.as_ref()
    }

    /// Statistics of the startup replay
    pub fn replay_stats(&self) -> &ReplayStats {
        &self.replay_stats
    }

    /// Number of keys currently stored
    pub fn key_count(&self) -> usize {
        self.keyspace.lock().len()
    }
}
