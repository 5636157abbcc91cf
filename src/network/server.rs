//! TCP Server
//!
//! Accepts connections and runs each one on its own thread.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::connection::Connection;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{KvError, Result};

/// How often the accept loop checks the shutdown flag
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// TCP server for ringkv
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

/// Releases a connection slot when the connection thread ends
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Server {
    /// Bind the listen address. Failing to bind is fatal.
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            KvError::Network(format!("cannot bind {}: {}", config.listen_addr, e))
        })?;
        // Non-blocking accept so the loop can observe the shutdown flag
        listener.set_nonblocking(true)?;

        tracing::info!(addr = %listener.local_addr()?, "Listening");

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops the accept loop once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Number of open client connections
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Accept connections until shutdown is signalled (blocking)
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => tracing::warn!(error = %e, "Accept failed"),
            }
        }

        tracing::info!(active = self.active_connections(), "Accept loop stopped");
        Ok(())
    }

    fn dispatch(&self, mut stream: TcpStream, addr: SocketAddr) {
        if self.active.fetch_add(1, Ordering::AcqRel) >= self.config.max_connections {
            self.active.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!(%addr, max = self.config.max_connections, "Connection limit reached");
            let _ = stream.write_all(b"-ERR max number of clients reached\r\n");
            return;
        }
        let slot = SlotGuard(Arc::clone(&self.active));

        let engine = Arc::clone(&self.engine);
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", addr))
            .spawn(move || {
                let _slot = slot;
                if let Err(e) = Self::serve(stream, engine, read_ms, write_ms) {
                    tracing::warn!(%addr, error = %e, "Connection ended with error");
                }
            });

        if let Err(e) = spawned {
            tracing::error!(%addr, error = %e, "Failed to spawn connection thread");
        }
    }

    fn serve(stream: TcpStream, engine: Arc<Engine>, read_ms: u64, write_ms: u64) -> Result<()> {
        // Accepted sockets inherit non-blocking mode on some platforms
        stream.set_nonblocking(false)?;
        let mut conn = Connection::new(stream, engine)?;
        conn.set_timeouts(read_ms, write_ms)?;
        conn.handle()
    }
}
