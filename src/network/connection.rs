//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{self, BufWriter, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;

use crate::command::Session;
use crate::engine::Engine;
use crate::error::{ProtocolError, Result};
use crate::protocol::{decode_frame, encode, WireValue};

/// Size of one socket read
const READ_CHUNK: usize = 16 * 1024;

/// Largest amount of undecoded input held for one client (1 GiB)
const MAX_QUERY_BUFFER: usize = 1024 * 1024 * 1024;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader
    reader: TcpStream,

    /// TCP stream writer (buffered so pipelined replies go out together)
    writer: BufWriter<TcpStream>,

    /// Bytes received but not yet decoded
    buffer: BytesMut,

    /// Encoded replies waiting to be written
    out: BytesMut,

    /// Reference to the engine
    engine: Arc<Engine>,

    /// Per-client command state
    session: Session,

    /// Peer address for logging
    peer_addr: String,
}

/// Why the read loop ended
enum Outcome {
    Continue,
    Close,
}

impl Connection {
    /// Create a new connection handler
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: read_stream,
            writer: BufWriter::new(write_stream),
            buffer: BytesMut::with_capacity(READ_CHUNK),
            out: BytesMut::new(),
            engine,
            session: Session::new(),
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 = none)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Every complete frame in the buffer is executed in arrival order before
    /// the replies are flushed, so pipelined requests cost one write.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "Connection established");

        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let outcome = self.process_buffered();
            if let Err(e) = self.flush_replies() {
                return self.finish_io(e);
            }
            if let Outcome::Close = outcome {
                tracing::debug!(peer = %self.peer_addr, "Connection closed by server");
                return Ok(());
            }

            let n = match self.reader.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!(peer = %self.peer_addr, "Client disconnected");
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return self.finish_io(e),
            };
            self.buffer.extend_from_slice(&chunk[..n]);

            if self.buffer.len() > MAX_QUERY_BUFFER {
                tracing::warn!(
                    peer = %self.peer_addr,
                    pending = self.buffer.len(),
                    "Query buffer limit exceeded"
                );
                let reply = WireValue::error("Protocol error: query buffer limit exceeded");
                encode(std::slice::from_ref(&reply), &mut self.out);
                if let Err(e) = self.flush_replies() {
                    return self.finish_io(e);
                }
                return Ok(());
            }
        }
    }

    /// Execute every complete frame currently buffered
    fn process_buffered(&mut self) -> Outcome {
        loop {
            let batch = match decode_frame(&mut self.buffer) {
                Ok(Some(batch)) => batch,
                Ok(None) => return Outcome::Continue,
                Err(ProtocolError::Incomplete) => return Outcome::Continue,
                Err(ProtocolError::Malformed(reason)) => {
                    tracing::warn!(peer = %self.peer_addr, %reason, "Malformed frame");
                    let reply = WireValue::Error(format!("ERR Protocol error: {}", reason));
                    encode(std::slice::from_ref(&reply), &mut self.out);
                    return Outcome::Close;
                }
            };

            if batch.is_empty() {
                continue;
            }

            tracing::trace!(peer = %self.peer_addr, ?batch, "Received batch");
            let reply = self.engine.execute(&mut self.session, batch);
            encode(std::slice::from_ref(&reply), &mut self.out);

            if self.session.quit {
                return Outcome::Close;
            }
        }
    }

    fn flush_replies(&mut self) -> io::Result<()> {
        if self.out.is_empty() {
            return Ok(());
        }
        self.writer.write_all(&self.out)?;
        self.writer.flush()?;
        self.out.clear();
        Ok(())
    }

    /// Map an I/O failure to the connection outcome. A peer that went away or
    /// a timeout is a normal end of the connection, not a server error.
    fn finish_io(&self, e: io::Error) -> Result<()> {
        match e.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => {
                tracing::debug!(peer = %self.peer_addr, error = %e, "Client went away");
                Ok(())
            }
            // Read timeout (Windows reports TimedOut instead of WouldBlock)
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                tracing::debug!(peer = %self.peer_addr, "Client timed out");
                Ok(())
            }
            _ => {
                tracing::warn!(peer = %self.peer_addr, error = %e, "Connection I/O error");
                Err(e.into())
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
