//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a non-blocking listener
//! - One OS thread per connection, capped by `max_connections`
//! - Commands routed through Engine

mod connection;
mod server;

pub use connection::Connection;
pub use server::Server;
