//! Configuration for ringkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a ringkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // AOF Configuration
    // -------------------------------------------------------------------------
    /// Whether mutating commands are persisted at all
    pub aof_enabled: bool,

    /// Base path for segment files. Segments land at
    /// `{aof_path}_{segment_id}.aof`, so the parent directory is the data dir.
    pub aof_path: PathBuf,

    /// Segment size as a power of two (26 = 64 MiB pieces)
    pub segment_shift: u32,

    /// Period between persistence cycles
    pub aof_interval: Duration,

    /// Delay before the first persistence cycle
    pub aof_initial_delay: Duration,

    /// Requested capacity of the batch queue (rounded up to a power of two)
    pub queue_capacity: usize,

    /// Column width of the queue's backing storage
    pub queue_subarea: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aof_enabled: true,
            aof_path: PathBuf::from("./ringkv_data/appendonly"),
            segment_shift: 26, // 64 MiB
            aof_interval: Duration::from_secs(1),
            aof_initial_delay: Duration::from_secs(10),
            queue_capacity: 888_888,
            queue_subarea: 4096,
            listen_addr: "127.0.0.1:6379".to_string(),
            max_connections: 10_000,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Enable or disable the append-only log
    pub fn aof_enabled(mut self, enabled: bool) -> Self {
        self.config.aof_enabled = enabled;
        self
    }

    /// Set the base path of the segment files
    pub fn aof_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.aof_path = path.into();
        self
    }

    /// Set the segment size shift (piece size = 1 << shift)
    pub fn segment_shift(mut self, shift: u32) -> Self {
        self.config.segment_shift = shift;
        self
    }

    /// Set the persistence cycle interval
    pub fn aof_interval(mut self, interval: Duration) -> Self {
        self.config.aof_interval = interval;
        self
    }

    /// Set the delay before the first persistence cycle
    pub fn aof_initial_delay(mut self, delay: Duration) -> Self {
        self.config.aof_initial_delay = delay;
        self
    }

    /// Set the requested queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the queue subarea (column) size
    pub fn queue_subarea(mut self, subarea: usize) -> Self {
        self.config.queue_subarea = subarea;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
