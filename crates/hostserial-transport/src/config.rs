//! Transport configuration.
//!
//! Every knob has a default matching the reference adapter firmware, so
//! `TransportConfig::default()` gives 256-byte buffers, accepts any adapter,
//! and polls for attachment every 10 ms. Durations are stored in milliseconds
//! so the struct reads naturally from JSON or TOML.

use crate::error::{Result, TransportError};
use hostserial_core::DeviceFilter;
use hostserial_core::constants::{
    DEFAULT_ATTACH_SETTLE_MS, DEFAULT_BUFFER_SIZE, DEFAULT_CONNECTION_TIMEOUT_MS,
    DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_TRANSMIT_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS,
};
use hostserial_hardware::HostConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to queued TX bytes when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxCarryOver {
    /// Keep everything, including a chunk whose transmit failed, and send it
    /// to the next adapter that attaches.
    #[default]
    Retain,

    /// Empty the TX buffer on every detach.
    Discard,
}

/// Serial transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Capacity of the outbound queue in bytes
    pub tx_buffer_size: usize,

    /// Capacity of the inbound queue in bytes
    pub rx_buffer_size: usize,

    /// Which adapter to open
    pub filter: DeviceFilter,

    /// How long one open attempt waits for a matching adapter.
    /// `None` waits until one appears.
    pub connection_timeout_ms: Option<u64>,

    /// Upper bound on a single blocking transmit
    pub transmit_timeout_ms: u64,

    /// How long the pump waits for TX data before checking for detach again
    pub drain_timeout_ms: u64,

    /// How long `write` waits for room in the TX queue
    pub write_timeout_ms: u64,

    /// How long `read` waits for RX data
    pub read_timeout_ms: u64,

    /// Pause before and after each open attempt
    pub attach_settle_ms: u64,

    /// Ceiling for the retry delay after repeated attach failures
    pub max_backoff_ms: u64,

    /// Fate of undelivered TX bytes across a detach
    pub tx_carry_over: TxCarryOver,

    /// One-time host stack options
    pub host: HostConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tx_buffer_size: DEFAULT_BUFFER_SIZE,
            rx_buffer_size: DEFAULT_BUFFER_SIZE,
            filter: DeviceFilter::Any,
            connection_timeout_ms: Some(DEFAULT_CONNECTION_TIMEOUT_MS),
            transmit_timeout_ms: DEFAULT_TRANSMIT_TIMEOUT_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            attach_settle_ms: DEFAULT_ATTACH_SETTLE_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            tx_carry_over: TxCarryOver::Retain,
            host: HostConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Set both buffer capacities
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.tx_buffer_size = size;
        self.rx_buffer_size = size;
        self
    }

    /// Only open adapters matching `vid`/`pid` (0 is a wildcard)
    pub fn device(mut self, vid: u16, pid: u16) -> Self {
        self.filter = DeviceFilter::from_ids(vid, pid);
        self
    }

    /// Set the per-attempt connection timeout
    pub fn connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Set the TX carry-over policy
    pub fn tx_carry_over(mut self, policy: TxCarryOver) -> Self {
        self.tx_carry_over = policy;
        self
    }

    /// Check for values the transport cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Config` for zero-sized buffers or an empty
    /// driver list.
    pub fn validate(&self) -> Result<()> {
        if self.tx_buffer_size == 0 {
            return Err(TransportError::config("tx_buffer_size must be non-zero"));
        }
        if self.rx_buffer_size == 0 {
            return Err(TransportError::config("rx_buffer_size must be non-zero"));
        }
        if self.host.drivers.is_empty() {
            return Err(TransportError::config(
                "at least one VCP driver must be registered",
            ));
        }
        Ok(())
    }

    pub fn connection_timeout_duration(&self) -> Option<Duration> {
        self.connection_timeout_ms.map(Duration::from_millis)
    }

    pub fn transmit_timeout(&self) -> Duration {
        Duration::from_millis(self.transmit_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn attach_settle(&self) -> Duration {
        Duration::from_millis(self.attach_settle_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
