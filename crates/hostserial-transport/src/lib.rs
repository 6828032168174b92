//! Serial transport over a hot-pluggable USB-to-serial adapter.
//!
//! This crate turns a USB host stack with VCP drivers into something that
//! behaves like an ordinary serial port: bytes written are buffered and
//! pumped to whichever adapter is currently attached, bytes received are
//! buffered until the application reads them, and adapters can be unplugged
//! and replugged without the application noticing beyond a pause.
//!
//! # Components
//!
//! - **SerialTransport**: the public façade (`begin`, `write`, `read`, ...)
//! - **ByteRingBuffer**: bounded all-or-nothing byte queue used for TX and RX
//! - **ConnectionSignal**: detach notification with a non-destructive peek
//! - **UsbHost**: install-once owner of the host stack and its event task
//! - **PumpWorker** (internal): the task that owns the adapter session
//!
//! # Error model
//!
//! Full or empty buffers are reported as counts. Device failures (open, line
//! coding, transmit) are logged and retried by the pump; the application
//! only sees `write` returning 0 once the TX buffer fills and `read` finding
//! nothing. Only configuration and host stack installation fail with a
//! [`TransportError`].

mod config;
mod error;
mod host;
mod pump;
mod ring_buffer;
mod session;
mod signal;
mod state;
mod transport;

pub use config::{TransportConfig, TxCarryOver};
pub use error::{Result, TransportError};
pub use host::UsbHost;
pub use ring_buffer::{ByteRingBuffer, RingChunk};
pub use signal::ConnectionSignal;
pub use state::ConnectionState;
pub use transport::SerialTransport;
