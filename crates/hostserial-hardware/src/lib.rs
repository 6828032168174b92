//! USB host stack abstraction for the host serial transport.
//!
//! This crate defines the boundary between the serial transport and the
//! software that actually drives a USB host controller and its VCP drivers
//! (FTDI, CP210x, CH34x). The transport only ever sees these traits, so a
//! simulated stack can stand in for the real one during development and
//! testing.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All stack operations are asynchronous using native
//!   `async fn` in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Enum dispatch**: [`devices::AnyUsbHost`] and [`devices::AnyVcpDevice`]
//!   give concrete types with `Send` futures for spawning.
//! - **Callbacks as hand-off**: inbound bytes and device events are delivered
//!   to a [`DeviceEventHandler`] that must not block.
//! - **Error-aware**: All operations return [`Result<T>`] with a
//!   [`HardwareError`] describing what went wrong.
//!
//! # Lifecycle
//!
//! ```no_run
//! use hostserial_hardware::mock::{MockDeviceSpec, MockUsbHost};
//! use hostserial_hardware::traits::{DeviceEventHandler, UsbHostStack, VcpDevice};
//! use hostserial_hardware::{DeviceConfig, DeviceEvent, HostConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Printer;
//!
//! impl DeviceEventHandler for Printer {
//!     fn on_receive(&self, data: &[u8]) {
//!         println!("rx {} bytes", data.len());
//!     }
//!     fn on_event(&self, event: DeviceEvent) {
//!         println!("event {:?}", event);
//!     }
//! }
//!
//! # async fn example() -> hostserial_hardware::Result<()> {
//! let (host, handle) = MockUsbHost::new();
//! let config = HostConfig::default();
//! host.install(&config).await?;
//! for chip in &config.drivers {
//!     host.register_driver(*chip).await?;
//! }
//!
//! handle.attach(MockDeviceSpec::ftdi());
//! let mut device = host.open(DeviceConfig::new(Arc::new(Printer))).await?;
//! device.transmit(b"hello", Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{DeviceEventHandler, UsbHostStack, VcpDevice};
pub use types::{DeviceConfig, DeviceEvent, DeviceInfo, HostConfig, HostLibEvents};

pub use devices::{AnyUsbHost, AnyVcpDevice};
