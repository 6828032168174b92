//! Host stack trait definitions.
//!
//! These traits are the boundary between the serial transport and whatever
//! actually talks to the USB controller. A host stack is installed once,
//! services its library events in the background, and opens VCP adapters on
//! request. An opened adapter accepts line coding and blocking transmits;
//! inbound bytes and device events arrive asynchronously through a
//! [`DeviceEventHandler`] supplied at open time.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{DeviceConfig, DeviceEvent, DeviceInfo, HostConfig, HostLibEvents};
use hostserial_core::{ChipFamily, LineConfiguration};
use std::time::Duration;

/// Receives callbacks from an opened adapter.
///
/// The stack invokes these from its own context, concurrently with whoever
/// owns the device handle. Implementations must not block: they hand data
/// off and return.
pub trait DeviceEventHandler: Send + Sync {
    /// Inbound bytes from the adapter's IN endpoint.
    fn on_receive(&self, data: &[u8]);

    /// A device event such as disconnection.
    fn on_event(&self, event: DeviceEvent);
}

/// USB host stack with VCP driver support.
///
/// # Object Safety and Dynamic Dispatch
///
/// This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use the enum wrapper from the [`devices`](crate::devices)
/// module ([`AnyUsbHost`](crate::devices::AnyUsbHost)) where a concrete,
/// `Send` type is needed, e.g. to spawn the pump task.
pub trait UsbHostStack: Send + Sync {
    /// Handle type for an opened adapter. Dropping it closes the device.
    type Device: VcpDevice;

    /// Install the host stack. Only valid once per process.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::AlreadyInstalled` on a second call, or
    /// `HardwareError::InstallFailed` if the controller could not be set up.
    async fn install(&self, config: &HostConfig) -> Result<()>;

    /// Register the VCP driver for a chip family.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::NotInstalled` before installation.
    async fn register_driver(&self, chip: ChipFamily) -> Result<()>;

    /// Service host library events once, waiting until something happens.
    async fn handle_events(&self) -> Result<HostLibEvents>;

    /// Release every device the library still holds.
    async fn free_all_devices(&self) -> Result<()>;

    /// Open the first attached adapter matching `config.filter`, waiting up
    /// to `config.connection_timeout` for one to appear.
    ///
    /// # Errors
    ///
    /// Returns an error if no device matched in time or the open failed.
    async fn open(&self, config: DeviceConfig) -> Result<Self::Device>;
}

/// An opened USB-to-serial adapter.
pub trait VcpDevice: Send {
    /// Apply baud rate and framing.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter rejected the request or is gone.
    async fn set_line_coding(&mut self, line: &LineConfiguration) -> Result<()>;

    /// Send `data` on the OUT endpoint, waiting up to `timeout` for completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer failed, timed out, or the adapter is gone.
    async fn transmit(&mut self, data: &[u8], timeout: Duration) -> Result<()>;

    /// Identity of the adapter.
    fn info(&self) -> DeviceInfo;
}
