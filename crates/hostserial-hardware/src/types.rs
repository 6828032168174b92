//! Configuration and event types exchanged with the host stack.

use crate::traits::DeviceEventHandler;
use hostserial_core::{ChipFamily, DeviceFilter, constants::DEFAULT_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Metadata about an opened adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "FT232R USB UART").
    pub name: String,

    /// USB vendor id.
    pub vid: u16,

    /// USB product id.
    pub pid: u16,

    /// Driver family that claimed the device, if known.
    pub chip: Option<ChipFamily>,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            name: name.into(),
            vid,
            pid,
            chip: ChipFamily::from_vendor_id(vid),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:04x}:{:04x})", self.name, self.vid, self.pid)
    }
}

/// One-time host stack installation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Leave the USB PHY untouched (it was set up elsewhere).
    pub skip_phy_setup: bool,

    /// Interrupt priority level for the host controller.
    pub interrupt_level: u8,

    /// VCP drivers registered right after installation.
    pub drivers: Vec<ChipFamily>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            skip_phy_setup: false,
            interrupt_level: 1,
            drivers: ChipFamily::ALL.to_vec(),
        }
    }
}

/// Asynchronous notifications from an opened adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceEvent {
    /// The adapter was unplugged. The session must not be used afterwards.
    Disconnected,

    /// Transfer error reported by the stack.
    Error(i32),

    /// CDC serial state notification (DCD, DSR, break, ring...).
    SerialState(u16),
}

/// Flags returned from one pass of the host library event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostLibEvents {
    /// No client holds an open device any more.
    pub no_clients: bool,

    /// Every device has been released.
    pub all_free: bool,
}

/// Options for a single open attempt.
#[derive(Clone)]
pub struct DeviceConfig {
    /// Which device to accept.
    pub filter: DeviceFilter,

    /// How long to wait for a matching device. `None` waits forever.
    pub connection_timeout: Option<Duration>,

    /// OUT transfer buffer size.
    pub out_buffer_size: usize,

    /// IN transfer buffer size.
    pub in_buffer_size: usize,

    /// Receives inbound data and device events for the lifetime of the device.
    pub handler: Arc<dyn DeviceEventHandler>,
}

impl DeviceConfig {
    pub fn new(handler: Arc<dyn DeviceEventHandler>) -> Self {
        Self {
            filter: DeviceFilter::Any,
            connection_timeout: None,
            out_buffer_size: DEFAULT_BUFFER_SIZE,
            in_buffer_size: DEFAULT_BUFFER_SIZE,
            handler,
        }
    }

    pub fn with_filter(mut self, filter: DeviceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn with_buffer_sizes(mut self, out_size: usize, in_size: usize) -> Self {
        self.out_buffer_size = out_size;
        self.in_buffer_size = in_size;
        self
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("filter", &self.filter)
            .field("connection_timeout", &self.connection_timeout)
            .field("out_buffer_size", &self.out_buffer_size)
            .field("in_buffer_size", &self.in_buffer_size)
            .finish_non_exhaustive()
    }
}
