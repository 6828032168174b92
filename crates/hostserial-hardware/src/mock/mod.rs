//! Mock host stack for testing and development.
//!
//! This module provides a simulated USB host with a single port that can be
//! driven programmatically without a USB controller or adapter.

pub mod device;
pub mod host;

// Re-export commonly used types
pub use device::MockVcpDevice;
pub use host::{MockDeviceSpec, MockUsbHost, MockUsbHostHandle};
