//! Enum wrappers for host stack dispatch.
//!
//! Native `async fn` in traits (RPITIT - Rust Edition 2024) are not
//! object-safe, so `Box<dyn UsbHostStack>` is not an option. The transport
//! also needs the futures it drives to be `Send` so the pump can be spawned
//! on a multi-threaded runtime, which a generic parameter cannot promise.
//! These enums give concrete type dispatch instead: every variant's future
//! type is known, and the auto traits follow.
//!
//! # Examples
//!
//! ```
//! use hostserial_hardware::devices::AnyUsbHost;
//! use hostserial_hardware::mock::MockUsbHost;
//!
//! let (host, _handle) = MockUsbHost::new();
//! let any_host = AnyUsbHost::Mock(host);
//! ```

use crate::mock::{MockUsbHost, MockVcpDevice};
use crate::traits::{UsbHostStack, VcpDevice};
use crate::{DeviceConfig, DeviceInfo, HostConfig, HostLibEvents, Result};
use hostserial_core::{ChipFamily, LineConfiguration};
use std::time::Duration;

/// Enum wrapper for host stack dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyUsbHost {
    /// Simulated host for development and testing.
    Mock(MockUsbHost),
}

impl From<MockUsbHost> for AnyUsbHost {
    fn from(host: MockUsbHost) -> Self {
        Self::Mock(host)
    }
}

impl UsbHostStack for AnyUsbHost {
    type Device = AnyVcpDevice;

    async fn install(&self, config: &HostConfig) -> Result<()> {
        match self {
            Self::Mock(host) => host.install(config).await,
        }
    }

    async fn register_driver(&self, chip: ChipFamily) -> Result<()> {
        match self {
            Self::Mock(host) => host.register_driver(chip).await,
        }
    }

    async fn handle_events(&self) -> Result<HostLibEvents> {
        match self {
            Self::Mock(host) => host.handle_events().await,
        }
    }

    async fn free_all_devices(&self) -> Result<()> {
        match self {
            Self::Mock(host) => host.free_all_devices().await,
        }
    }

    async fn open(&self, config: DeviceConfig) -> Result<AnyVcpDevice> {
        match self {
            Self::Mock(host) => host.open(config).await.map(AnyVcpDevice::Mock),
        }
    }
}

/// Enum wrapper for opened adapter dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyVcpDevice {
    /// Simulated adapter.
    Mock(MockVcpDevice),
}

impl VcpDevice for AnyVcpDevice {
    async fn set_line_coding(&mut self, line: &LineConfiguration) -> Result<()> {
        match self {
            Self::Mock(device) => device.set_line_coding(line).await,
        }
    }

    async fn transmit(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        match self {
            Self::Mock(device) => device.transmit(data, timeout).await,
        }
    }

    fn info(&self) -> DeviceInfo {
        match self {
            Self::Mock(device) => device.info(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDeviceSpec;
    use crate::traits::DeviceEventHandler;
    use crate::types::DeviceEvent;
    use std::sync::Arc;

    struct Ignore;

    impl DeviceEventHandler for Ignore {
        fn on_receive(&self, _data: &[u8]) {}
        fn on_event(&self, _event: DeviceEvent) {}
    }

    #[tokio::test]
    async fn test_any_usb_host_mock() {
        let (host, handle) = MockUsbHost::new();
        let host = AnyUsbHost::from(host);

        host.install(&HostConfig::default()).await.unwrap();
        host.register_driver(ChipFamily::Ftdi).await.unwrap();
        handle.attach(MockDeviceSpec::ftdi());

        let config = DeviceConfig::new(Arc::new(Ignore))
            .with_connection_timeout(Some(Duration::from_millis(50)));
        let mut device = host.open(config).await.unwrap();
        assert_eq!(device.info().name, "FT232R USB UART");

        device
            .set_line_coding(&LineConfiguration::default())
            .await
            .unwrap();
        device
            .transmit(b"abc", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(handle.transmitted(), b"abc");
    }
}
