//! One attach of one adapter.
//!
//! A [`DeviceSession`] exists from a successful open until the pump drops
//! it. The stack reports inbound bytes and detach through [`SessionEvents`],
//! which only hands data off to the RX buffer and the detach signal.

use crate::ring_buffer::ByteRingBuffer;
use crate::signal::ConnectionSignal;
use hostserial_core::{DeviceFilter, LineConfiguration};
use hostserial_hardware::traits::{DeviceEventHandler, UsbHostStack, VcpDevice};
use hostserial_hardware::{AnyUsbHost, AnyVcpDevice, DeviceConfig, DeviceEvent, DeviceInfo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Callback sink handed to the stack on open.
pub(crate) struct SessionEvents {
    rx: Arc<ByteRingBuffer>,
    signal: Arc<ConnectionSignal>,
}

impl SessionEvents {
    pub(crate) fn new(rx: Arc<ByteRingBuffer>, signal: Arc<ConnectionSignal>) -> Self {
        Self { rx, signal }
    }
}

impl DeviceEventHandler for SessionEvents {
    fn on_receive(&self, data: &[u8]) {
        let stored = self.rx.push_available(data);
        trace!(len = data.len(), stored, "USB RX");
        if stored < data.len() {
            warn!(dropped = data.len() - stored, "RX buffer overflow");
        }
    }

    fn on_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Disconnected => {
                info!("USB device disconnected");
                self.signal.give();
            }
            DeviceEvent::Error(code) => warn!(code, "USB device reported an error"),
            DeviceEvent::SerialState(bits) => debug!(bits, "USB serial state changed"),
            other => debug!(event = ?other, "Unhandled USB device event"),
        }
    }
}

/// Parameters for opening a session.
#[derive(Debug, Clone)]
pub(crate) struct SessionOptions {
    pub filter: DeviceFilter,
    pub connection_timeout: Option<Duration>,
    pub transmit_timeout: Duration,
    pub out_buffer_size: usize,
    pub in_buffer_size: usize,
}

/// An opened, attached adapter.
///
/// Must not be used after a detach was reported; the pump drops it first.
pub(crate) struct DeviceSession {
    device: AnyVcpDevice,
    info: DeviceInfo,
    transmit_timeout: Duration,
}

impl DeviceSession {
    /// Open the first matching adapter, waiting up to the connection timeout.
    ///
    /// Returns `None` if nothing matched in time or the open failed.
    pub(crate) async fn open(
        stack: &AnyUsbHost,
        options: &SessionOptions,
        events: Arc<SessionEvents>,
    ) -> Option<Self> {
        let config = DeviceConfig::new(events)
            .with_filter(options.filter)
            .with_connection_timeout(options.connection_timeout)
            .with_buffer_sizes(options.out_buffer_size, options.in_buffer_size);

        match stack.open(config).await {
            Ok(device) => {
                let info = device.info();
                info!(device = %info, "USB device opened");
                Some(Self {
                    device,
                    info,
                    transmit_timeout: options.transmit_timeout,
                })
            }
            Err(e) => {
                trace!(filter = %options.filter, error = %e, "No USB device opened");
                None
            }
        }
    }

    pub(crate) fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub(crate) async fn apply_line_coding(&mut self, line: &LineConfiguration) -> bool {
        match self.device.set_line_coding(line).await {
            Ok(()) => {
                info!(line = %line, "Line coding applied");
                true
            }
            Err(e) => {
                warn!(line = %line, error = %e, "Failed to set line coding");
                false
            }
        }
    }

    /// Transmit `data`, waiting for completion. `false` means the session is
    /// unusable and must be dropped.
    pub(crate) async fn transmit_blocking(&mut self, data: &[u8]) -> bool {
        match self.device.transmit(data, self.transmit_timeout).await {
            Ok(()) => {
                trace!(len = data.len(), "USB TX");
                true
            }
            Err(e) => {
                warn!(len = data.len(), error = %e, "USB transmit failed");
                false
            }
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        debug!(device = %self.info, "USB device closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostserial_hardware::HostConfig;
    use hostserial_hardware::mock::{MockDeviceSpec, MockUsbHost, MockUsbHostHandle};

    struct Fixture {
        stack: AnyUsbHost,
        handle: MockUsbHostHandle,
        rx: Arc<ByteRingBuffer>,
        signal: Arc<ConnectionSignal>,
    }

    impl Fixture {
        async fn new(rx_capacity: usize) -> Self {
            let (stack, handle) = MockUsbHost::new();
            let stack = AnyUsbHost::from(stack);
            stack.install(&HostConfig::default()).await.unwrap();
            for chip in HostConfig::default().drivers {
                stack.register_driver(chip).await.unwrap();
            }
            Self {
                stack,
                handle,
                rx: Arc::new(ByteRingBuffer::new(rx_capacity).unwrap()),
                signal: Arc::new(ConnectionSignal::new()),
            }
        }

        fn options(&self) -> SessionOptions {
            SessionOptions {
                filter: DeviceFilter::Any,
                connection_timeout: Some(Duration::from_millis(10)),
                transmit_timeout: Duration::from_millis(50),
                out_buffer_size: 64,
                in_buffer_size: 64,
            }
        }

        async fn open(&self) -> Option<DeviceSession> {
            let events = Arc::new(SessionEvents::new(
                Arc::clone(&self.rx),
                Arc::clone(&self.signal),
            ));
            DeviceSession::open(&self.stack, &self.options(), events).await
        }
    }

    #[tokio::test]
    async fn test_open_without_device_yields_none() {
        let fixture = Fixture::new(16).await;
        assert!(fixture.open().await.is_none());
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let fixture = Fixture::new(16).await;
        fixture.handle.attach(MockDeviceSpec::ftdi());

        let mut session = fixture.open().await.unwrap();
        assert_eq!(session.info().vid, 0x0403);

        assert!(
            session
                .apply_line_coding(&LineConfiguration::default())
                .await
        );
        assert!(session.transmit_blocking(b"ping").await);
        assert_eq!(fixture.handle.transmitted(), b"ping");

        assert!(fixture.handle.receive(b"pong"));
        assert_eq!(fixture.rx.len(), 4);

        drop(session);
        assert!(!fixture.handle.is_open());
    }

    #[tokio::test]
    async fn test_rx_overflow_keeps_oldest_bytes() {
        let fixture = Fixture::new(4).await;
        fixture.handle.attach(MockDeviceSpec::ftdi());
        let _session = fixture.open().await.unwrap();

        fixture.handle.receive(b"ab");
        fixture.handle.receive(b"cdef");

        let chunk = fixture.rx.try_pop_up_to(8).unwrap();
        assert_eq!(&chunk[..], b"abcd");
    }

    #[tokio::test]
    async fn test_detach_gives_signal_other_events_do_not() {
        let fixture = Fixture::new(16).await;
        fixture.handle.attach(MockDeviceSpec::cp210x());
        let mut session = fixture.open().await.unwrap();

        fixture.handle.raise_event(DeviceEvent::SerialState(0x03));
        fixture.handle.raise_event(DeviceEvent::Error(-1));
        assert!(!fixture.signal.is_signalled());

        fixture.handle.detach();
        assert!(fixture.signal.is_signalled());
        assert!(!session.transmit_blocking(b"late").await);
    }

    #[tokio::test]
    async fn test_rejected_line_coding_reports_false() {
        let fixture = Fixture::new(16).await;
        fixture.handle.attach(MockDeviceSpec::ch34x());
        fixture.handle.set_fail_line_coding(true);

        let mut session = fixture.open().await.unwrap();
        assert!(
            !session
                .apply_line_coding(&LineConfiguration::default())
                .await
        );
    }
}
