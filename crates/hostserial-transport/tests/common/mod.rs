//! Shared fixture for transport integration tests.

#![allow(dead_code)]

use hostserial_hardware::mock::{MockUsbHost, MockUsbHostHandle};
use hostserial_transport::{SerialTransport, TransportConfig, UsbHost};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Generous upper bound for anything the pump should do "soon".
pub const SETTLE: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Defaults with every pump delay shrunk so tests run in milliseconds.
pub fn fast_config() -> TransportConfig {
    TransportConfig {
        connection_timeout_ms: Some(5),
        transmit_timeout_ms: 20,
        drain_timeout_ms: 2,
        attach_settle_ms: 1,
        max_backoff_ms: 5,
        ..TransportConfig::default()
    }
}

pub struct Harness {
    pub host: UsbHost,
    pub handle: MockUsbHostHandle,
    pub port: SerialTransport,
}

impl Harness {
    pub fn new(config: TransportConfig) -> Self {
        init_tracing();
        let (stack, handle) = MockUsbHost::new();
        let host = UsbHost::new(stack);
        let port = SerialTransport::new(host.clone(), config).expect("valid transport config");
        Self { host, handle, port }
    }

    pub fn fast() -> Self {
        Self::new(fast_config())
    }

    /// A second transport sharing this harness's host stack.
    pub fn sibling(&self, config: TransportConfig) -> SerialTransport {
        SerialTransport::new(self.host.clone(), config).expect("valid transport config")
    }

    pub async fn wait_connected(&self) -> bool {
        wait_until(SETTLE, || self.port.is_connected()).await
    }

    pub async fn wait_transmitted(&self, expected: &[u8]) -> bool {
        wait_until(SETTLE, || self.handle.transmitted() == expected).await
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
