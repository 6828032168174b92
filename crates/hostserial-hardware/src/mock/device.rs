//! Mock VCP adapter handle.

use super::host::MockShared;
use crate::{HardwareError, Result, traits::VcpDevice, types::DeviceInfo};
use hostserial_core::LineConfiguration;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Adapter handle returned by [`MockUsbHost`](super::MockUsbHost).
///
/// Valid until the simulated adapter is unplugged; after that every
/// operation fails with `HardwareError::Disconnected`. Dropping the handle
/// closes the device on the mock host.
pub struct MockVcpDevice {
    shared: Arc<MockShared>,
    session_id: u64,
    info: DeviceInfo,
}

impl MockVcpDevice {
    pub(crate) fn new(shared: Arc<MockShared>, session_id: u64, info: DeviceInfo) -> Self {
        Self {
            shared,
            session_id,
            info,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.shared.lock().is_live(self.session_id) {
            Ok(())
        } else {
            Err(HardwareError::disconnected(self.info.name.clone()))
        }
    }
}

impl fmt::Debug for MockVcpDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockVcpDevice")
            .field("session_id", &self.session_id)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl VcpDevice for MockVcpDevice {
    async fn set_line_coding(&mut self, line: &LineConfiguration) -> Result<()> {
        let mut state = self.shared.lock();
        if !state.is_live(self.session_id) {
            return Err(HardwareError::disconnected(self.info.name.clone()));
        }
        if state.fail_line_coding {
            return Err(HardwareError::line_coding_rejected("control transfer stalled"));
        }
        state.line_codings.push(*line);
        Ok(())
    }

    async fn transmit(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        self.ensure_live()?;

        let mut paused = self.shared.transmit_paused.subscribe();
        if tokio::time::timeout(timeout, paused.wait_for(|paused| !*paused))
            .await
            .is_err()
        {
            return Err(HardwareError::timeout(timeout.as_millis() as u64));
        }

        let mut state = self.shared.lock();
        if !state.is_live(self.session_id) {
            return Err(HardwareError::disconnected(self.info.name.clone()));
        }
        if state.fail_transmit {
            return Err(HardwareError::transmit_failed("bulk OUT transfer error"));
        }
        state.transmitted.extend_from_slice(data);
        state.transmit_calls += 1;
        trace!(len = data.len(), "Mock transmit");
        Ok(())
    }

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }
}

impl Drop for MockVcpDevice {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            if state
                .session
                .as_ref()
                .is_some_and(|session| session.id == self.session_id)
            {
                state.session = None;
            }
        }
        debug!(session = self.session_id, "Mock device closed");
        self.shared.lib_notify.notify_one();
    }
}
