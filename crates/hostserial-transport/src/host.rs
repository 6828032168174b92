//! Process-wide USB host stack owner.
//!
//! The host stack may only be installed once per process, no matter how
//! many transports are created or how often `begin` is called. [`UsbHost`]
//! is the single owner: clone it into every transport that should share the
//! stack and installation happens on the first `begin` only.
//!
//! Installation also starts the library event task. It services the stack's
//! housekeeping events for as long as the host lives and releases all
//! devices whenever the library reports that no client holds one.

use crate::error::{Result, TransportError};
use hostserial_hardware::traits::UsbHostStack;
use hostserial_hardware::{AnyUsbHost, HardwareError, HostConfig};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause after a failed event pass so a broken stack cannot spin the task.
const EVENT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

struct HostInner {
    stack: AnyUsbHost,
    installed: OnceCell<()>,
    events_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        let task = self
            .events_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Shared handle to the installed host stack.
#[derive(Clone)]
pub struct UsbHost {
    inner: Arc<HostInner>,
}

impl UsbHost {
    pub fn new(stack: impl Into<AnyUsbHost>) -> Self {
        Self {
            inner: Arc::new(HostInner {
                stack: stack.into(),
                installed: OnceCell::new(),
                events_task: Mutex::new(None),
            }),
        }
    }

    /// Install the stack and register drivers, unless already done.
    ///
    /// Concurrent callers wait for the first one; a failed installation
    /// leaves the host uninstalled so a later call can try again.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::HostInstall` if the stack refused to install
    /// or a driver could not be registered.
    pub async fn ensure_installed(&self, config: &HostConfig) -> Result<()> {
        self.inner
            .installed
            .get_or_try_init(|| self.install(config))
            .await?;
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.inner.installed.initialized()
    }

    /// The underlying stack, for opening devices.
    pub(crate) fn stack(&self) -> &AnyUsbHost {
        &self.inner.stack
    }

    async fn install(&self, config: &HostConfig) -> Result<()> {
        let stack = &self.inner.stack;

        match stack.install(config).await {
            Ok(()) => info!(
                skip_phy_setup = config.skip_phy_setup,
                interrupt_level = config.interrupt_level,
                "USB host stack installed"
            ),
            // Someone else brought the stack up; drivers may still be missing.
            Err(HardwareError::AlreadyInstalled) => {
                warn!("USB host stack was already installed, reusing it")
            }
            Err(e) => {
                error!(error = %e, "Failed to install USB host stack");
                return Err(TransportError::HostInstall(e));
            }
        }

        for chip in &config.drivers {
            stack.register_driver(*chip).await.map_err(|e| {
                error!(driver = %chip, error = %e, "Failed to register VCP driver");
                TransportError::HostInstall(e)
            })?;
            debug!(driver = %chip, "VCP driver registered");
        }

        let task = tokio::spawn(run_library_events(stack.clone()));
        let previous = self
            .inner
            .events_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }

        Ok(())
    }
}

impl fmt::Debug for UsbHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbHost")
            .field("stack", &self.inner.stack)
            .field("installed", &self.is_installed())
            .finish()
    }
}

/// Service host library events until aborted.
async fn run_library_events(stack: AnyUsbHost) {
    loop {
        match stack.handle_events().await {
            Ok(events) => {
                if events.no_clients {
                    debug!("No USB clients left, freeing all devices");
                    if let Err(e) = stack.free_all_devices().await {
                        warn!(error = %e, "Failed to free USB devices");
                    }
                }
                if events.all_free {
                    debug!("All USB devices released");
                }
            }
            Err(e) => {
                warn!(error = %e, "USB host library event handling failed");
                tokio::time::sleep(EVENT_ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostserial_core::ChipFamily;
    use hostserial_hardware::mock::MockUsbHost;

    #[tokio::test]
    async fn test_installs_once() {
        let (stack, handle) = MockUsbHost::new();
        let host = UsbHost::new(stack);
        let shared = host.clone();

        host.ensure_installed(&HostConfig::default()).await.unwrap();
        shared.ensure_installed(&HostConfig::default()).await.unwrap();
        host.ensure_installed(&HostConfig::default()).await.unwrap();

        assert!(host.is_installed());
        assert_eq!(handle.install_calls(), 1);
        assert_eq!(handle.registered_drivers(), ChipFamily::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_failed_install_can_be_retried() {
        let (stack, handle) = MockUsbHost::new();
        let host = UsbHost::new(stack);

        handle.set_fail_install(true);
        let err = host
            .ensure_installed(&HostConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_install_failure());
        assert!(!host.is_installed());

        handle.set_fail_install(false);
        host.ensure_installed(&HostConfig::default()).await.unwrap();
        assert!(host.is_installed());
    }

    #[tokio::test]
    async fn test_registers_configured_drivers_only() {
        let (stack, handle) = MockUsbHost::new();
        let host = UsbHost::new(stack);
        let config = HostConfig {
            drivers: vec![ChipFamily::Ch34x],
            ..Default::default()
        };

        host.ensure_installed(&config).await.unwrap();
        assert_eq!(handle.registered_drivers(), vec![ChipFamily::Ch34x]);
    }
}
