//! Mock USB host stack for testing and development.
//!
//! The mock models a single host port with at most one adapter plugged in.
//! A [`MockUsbHostHandle`] plays the role of the physical world: it plugs and
//! unplugs adapters, feeds inbound bytes through the open device's handler,
//! and lets tests inject failures or stall transmits.

use super::device::MockVcpDevice;
use crate::{
    HardwareError, Result,
    traits::{DeviceEventHandler, UsbHostStack},
    types::{DeviceConfig, DeviceEvent, DeviceInfo, HostConfig, HostLibEvents},
};
use hostserial_core::{ChipFamily, LineConfiguration};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Description of a simulated adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDeviceSpec {
    pub name: String,
    pub vid: u16,
    pub pid: u16,
}

impl MockDeviceSpec {
    pub fn new(name: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            name: name.into(),
            vid,
            pid,
        }
    }

    /// FTDI FT232R.
    pub fn ftdi() -> Self {
        Self::new("FT232R USB UART", ChipFamily::Ftdi.vendor_id(), 0x6001)
    }

    /// Silicon Labs CP2102.
    pub fn cp210x() -> Self {
        Self::new("CP2102 USB to UART", ChipFamily::Cp210x.vendor_id(), 0xea60)
    }

    /// WCH CH340.
    pub fn ch34x() -> Self {
        Self::new("CH340 serial", ChipFamily::Ch34x.vendor_id(), 0x7523)
    }

    pub(crate) fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.name.clone(), self.vid, self.pid)
    }
}

pub(crate) struct OpenSession {
    pub(crate) id: u64,
    pub(crate) generation: u64,
    pub(crate) handler: Arc<dyn DeviceEventHandler>,
}

#[derive(Default)]
pub(crate) struct MockHostState {
    pub(crate) installed: bool,
    pub(crate) install_calls: usize,
    pub(crate) drivers: Vec<ChipFamily>,
    pub(crate) attached: Option<MockDeviceSpec>,
    /// Bumped on every attach so a stale handle never sees a replugged device as its own.
    pub(crate) generation: u64,
    pub(crate) session: Option<OpenSession>,
    pub(crate) next_session_id: u64,
    pub(crate) open_calls: usize,
    pub(crate) line_codings: Vec<LineConfiguration>,
    pub(crate) transmitted: Vec<u8>,
    pub(crate) transmit_calls: usize,
    pub(crate) free_all_calls: usize,
    pub(crate) fail_install: bool,
    pub(crate) fail_open: bool,
    pub(crate) fail_line_coding: bool,
    pub(crate) fail_transmit: bool,
}

impl MockHostState {
    pub(crate) fn is_live(&self, session_id: u64) -> bool {
        match (&self.session, &self.attached) {
            (Some(session), Some(_)) => {
                session.id == session_id && session.generation == self.generation
            }
            _ => false,
        }
    }
}

pub(crate) struct MockShared {
    state: Mutex<MockHostState>,
    /// Wakes pending `open` calls when an adapter is plugged in.
    pub(crate) attach_notify: Notify,
    /// Wakes the library event loop when a client goes away.
    pub(crate) lib_notify: Notify,
    /// `true` while transmits are held back.
    pub(crate) transmit_paused: watch::Sender<bool>,
}

impl MockShared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, MockHostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock USB host stack.
///
/// # Examples
///
/// ```
/// use hostserial_hardware::mock::{MockDeviceSpec, MockUsbHost};
/// use hostserial_hardware::traits::UsbHostStack;
/// use hostserial_hardware::HostConfig;
///
/// #[tokio::main]
/// async fn main() -> hostserial_hardware::Result<()> {
///     let (host, handle) = MockUsbHost::new();
///     host.install(&HostConfig::default()).await?;
///
///     handle.attach(MockDeviceSpec::ftdi());
///     assert!(handle.is_attached());
///     assert_eq!(handle.install_calls(), 1);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MockUsbHost {
    shared: Arc<MockShared>,
}

impl MockUsbHost {
    /// Create a new mock host with nothing plugged in.
    ///
    /// Returns the host (handed to the transport) and a handle for
    /// simulating the physical side.
    pub fn new() -> (Self, MockUsbHostHandle) {
        let (transmit_paused, _) = watch::channel(false);
        let shared = Arc::new(MockShared {
            state: Mutex::new(MockHostState::default()),
            attach_notify: Notify::new(),
            lib_notify: Notify::new(),
            transmit_paused,
        });

        let host = Self {
            shared: Arc::clone(&shared),
        };
        let handle = MockUsbHostHandle { shared };

        (host, handle)
    }

    /// Try to claim the attached device for a new session.
    fn try_claim(&self, config: &DeviceConfig) -> Result<Option<MockVcpDevice>> {
        let mut state = self.shared.lock();

        if state.fail_open {
            return Err(HardwareError::communication("open rejected by host"));
        }
        if state.session.is_some() {
            return Ok(None);
        }

        let Some(spec) = state.attached.clone() else {
            return Ok(None);
        };
        if !config.filter.matches(spec.vid, spec.pid) {
            return Ok(None);
        }
        let has_driver = ChipFamily::from_vendor_id(spec.vid)
            .is_some_and(|chip| state.drivers.contains(&chip));
        if !has_driver {
            return Ok(None);
        }

        state.next_session_id += 1;
        let id = state.next_session_id;
        let generation = state.generation;
        state.session = Some(OpenSession {
            id,
            generation,
            handler: Arc::clone(&config.handler),
        });

        debug!(session = id, device = %spec.info(), "Mock device opened");
        Ok(Some(MockVcpDevice::new(
            Arc::clone(&self.shared),
            id,
            spec.info(),
        )))
    }
}

impl fmt::Debug for MockUsbHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockUsbHost").finish_non_exhaustive()
    }
}

impl UsbHostStack for MockUsbHost {
    type Device = MockVcpDevice;

    async fn install(&self, _config: &HostConfig) -> Result<()> {
        let mut state = self.shared.lock();
        if state.fail_install {
            return Err(HardwareError::install_failed("mock PHY unavailable"));
        }
        if state.installed {
            return Err(HardwareError::AlreadyInstalled);
        }
        state.installed = true;
        state.install_calls += 1;
        Ok(())
    }

    async fn register_driver(&self, chip: ChipFamily) -> Result<()> {
        let mut state = self.shared.lock();
        if !state.installed {
            return Err(HardwareError::NotInstalled);
        }
        if !state.drivers.contains(&chip) {
            state.drivers.push(chip);
        }
        Ok(())
    }

    async fn handle_events(&self) -> Result<HostLibEvents> {
        if !self.shared.lock().installed {
            return Err(HardwareError::NotInstalled);
        }

        self.shared.lib_notify.notified().await;

        let state = self.shared.lock();
        let idle = state.session.is_none();
        Ok(HostLibEvents {
            no_clients: idle,
            all_free: idle,
        })
    }

    async fn free_all_devices(&self) -> Result<()> {
        self.shared.lock().free_all_calls += 1;
        Ok(())
    }

    async fn open(&self, config: DeviceConfig) -> Result<MockVcpDevice> {
        {
            let mut state = self.shared.lock();
            if !state.installed {
                return Err(HardwareError::NotInstalled);
            }
            state.open_calls += 1;
        }

        let deadline = config
            .connection_timeout
            .map(|timeout| Instant::now() + timeout);

        loop {
            let attached = self.shared.attach_notify.notified();
            tokio::pin!(attached);
            attached.as_mut().enable();

            if let Some(device) = self.try_claim(&config)? {
                return Ok(device);
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, attached).await.is_err() {
                        trace!(filter = %config.filter, "No mock device within connection timeout");
                        return Err(HardwareError::device_not_found(config.filter));
                    }
                }
                None => attached.await,
            }
        }
    }
}

/// Handle for simulating the physical side of a [`MockUsbHost`].
///
/// Cloneable; every clone controls the same simulated port.
#[derive(Clone)]
pub struct MockUsbHostHandle {
    shared: Arc<MockShared>,
}

impl MockUsbHostHandle {
    /// Plug an adapter in. Replaces any adapter already present without
    /// notifying its session (use [`detach`](Self::detach) first for that).
    pub fn attach(&self, spec: MockDeviceSpec) {
        {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.attached = Some(spec);
        }
        self.shared.attach_notify.notify_waiters();
    }

    /// Unplug the adapter and deliver `Disconnected` to the open session.
    ///
    /// Returns `true` if a session was notified.
    pub fn detach(&self) -> bool {
        let handler = {
            let mut state = self.shared.lock();
            if state.attached.take().is_none() {
                return false;
            }
            state
                .session
                .as_ref()
                .map(|session| Arc::clone(&session.handler))
        };

        match handler {
            Some(handler) => {
                handler.on_event(DeviceEvent::Disconnected);
                true
            }
            None => false,
        }
    }

    /// Deliver inbound bytes to the open session's handler.
    ///
    /// Returns `false` if no live session exists.
    pub fn receive(&self, data: &[u8]) -> bool {
        match self.live_handler() {
            Some(handler) => {
                handler.on_receive(data);
                true
            }
            None => false,
        }
    }

    /// Deliver an arbitrary event to the open session's handler.
    pub fn raise_event(&self, event: DeviceEvent) -> bool {
        match self.live_handler() {
            Some(handler) => {
                handler.on_event(event);
                true
            }
            None => false,
        }
    }

    fn live_handler(&self) -> Option<Arc<dyn DeviceEventHandler>> {
        let state = self.shared.lock();
        let session = state.session.as_ref()?;
        state
            .is_live(session.id)
            .then(|| Arc::clone(&session.handler))
    }

    /// Hold every transmit until resumed.
    pub fn pause_transmit(&self, paused: bool) {
        self.shared.transmit_paused.send_replace(paused);
    }

    pub fn set_fail_install(&self, fail: bool) {
        self.shared.lock().fail_install = fail;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.shared.lock().fail_open = fail;
    }

    pub fn set_fail_line_coding(&self, fail: bool) {
        self.shared.lock().fail_line_coding = fail;
    }

    pub fn set_fail_transmit(&self, fail: bool) {
        self.shared.lock().fail_transmit = fail;
    }

    pub fn is_attached(&self) -> bool {
        self.shared.lock().attached.is_some()
    }

    /// True while a device handle is held by a client.
    pub fn is_open(&self) -> bool {
        self.shared.lock().session.is_some()
    }

    pub fn install_calls(&self) -> usize {
        self.shared.lock().install_calls
    }

    pub fn open_calls(&self) -> usize {
        self.shared.lock().open_calls
    }

    pub fn registered_drivers(&self) -> Vec<ChipFamily> {
        self.shared.lock().drivers.clone()
    }

    pub fn free_all_calls(&self) -> usize {
        self.shared.lock().free_all_calls
    }

    /// Every line coding applied so far, oldest first.
    pub fn line_codings(&self) -> Vec<LineConfiguration> {
        self.shared.lock().line_codings.clone()
    }

    /// Every byte successfully transmitted so far.
    pub fn transmitted(&self) -> Vec<u8> {
        self.shared.lock().transmitted.clone()
    }

    pub fn transmit_calls(&self) -> usize {
        self.shared.lock().transmit_calls
    }
}

impl fmt::Debug for MockUsbHostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockUsbHostHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::VcpDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<u8>>,
        disconnects: AtomicUsize,
    }

    impl DeviceEventHandler for Recorder {
        fn on_receive(&self, data: &[u8]) {
            self.received.lock().unwrap().extend_from_slice(data);
        }

        fn on_event(&self, event: DeviceEvent) {
            if event == DeviceEvent::Disconnected {
                self.disconnects.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    async fn installed_host() -> (MockUsbHost, MockUsbHostHandle) {
        let (host, handle) = MockUsbHost::new();
        host.install(&HostConfig::default()).await.unwrap();
        for chip in ChipFamily::ALL {
            host.register_driver(chip).await.unwrap();
        }
        (host, handle)
    }

    fn config(recorder: &Arc<Recorder>) -> DeviceConfig {
        DeviceConfig::new(Arc::clone(recorder) as Arc<dyn DeviceEventHandler>)
            .with_connection_timeout(Some(Duration::from_millis(20)))
    }

    #[tokio::test]
    async fn test_install_only_once() {
        let (host, handle) = MockUsbHost::new();
        host.install(&HostConfig::default()).await.unwrap();
        let second = host.install(&HostConfig::default()).await;
        assert!(matches!(second, Err(HardwareError::AlreadyInstalled)));
        assert_eq!(handle.install_calls(), 1);
    }

    #[tokio::test]
    async fn test_open_requires_installation() {
        let (host, _handle) = MockUsbHost::new();
        let recorder = Arc::new(Recorder::default());
        let result = host.open(config(&recorder)).await;
        assert!(matches!(result, Err(HardwareError::NotInstalled)));
    }

    #[tokio::test]
    async fn test_open_times_out_without_device() {
        let (host, _handle) = installed_host().await;
        let recorder = Arc::new(Recorder::default());
        let result = host.open(config(&recorder)).await;
        assert!(matches!(result, Err(HardwareError::DeviceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_open_waits_for_attach() {
        let (host, handle) = installed_host().await;
        let recorder = Arc::new(Recorder::default());
        let cfg = DeviceConfig::new(Arc::clone(&recorder) as Arc<dyn DeviceEventHandler>);

        let opener = tokio::spawn(async move { host.open(cfg).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.attach(MockDeviceSpec::cp210x());

        let device = opener.await.unwrap().unwrap();
        assert_eq!(device.info().chip, Some(ChipFamily::Cp210x));
        assert!(handle.is_open());
    }

    #[tokio::test]
    async fn test_filter_and_driver_must_match() {
        let (host, handle) = MockUsbHost::new();
        host.install(&HostConfig::default()).await.unwrap();
        host.register_driver(ChipFamily::Ftdi).await.unwrap();
        let recorder = Arc::new(Recorder::default());

        // No CH34x driver registered.
        handle.attach(MockDeviceSpec::ch34x());
        assert!(host.open(config(&recorder)).await.is_err());

        // Driver present but filter excludes it.
        handle.attach(MockDeviceSpec::ftdi());
        let filtered = config(&recorder).with_filter(hostserial_core::DeviceFilter::VidPid {
            vid: 0x0403,
            pid: 0x6015,
        });
        assert!(host.open(filtered).await.is_err());

        assert!(host.open(config(&recorder)).await.is_ok());
    }

    #[tokio::test]
    async fn test_detach_notifies_handler_and_kills_device() {
        let (host, handle) = installed_host().await;
        let recorder = Arc::new(Recorder::default());
        handle.attach(MockDeviceSpec::ftdi());
        let mut device = host.open(config(&recorder)).await.unwrap();

        assert!(handle.receive(b"hi"));
        assert_eq!(recorder.received.lock().unwrap().as_slice(), b"hi");

        assert!(handle.detach());
        assert_eq!(recorder.disconnects.load(Ordering::SeqCst), 1);
        assert!(!handle.receive(b"lost"));

        let result = device.transmit(b"x", Duration::from_millis(10)).await;
        assert!(matches!(result, Err(HardwareError::Disconnected { .. })));

        // Replugging does not revive the stale handle.
        handle.attach(MockDeviceSpec::ftdi());
        assert!(device.transmit(b"x", Duration::from_millis(10)).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_releases_session_and_wakes_event_loop() {
        let (host, handle) = installed_host().await;
        let recorder = Arc::new(Recorder::default());
        handle.attach(MockDeviceSpec::ftdi());
        let device = host.open(config(&recorder)).await.unwrap();

        drop(device);
        assert!(!handle.is_open());

        let events = host.handle_events().await.unwrap();
        assert!(events.no_clients);
    }
}
