//! Application-facing serial port over a USB VCP adapter.
//!
//! # Architecture
//!
//! ```text
//!  application ──write──► TX ring ──pump──► DeviceSession ──► adapter
//!  application ◄──read─── RX ring ◄──────── receive callback ◄──┘
//!                         ConnectionSignal ◄── detach callback
//! ```
//!
//! The transport never talks to the adapter itself. Writes and reads only
//! touch the ring buffers and are bounded by their short timeouts; all
//! device I/O happens in the pump task started by [`SerialTransport::begin`].
//!
//! # Example
//!
//! ```no_run
//! use hostserial_hardware::mock::{MockDeviceSpec, MockUsbHost};
//! use hostserial_transport::{SerialTransport, TransportConfig, UsbHost};
//! use hostserial_core::LineConfiguration;
//!
//! # async fn example() -> hostserial_transport::Result<()> {
//! let (stack, handle) = MockUsbHost::new();
//! let port = SerialTransport::new(UsbHost::new(stack), TransportConfig::default())?;
//!
//! port.begin(LineConfiguration::from_raw(115_200, 0, 0, 8)?).await?;
//! handle.attach(MockDeviceSpec::ftdi());
//!
//! port.write(b"hello").await;
//! let mut buf = [0u8; 64];
//! let n = port.read(&mut buf).await;
//! # let _ = n;
//! port.end().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::TransportConfig;
use crate::error::Result;
use crate::host::UsbHost;
use crate::pump::{PumpLinks, PumpWorker};
use crate::ring_buffer::ByteRingBuffer;
use crate::state::ConnectionState;
use hostserial_core::LineConfiguration;
use hostserial_hardware::DeviceInfo;
use std::fmt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

struct Worker {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Serial port backed by whatever USB-to-serial adapter is plugged in.
///
/// Adapters may come and go at any time; the transport keeps buffering in
/// both directions and resumes pumping on reattach without another `begin`.
pub struct SerialTransport {
    host: UsbHost,
    config: TransportConfig,
    links: PumpLinks,
    line: watch::Sender<LineConfiguration>,
    worker: Mutex<Option<Worker>>,
}

impl SerialTransport {
    /// Allocate the buffers. Nothing touches the USB stack until `begin`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Config` if the configuration is unusable.
    pub fn new(host: UsbHost, config: TransportConfig) -> Result<Self> {
        config.validate()?;

        let links = PumpLinks::new(
            ByteRingBuffer::new(config.tx_buffer_size)?,
            ByteRingBuffer::new(config.rx_buffer_size)?,
        );
        let (line, _) = watch::channel(LineConfiguration::default());

        Ok(Self {
            host,
            config,
            links,
            line,
            worker: Mutex::new(None),
        })
    }

    /// Install the host stack if needed, store `line` and start the pump.
    ///
    /// Safe to call repeatedly: the stack is installed once per [`UsbHost`],
    /// and a running pump is kept. The new line coding is applied on the next
    /// attach. A `begin` racing an `end` waits until the old pump has
    /// fully stopped before starting a new one.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::HostInstall` if the host stack could not be
    /// brought up.
    pub async fn begin(&self, line: LineConfiguration) -> Result<()> {
        self.host.ensure_installed(&self.config.host).await?;
        self.line.send_replace(line);

        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.task.is_finished()) {
            info!(line = %line, "Transport already running, line coding updated");
            return Ok(());
        }

        let shutdown = CancellationToken::new();
        let pump = PumpWorker::new(
            self.host.stack().clone(),
            &self.config,
            self.links.clone(),
            self.line.subscribe(),
        );
        let task = tokio::spawn(pump.run(shutdown.clone()));
        *worker = Some(Worker { shutdown, task });

        info!(line = %line, filter = %self.config.filter, "Transport started");
        Ok(())
    }

    /// `begin` with the numeric line coding used by CDC adapters
    /// (stop bits 0/1/2, parity 0..=4).
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Core` for out-of-range codes, otherwise as
    /// [`begin`](Self::begin).
    pub async fn begin_raw(
        &self,
        baud_rate: u32,
        stop_bits: u8,
        parity: u8,
        data_bits: u8,
    ) -> Result<()> {
        let line = LineConfiguration::from_raw(baud_rate, stop_bits, parity, data_bits)?;
        self.begin(line).await
    }

    /// Stop the pump and close the session.
    ///
    /// Buffered bytes stay where they are; a later `begin` picks them up.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Worker` if the pump task panicked.
    pub async fn end(&self) -> Result<()> {
        // Held until the pump has exited so a concurrent `begin` cannot
        // start a second pump on the same buffers.
        let mut slot = self.worker.lock().await;
        let Some(worker) = slot.take() else {
            return Ok(());
        };

        worker.shutdown.cancel();
        worker.task.await?;
        info!("Transport stopped");
        Ok(())
    }

    /// Queue one byte. Returns 1, or 0 if the TX buffer stayed full.
    pub async fn write_byte(&self, byte: u8) -> usize {
        let written = self
            .links
            .tx
            .push(&[byte], self.config.write_timeout())
            .await;
        if written == 0 {
            warn!("TX buffer overflow");
        }
        written
    }

    /// Queue all of `data` or nothing.
    ///
    /// Returns `data.len()`, or 0 if the TX buffer lacks room for all of it.
    pub async fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }

        let free = self.links.tx.free();
        if free < data.len() {
            warn!(len = data.len(), free, "TX buffer overflow");
            return 0;
        }

        let written = self
            .links
            .tx
            .push(data, self.config.write_timeout())
            .await;
        if written == 0 {
            warn!(len = data.len(), "TX buffer overflow");
        } else {
            trace!(len = written, "Queued TX bytes");
        }
        written
    }

    /// Bytes waiting in the RX buffer.
    pub fn available(&self) -> usize {
        self.links.rx.len()
    }

    /// Next received byte, if one arrives within the read timeout.
    pub async fn try_read_byte(&self) -> Option<u8> {
        let chunk = self
            .links
            .rx
            .pop_up_to(1, self.config.read_timeout())
            .await?;
        chunk.commit().first().copied()
    }

    /// Next received byte, or 0 if none arrived.
    pub async fn read_byte(&self) -> u8 {
        self.try_read_byte().await.unwrap_or(0)
    }

    /// Fill `dest` from the RX buffer.
    ///
    /// Stops early as soon as a pop comes back empty. Returns the number of
    /// bytes copied.
    pub async fn read(&self, dest: &mut [u8]) -> usize {
        let timeout = self.config.read_timeout();
        let mut filled = 0;

        while filled < dest.len() {
            let Some(chunk) = self.links.rx.pop_up_to(dest.len() - filled, timeout).await else {
                break;
            };
            dest[filled..filled + chunk.len()].copy_from_slice(&chunk);
            filled += chunk.len();
            chunk.commit();
        }

        if filled > 0 {
            debug!(len = filled, remaining = self.links.rx.len(), "Read RX bytes");
        }
        filled
    }

    /// True while a configured adapter is attached and no detach has been
    /// observed since. Never consumes a pending detach.
    pub fn is_connected(&self) -> bool {
        self.links.state.borrow().is_connected() && !self.links.signal.is_signalled()
    }

    pub fn state(&self) -> ConnectionState {
        *self.links.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.links.state.subscribe()
    }

    /// Bytes queued for transmit, including a chunk currently in flight.
    pub fn pending_tx(&self) -> usize {
        self.links.tx.capacity() - self.links.tx.free()
    }

    /// The adapter of the live session, if any.
    pub fn attached_device(&self) -> Option<DeviceInfo> {
        self.links.device.borrow().clone()
    }

    /// Line coding applied to the next attached adapter.
    pub fn line_configuration(&self) -> LineConfiguration {
        *self.line.borrow()
    }

    /// True while the pump task is alive. Reports true while a `begin` or
    /// `end` is still in progress.
    pub fn is_running(&self) -> bool {
        match self.worker.try_lock() {
            Ok(worker) => worker.as_ref().is_some_and(|w| !w.task.is_finished()),
            Err(_) => true,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("state", &self.state())
            .field("line", &self.line_configuration())
            .field("pending_tx", &self.pending_tx())
            .field("available", &self.available())
            .finish_non_exhaustive()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.shutdown.cancel();
        }
    }
}
