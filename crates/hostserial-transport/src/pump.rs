//! Background worker that owns the device session.
//!
//! The pump is the only code that touches a [`DeviceSession`]. It cycles
//! through three states:
//!
//! ```text
//!            open + line coding ok
//!  Attaching ─────────────────────────► Connected
//!     ▲  │                                  │
//!     │  └── open / line coding failed ─┐   │ detach or transmit failure
//!     │      (settle, backoff, retry)   │   ▼
//!     └─────────────────────────────────┴─ Disconnected
//! ```
//!
//! While connected it drains the TX buffer into the adapter, one contiguous
//! chunk per transmit. A chunk is only committed out of the buffer once the
//! adapter accepted it, so a transmit failure never loses bytes unless the
//! carry-over policy says to discard them.
//!
//! The [`ConnectionSignal`] doubles as the "not connected" baseline: it is
//! given whenever no live session exists, cleared right before each open
//! attempt, and given again by the device callback on detach.

use crate::config::{TransportConfig, TxCarryOver};
use crate::ring_buffer::ByteRingBuffer;
use crate::session::{DeviceSession, SessionEvents, SessionOptions};
use crate::signal::ConnectionSignal;
use crate::state::ConnectionState;
use hostserial_core::LineConfiguration;
use hostserial_hardware::{AnyUsbHost, DeviceInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Delay before attach attempt number `attempt` (1-based) is retried.
///
/// Doubles from `base` on every consecutive failure, capped at `max`.
pub(crate) fn retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let shift = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1 << shift).min(max)
}

/// Handles shared between the transport façade, the pump and the callbacks.
#[derive(Debug, Clone)]
pub(crate) struct PumpLinks {
    pub tx: Arc<ByteRingBuffer>,
    pub rx: Arc<ByteRingBuffer>,
    pub signal: Arc<ConnectionSignal>,
    pub state: Arc<watch::Sender<ConnectionState>>,
    pub device: Arc<watch::Sender<Option<DeviceInfo>>>,
}

impl PumpLinks {
    pub(crate) fn new(tx: ByteRingBuffer, rx: ByteRingBuffer) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (device, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            rx: Arc::new(rx),
            signal: Arc::new(ConnectionSignal::new_signalled()),
            state: Arc::new(state),
            device: Arc::new(device),
        }
    }

    /// Publish `next` only if it differs from the current state.
    pub(crate) fn set_state(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        })
    }
}

/// Why a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Detached,
    TransmitFailed,
}

pub(crate) struct PumpWorker {
    stack: AnyUsbHost,
    links: PumpLinks,
    line: watch::Receiver<LineConfiguration>,
    options: SessionOptions,
    drain_timeout: Duration,
    attach_settle: Duration,
    max_backoff: Duration,
    carry_over: TxCarryOver,
}

impl PumpWorker {
    pub(crate) fn new(
        stack: AnyUsbHost,
        config: &TransportConfig,
        links: PumpLinks,
        line: watch::Receiver<LineConfiguration>,
    ) -> Self {
        let options = SessionOptions {
            filter: config.filter,
            connection_timeout: config.connection_timeout_duration(),
            transmit_timeout: config.transmit_timeout(),
            out_buffer_size: config.tx_buffer_size,
            in_buffer_size: config.rx_buffer_size,
        };

        Self {
            stack,
            links,
            line,
            options,
            drain_timeout: config.drain_timeout(),
            attach_settle: config.attach_settle(),
            max_backoff: config.max_backoff(),
            carry_over: config.tx_carry_over,
        }
    }

    /// Run until `shutdown` is cancelled. Any open session is closed on exit.
    pub(crate) async fn run(self, shutdown: CancellationToken) {
        let span = info_span!("usb_pump", filter = %self.options.filter);
        async move {
            info!("Pump started");
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = self.pump_forever() => {}
            }

            self.links.device.send_replace(None);
            self.links.signal.give();
            self.links.set_state(ConnectionState::Disconnected);
            info!("Pump stopped");
        }
        .instrument(span)
        .await
    }

    async fn pump_forever(&self) {
        let mut failures: u32 = 0;

        loop {
            self.links.set_state(ConnectionState::Attaching);

            let Some(mut session) = self.attach().await else {
                failures = failures.saturating_add(1);
                let delay = retry_delay(failures, self.attach_settle, self.max_backoff);
                if failures > 1 {
                    debug!(failures, delay_ms = delay.as_millis() as u64, "Attach retry backoff");
                }
                tokio::time::sleep(delay).await;
                continue;
            };
            failures = 0;

            self.links.device.send_replace(Some(session.info().clone()));
            self.links.set_state(ConnectionState::Connected);
            info!(device = %session.info(), "USB device connected");

            let end = self.pump_session(&mut session).await;
            drop(session);
            self.finish_session(end);
        }
    }

    /// One attach attempt: open the adapter and apply the line coding.
    async fn attach(&self) -> Option<DeviceSession> {
        // Clear the baseline so a detach of the new session is not missed.
        self.links.signal.try_take();

        let events = Arc::new(SessionEvents::new(
            Arc::clone(&self.links.rx),
            Arc::clone(&self.links.signal),
        ));

        tokio::time::sleep(self.attach_settle).await;
        let opened = DeviceSession::open(&self.stack, &self.options, events).await;
        tokio::time::sleep(self.attach_settle).await;

        let Some(mut session) = opened else {
            self.links.signal.give();
            return None;
        };

        let line = *self.line.borrow();
        if !session.apply_line_coding(&line).await {
            drop(session);
            self.links.signal.give();
            return None;
        }

        Some(session)
    }

    async fn pump_session(&self, session: &mut DeviceSession) -> SessionEnd {
        let max_chunk = self.links.tx.capacity();

        loop {
            if self.links.signal.is_signalled() {
                return SessionEnd::Detached;
            }

            if let Some(chunk) = self.links.tx.pop_up_to(max_chunk, self.drain_timeout).await {
                if !session.transmit_blocking(&chunk).await {
                    // Dropping the chunk leaves its bytes queued.
                    drop(chunk);
                    return SessionEnd::TransmitFailed;
                }
                debug!(len = chunk.len(), "TX chunk delivered");
                chunk.commit();
            }

            tokio::task::yield_now().await;
        }
    }

    fn finish_session(&self, end: SessionEnd) {
        self.links.device.send_replace(None);
        self.links.set_state(ConnectionState::Disconnected);

        match end {
            SessionEnd::Detached => info!("USB device detached"),
            SessionEnd::TransmitFailed => warn!("Dropping USB session after transmit failure"),
        }

        // A detach left the signal given already; after a transmit failure
        // nothing did, so restore the baseline by hand.
        self.links.signal.give();

        if self.carry_over == TxCarryOver::Discard {
            let dropped = self.links.tx.clear();
            if dropped > 0 {
                info!(dropped, "Discarded pending TX bytes");
            }
        } else {
            let pending = self.links.tx.len();
            if pending > 0 {
                debug!(pending, "Keeping pending TX bytes for the next device");
            }
        }
    }
}
