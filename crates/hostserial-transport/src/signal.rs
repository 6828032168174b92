//! Binary detach signal shared by the device callback, the pump and the
//! application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A set/clear flag with an atomic take.
///
/// The host stack's event callback gives it when the adapter goes away; the
/// pump takes it to learn about the detach. While no session exists the pump
/// leaves it given, so "signalled" also means "nothing connected".
/// [`is_signalled`](Self::is_signalled) peeks without clearing, so a status
/// query never swallows a pending detach.
#[derive(Debug, Default)]
pub struct ConnectionSignal {
    signalled: AtomicBool,
    notify: Notify,
}

impl ConnectionSignal {
    /// A clear signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that starts given: nothing has connected yet.
    pub fn new_signalled() -> Self {
        Self {
            signalled: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// Set the signal. Giving an already given signal changes nothing.
    pub fn give(&self) {
        if !self.signalled.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Clear the signal if it is set, without waiting.
    pub fn try_take(&self) -> bool {
        self.signalled
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Wait for the signal and clear it.
    ///
    /// `None` waits indefinitely. Returns `false` if the timeout elapsed first.
    pub async fn take(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            let given = self.notify.notified();
            tokio::pin!(given);
            given.as_mut().enable();

            if self.try_take() {
                return true;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, given).await.is_err() {
                        return self.try_take();
                    }
                }
                None => given.await,
            }
        }
    }

    /// Current state, without clearing it.
    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::Acquire)
    }
}
