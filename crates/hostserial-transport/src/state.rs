//! Connection states published by the pump.
//!
//! # Transitions
//!
//! - Disconnected → Attaching: the pump starts an open attempt
//! - Attaching → Connected: open and line coding both succeeded
//! - Attaching → Attaching: open or line coding failed, retry
//! - Connected → Disconnected: detach observed or transmit failed
//! - any → Disconnected: the pump stopped

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No adapter session. Initial state and the state after every detach.
    #[default]
    Disconnected,

    /// Waiting for an adapter to appear and accept line coding.
    Attaching,

    /// Session open and configured; TX is being pumped.
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Attaching => "attaching",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}
