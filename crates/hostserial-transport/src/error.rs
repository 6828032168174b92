//! Error types for the serial transport.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that prevent the transport from being created or started.
///
/// Buffer conditions (full, empty) are reported as counts and device-level
/// failures are absorbed by the pump, so neither shows up here.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Invalid transport configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The host stack could not be installed or its drivers registered.
    #[error("USB host stack installation failed: {0}")]
    HostInstall(#[source] hostserial_hardware::HardwareError),

    /// The pump task panicked or could not be joined.
    #[error("Pump worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Invalid line coding.
    #[error(transparent)]
    Core(#[from] hostserial_core::Error),
}

impl TransportError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True if the failure happened while bringing up the host stack.
    pub fn is_install_failure(&self) -> bool {
        matches!(self, Self::HostInstall(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostserial_hardware::HardwareError;

    #[test]
    fn test_error_display() {
        let err = TransportError::config("rx_buffer_size must be non-zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: rx_buffer_size must be non-zero"
        );

        let err = TransportError::HostInstall(HardwareError::install_failed("no PHY"));
        assert!(err.to_string().starts_with("USB host stack installation failed"));
        assert!(err.is_install_failure());
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: TransportError = hostserial_core::Error::InvalidBaudRate(0).into();
        assert_eq!(
            err.to_string(),
            hostserial_core::Error::InvalidBaudRate(0).to_string()
        );
        assert!(!err.is_install_failure());
    }
}
