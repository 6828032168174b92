//! Error types for host stack and adapter operations.
//!
//! Every failure the device stack can report is folded into [`HardwareError`].
//! The transport treats all of them the same way ("not currently connected"),
//! but keeping them distinct makes the pump's log output useful.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving the USB host stack or an adapter.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// No attached device matched the acceptance criteria.
    #[error("No matching device: {filter}")]
    DeviceNotFound { filter: String },

    /// Host stack used before installation.
    #[error("USB host stack is not installed")]
    NotInstalled,

    /// Host stack may only be installed once per process.
    #[error("USB host stack is already installed")]
    AlreadyInstalled,

    /// Host stack installation failed.
    #[error("Installation failed: {message}")]
    InstallFailed { message: String },

    /// The adapter refused the requested line coding.
    #[error("Line coding rejected: {message}")]
    LineCodingRejected { message: String },

    /// A blocking transmit did not complete.
    #[error("Transmit failed: {message}")]
    TransmitFailed { message: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new device-not-found error.
    pub fn device_not_found(filter: impl ToString) -> Self {
        Self::DeviceNotFound {
            filter: filter.to_string(),
        }
    }

    /// Create a new installation failure.
    pub fn install_failed(message: impl Into<String>) -> Self {
        Self::InstallFailed {
            message: message.into(),
        }
    }

    /// Create a new line coding error.
    pub fn line_coding_rejected(message: impl Into<String>) -> Self {
        Self::LineCodingRejected {
            message: message.into(),
        }
    }

    /// Create a new transmit error.
    pub fn transmit_failed(message: impl Into<String>) -> Self {
        Self::TransmitFailed {
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("FT232R");
        assert_eq!(error.to_string(), "Device disconnected: FT232R");
    }

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(1000);
        assert!(matches!(error, HardwareError::Timeout { .. }));
        assert_eq!(error.to_string(), "Operation timeout after 1000ms");
    }

    #[test]
    fn test_device_not_found_error() {
        let filter = hostserial_core::DeviceFilter::from_ids(0x0403, 0x6001);
        let error = HardwareError::device_not_found(filter);
        assert_eq!(error.to_string(), "No matching device: 0403:6001");
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            HardwareError::NotInstalled,
            HardwareError::AlreadyInstalled,
            HardwareError::install_failed("phy"),
            HardwareError::line_coding_rejected("stall"),
            HardwareError::transmit_failed("pipe"),
            HardwareError::communication("crc"),
        ];

        for error in errors {
            let _ = format!("{}", error);
            let _ = format!("{:?}", error);
        }
    }
}
