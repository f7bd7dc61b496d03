//! Error types for hardware operations.
//!
//! This module defines error types for the platform capabilities the reader
//! layer consumes: device choosers, HID report channels, ambient scanners and
//! key-event sources.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The platform refused access to the device.
    #[error("Permission denied: {device}")]
    PermissionDenied { device: String },

    /// No device matched the request.
    #[error("Device not found: {device}")]
    NotFound { device: String },

    /// A selected device could not be opened.
    #[error("Failed to open {device}: {message}")]
    OpenFailed { device: String, message: String },

    /// Operation is not supported by this device or platform.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new permission denied error.
    pub fn permission_denied(device: impl Into<String>) -> Self {
        Self::PermissionDenied {
            device: device.into(),
        }
    }

    /// Create a new not found error.
    pub fn not_found(device: impl Into<String>) -> Self {
        Self::NotFound {
            device: device.into(),
        }
    }

    /// Create a new open failed error.
    pub fn open_failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns `true` if the device is gone and the session cannot continue.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("ACR122U");
        assert!(error.is_disconnect());
        assert_eq!(error.to_string(), "Device disconnected: ACR122U");
    }

    #[test]
    fn test_permission_denied_error() {
        let error = HardwareError::permission_denied("/dev/hidraw0");
        assert!(matches!(error, HardwareError::PermissionDenied { .. }));
        assert!(!error.is_disconnect());
        assert_eq!(error.to_string(), "Permission denied: /dev/hidraw0");
    }

    #[test]
    fn test_open_failed_error() {
        let error = HardwareError::open_failed("ACR1252U", "device busy");
        assert!(matches!(error, HardwareError::OpenFailed { .. }));
        assert_eq!(error.to_string(), "Failed to open ACR1252U: device busy");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed");
        let error: HardwareError = io.into();
        assert!(matches!(error, HardwareError::Io(_)));
    }
}
