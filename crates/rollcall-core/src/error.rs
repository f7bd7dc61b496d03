//! Error taxonomy of the card-reader layer.
//!
//! Framing-level failures ([`ReaderError::InvalidFormat`]) are recovered where
//! they happen and never reach consumers. Device lifecycle failures are
//! recorded in the reader snapshot so the application can render them.

use thiserror::Error;

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors surfaced by the card-reader layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReaderError {
    /// Opening the selected device failed.
    #[error("Device unavailable: {message}")]
    DeviceUnavailable { message: String },

    /// The platform denied access to the device class.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The user dismissed the device chooser without picking a reader.
    #[error("No device selected")]
    NoDeviceSelected,

    /// A manual read expired before any card was presented.
    #[error("No card detected within {timeout_ms}ms")]
    ReadTimeout { timeout_ms: u64 },

    /// Accumulated input is not a well-formed identifier.
    #[error("Invalid identifier format: {message}")]
    InvalidFormat { message: String },

    /// The active transport reported an error event.
    #[error("Transport error: {message}")]
    TransportError { message: String },

    /// The operation needs an open reader session.
    #[error("Reader is not connected")]
    NotConnected,

    /// None of the card transports is available on this platform.
    #[error("No card reader transport available")]
    NoTransport,

    /// Reader configuration is inconsistent.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The reader task has stopped.
    #[error("Reader stopped")]
    Closed,
}

impl ReaderError {
    /// Create a new device unavailable error.
    pub fn device_unavailable(message: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: message.into(),
        }
    }

    /// Create a new permission denied error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a new read timeout error.
    pub fn read_timeout(timeout_ms: u64) -> Self {
        Self::ReadTimeout { timeout_ms }
    }

    /// Create a new invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create a new transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    /// Create a new invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the error should be shown to the user.
    ///
    /// A dismissed chooser is a deliberate user action and malformed input is
    /// transport noise; neither warrants an error banner.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::NoDeviceSelected | Self::InvalidFormat { .. })
    }

    /// Whether retrying the operation can succeed without outside action.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::PermissionDenied { .. }
                | Self::NoTransport
                | Self::InvalidConfig { .. }
                | Self::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_read_timeout_message() {
        let error = ReaderError::read_timeout(3000);
        assert_eq!(error.to_string(), "No card detected within 3000ms");
    }

    #[test]
    fn test_device_unavailable_message() {
        let error = ReaderError::device_unavailable("ACR122U busy");
        assert!(matches!(error, ReaderError::DeviceUnavailable { .. }));
        assert_eq!(error.to_string(), "Device unavailable: ACR122U busy");
    }

    #[rstest]
    #[case(ReaderError::NoDeviceSelected, false)]
    #[case(ReaderError::invalid_format("XYZ"), false)]
    #[case(ReaderError::read_timeout(100), true)]
    #[case(ReaderError::transport("scan failed"), true)]
    #[case(ReaderError::permission_denied("hid"), true)]
    fn test_user_facing(#[case] error: ReaderError, #[case] expected: bool) {
        assert_eq!(error.is_user_facing(), expected);
    }

    #[rstest]
    #[case(ReaderError::device_unavailable("busy"), true)]
    #[case(ReaderError::NoDeviceSelected, true)]
    #[case(ReaderError::read_timeout(100), true)]
    #[case(ReaderError::permission_denied("hid"), false)]
    #[case(ReaderError::NoTransport, false)]
    fn test_recoverable(#[case] error: ReaderError, #[case] expected: bool) {
        assert_eq!(error.is_recoverable(), expected);
    }
}
