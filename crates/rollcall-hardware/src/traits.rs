//! Platform capability trait definitions.
//!
//! This module defines the contracts between the reader layer and the
//! platform: a HID device chooser with its opened devices, an ambient
//! contactless scanner, and a keyboard event stream. Each contract has mock
//! implementations for tests and real backends behind feature flags.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{DeviceFilter, HidDeviceInfo, InputReport, KeyEvent, RadioEvent};

/// HID device discovery and permission capability.
///
/// Models a permission-gated platform: first-time access to a device goes
/// through a user-facing chooser ([`request_device`](Self::request_device)),
/// while devices granted earlier can be listed and reopened without a new
/// prompt ([`authorized_devices`](Self::authorized_devices)).
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`, which is an opaque type that cannot be used in trait objects
/// (Edition 2024 RPITIT). For dynamic dispatch, use
/// [`AnyHidBackend`](crate::devices::AnyHidBackend).
///
/// # Examples
///
/// ```no_run
/// use rollcall_hardware::traits::{HidBackend, HidDevice};
/// use rollcall_hardware::types::DeviceFilter;
/// use rollcall_hardware::error::Result;
///
/// async fn first_report<B: HidBackend>(backend: &mut B) -> Result<Vec<u8>> {
///     let chosen = backend.request_device(&DeviceFilter::supported_readers()).await?;
///     let Some(info) = chosen.first() else {
///         return Ok(Vec::new());
///     };
///
///     let mut device = backend.open(info).await?;
///     let report = device.read_report().await?;
///     device.close().await?;
///     Ok(report.data.to_vec())
/// }
/// ```
pub trait HidBackend: Send + Sync {
    /// Device type returned by [`open`](Self::open).
    type Device: HidDevice + 'static;

    /// Present the device chooser filtered to `filters`.
    ///
    /// Returns the devices the user picked; an empty list means the chooser
    /// was dismissed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The platform denies access to the HID device class
    /// - The chooser cannot be shown
    async fn request_device(&mut self, filters: &[DeviceFilter]) -> Result<Vec<HidDeviceInfo>>;

    /// List devices that can be opened without a new consent prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot enumerate devices.
    async fn authorized_devices(&mut self) -> Result<Vec<HidDeviceInfo>>;

    /// Open a device previously returned by the chooser or the authorized
    /// list.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Access to the device is denied
    /// - The device is gone or busy
    async fn open(&mut self, device: &HidDeviceInfo) -> Result<Self::Device>;
}

/// An opened HID device delivering input reports.
pub trait HidDevice: Send + Sync {
    /// Descriptor of the opened device.
    fn info(&self) -> &HidDeviceInfo;

    /// Wait for the next input report.
    ///
    /// Reports are delivered in arrival order. The returned future must be
    /// cancel-safe: dropping it loses no report.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The device was unplugged ([`HardwareError::Disconnected`](crate::HardwareError::Disconnected))
    /// - A communication error occurs
    async fn read_report(&mut self) -> Result<InputReport>;

    /// Close the device and release the platform handle.
    ///
    /// Closing an already closed device is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to release the handle.
    async fn close(&mut self) -> Result<()>;
}

/// Ambient contactless scan capability.
///
/// The platform listens for cards in the field on its own and reports
/// already-framed serial numbers, so there is no device selection step.
pub trait RadioScanner: Send + Sync {
    /// Start scanning.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The user or platform denies radio access
    /// - No radio is present
    async fn scan(&mut self) -> Result<()>;

    /// Wait for the next reading or reading-error event.
    ///
    /// The returned future must be cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan stopped or the radio went away.
    async fn next_event(&mut self) -> Result<RadioEvent>;

    /// Stop scanning. Stopping an idle scanner is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to stop the scan.
    async fn stop(&mut self) -> Result<()>;
}

/// Document-level keyboard event stream.
pub trait KeySource: Send + Sync {
    /// Wait for the next key-down event.
    ///
    /// The returned future must be cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns an error if the event stream is closed.
    async fn next_event(&mut self) -> Result<KeyEvent>;

    /// Consume an event so it does not reach focused input fields.
    fn consume(&mut self, event: &KeyEvent);
}
