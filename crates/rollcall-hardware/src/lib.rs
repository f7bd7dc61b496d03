//! Platform capability layer for the Rollcall card reader.
//!
//! This crate provides trait-based abstractions for the three ways a card
//! reader reaches the host: a permission-gated HID device, an ambient
//! contactless scanner, and a keyboard-wedge event stream. The traits let the
//! reader layer swap mock platforms (for development and testing) with real
//! backends.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All I/O operations use native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Enum dispatch**: The traits are not object-safe; [`devices`] wraps
//!   concrete implementations in enums instead of `Box<dyn Trait>`.
//! - **Thread-safe**: All traits require `Send + Sync` for use with Tokio.
//! - **Error-aware**: All operations return [`Result<T>`][error::Result] with
//!   a [`HardwareError`] the reader layer maps onto its own taxonomy.
//!
//! # Capabilities
//!
//! ## HID
//!
//! [`HidBackend`] exposes the device chooser and the list of previously
//! granted devices; [`HidDevice`] delivers raw input reports:
//!
//! ```no_run
//! use rollcall_hardware::{HidBackend, HidDevice, Result};
//!
//! async fn reopen<B: HidBackend>(backend: &mut B) -> Result<Option<B::Device>> {
//!     let authorized = backend.authorized_devices().await?;
//!     match authorized.as_slice() {
//!         [only] if !only.opened => Ok(Some(backend.open(only).await?)),
//!         _ => Ok(None),
//!     }
//! }
//! ```
//!
//! ## Ambient scan
//!
//! [`RadioScanner`] reports already-framed serial numbers:
//!
//! ```no_run
//! use rollcall_hardware::{RadioEvent, RadioScanner, Result};
//!
//! async fn first_serial<R: RadioScanner>(radio: &mut R) -> Result<Option<String>> {
//!     radio.scan().await?;
//!     let event = radio.next_event().await?;
//!     radio.stop().await?;
//!     Ok(match event {
//!         RadioEvent::Reading { serial_number } => Some(serial_number),
//!         _ => None,
//!     })
//! }
//! ```
//!
//! ## Keyboard wedge
//!
//! [`KeySource`] yields key-down events and lets the caller consume them.
//!
//! # Feature flags
//!
//! - `hardware-usb`: [`usb::UsbHidBackend`] on top of `hidapi`
//! - `hardware-pcsc`: [`smartcard::PcscScanner`] on top of `pcsc`

pub mod devices;
pub mod error;
pub mod keyboard;
pub mod mock;
#[cfg(feature = "hardware-pcsc")]
pub mod smartcard;
pub mod traits;
pub mod types;
#[cfg(feature = "hardware-usb")]
pub mod usb;

// Re-export commonly used types for convenience
pub use devices::{AnyHidBackend, AnyHidDevice, AnyKeySource, AnyRadioScanner};
pub use error::{HardwareError, Result};
pub use traits::{HidBackend, HidDevice, KeySource, RadioScanner};
pub use types::{DeviceFilter, HidDeviceInfo, InputReport, KeyEvent, RadioEvent};
