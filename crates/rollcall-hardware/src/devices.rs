//! Enum wrappers for capability dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe, so
//! `Box<dyn HidBackend>` is not an option. These enums give the reader layer
//! a single concrete type per capability while real backends stay behind
//! feature flags.
//!
//! # Examples
//!
//! ```
//! use rollcall_hardware::devices::AnyRadioScanner;
//! use rollcall_hardware::mock::MockRadio;
//!
//! let (radio, _handle) = MockRadio::new();
//! let any_radio = AnyRadioScanner::from(radio);
//! ```

use crate::keyboard::StreamKeyboard;
use crate::mock::{MockHid, MockHidDevice, MockKeyboard, MockRadio};
use crate::traits::{HidBackend, HidDevice, KeySource, RadioScanner};
use crate::types::{DeviceFilter, HidDeviceInfo, InputReport, KeyEvent, RadioEvent};
use crate::Result;

#[cfg(feature = "hardware-usb")]
use crate::usb::{UsbHidBackend, UsbHidDevice};

#[cfg(feature = "hardware-pcsc")]
use crate::smartcard::PcscScanner;

/// Enum wrapper for HID backend dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyHidBackend {
    /// Mock platform for development and testing.
    Mock(MockHid),

    /// USB readers through hidapi.
    #[cfg(feature = "hardware-usb")]
    Usb(UsbHidBackend),
}

/// Enum wrapper for opened HID devices.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyHidDevice {
    /// Device opened on the mock platform.
    Mock(MockHidDevice),

    /// Device opened through hidapi.
    #[cfg(feature = "hardware-usb")]
    Usb(UsbHidDevice),
}

impl HidBackend for AnyHidBackend {
    type Device = AnyHidDevice;

    async fn request_device(&mut self, filters: &[DeviceFilter]) -> Result<Vec<HidDeviceInfo>> {
        match self {
            Self::Mock(backend) => backend.request_device(filters).await,
            #[cfg(feature = "hardware-usb")]
            Self::Usb(backend) => backend.request_device(filters).await,
        }
    }

    async fn authorized_devices(&mut self) -> Result<Vec<HidDeviceInfo>> {
        match self {
            Self::Mock(backend) => backend.authorized_devices().await,
            #[cfg(feature = "hardware-usb")]
            Self::Usb(backend) => backend.authorized_devices().await,
        }
    }

    async fn open(&mut self, device: &HidDeviceInfo) -> Result<AnyHidDevice> {
        match self {
            Self::Mock(backend) => backend.open(device).await.map(AnyHidDevice::Mock),
            #[cfg(feature = "hardware-usb")]
            Self::Usb(backend) => backend.open(device).await.map(AnyHidDevice::Usb),
        }
    }
}

impl HidDevice for AnyHidDevice {
    fn info(&self) -> &HidDeviceInfo {
        match self {
            Self::Mock(device) => device.info(),
            #[cfg(feature = "hardware-usb")]
            Self::Usb(device) => device.info(),
        }
    }

    async fn read_report(&mut self) -> Result<InputReport> {
        match self {
            Self::Mock(device) => device.read_report().await,
            #[cfg(feature = "hardware-usb")]
            Self::Usb(device) => device.read_report().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(device) => device.close().await,
            #[cfg(feature = "hardware-usb")]
            Self::Usb(device) => device.close().await,
        }
    }
}

impl From<MockHid> for AnyHidBackend {
    fn from(backend: MockHid) -> Self {
        Self::Mock(backend)
    }
}

#[cfg(feature = "hardware-usb")]
impl From<UsbHidBackend> for AnyHidBackend {
    fn from(backend: UsbHidBackend) -> Self {
        Self::Usb(backend)
    }
}

/// Enum wrapper for ambient scanner dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyRadioScanner {
    /// Mock scanner for development and testing.
    Mock(MockRadio),

    /// PC/SC contactless readers.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscScanner),
}

impl RadioScanner for AnyRadioScanner {
    async fn scan(&mut self) -> Result<()> {
        match self {
            Self::Mock(scanner) => scanner.scan().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(scanner) => scanner.scan().await,
        }
    }

    async fn next_event(&mut self) -> Result<RadioEvent> {
        match self {
            Self::Mock(scanner) => scanner.next_event().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(scanner) => scanner.next_event().await,
        }
    }

    async fn stop(&mut self) -> Result<()> {
        match self {
            Self::Mock(scanner) => scanner.stop().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(scanner) => scanner.stop().await,
        }
    }
}

impl From<MockRadio> for AnyRadioScanner {
    fn from(scanner: MockRadio) -> Self {
        Self::Mock(scanner)
    }
}

#[cfg(feature = "hardware-pcsc")]
impl From<PcscScanner> for AnyRadioScanner {
    fn from(scanner: PcscScanner) -> Self {
        Self::Pcsc(scanner)
    }
}

/// Enum wrapper for key source dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyKeySource {
    /// Mock keyboard for development and testing.
    Mock(MockKeyboard),

    /// Byte stream such as standard input.
    Stream(StreamKeyboard),
}

impl KeySource for AnyKeySource {
    async fn next_event(&mut self) -> Result<KeyEvent> {
        match self {
            Self::Mock(source) => source.next_event().await,
            Self::Stream(source) => source.next_event().await,
        }
    }

    fn consume(&mut self, event: &KeyEvent) {
        match self {
            Self::Mock(source) => source.consume(event),
            Self::Stream(source) => source.consume(event),
        }
    }
}

impl From<MockKeyboard> for AnyKeySource {
    fn from(source: MockKeyboard) -> Self {
        Self::Mock(source)
    }
}

impl From<StreamKeyboard> for AnyKeySource {
    fn from(source: StreamKeyboard) -> Self {
        Self::Stream(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_hid_backend_mock() {
        let (backend, handle) = MockHid::new();
        handle.attach_authorized(HidDeviceInfo::new(0x072F, 0x2200, "ACR122U"));

        let mut any_backend = AnyHidBackend::from(backend);
        let authorized = any_backend.authorized_devices().await.unwrap();
        assert_eq!(authorized.len(), 1);

        let device = any_backend.open(&authorized[0]).await.unwrap();
        assert_eq!(device.info().product_name, "ACR122U");
    }

    #[tokio::test]
    async fn test_any_radio_scanner_mock() {
        let (radio, handle) = MockRadio::new();
        let mut any_radio = AnyRadioScanner::from(radio);

        any_radio.scan().await.unwrap();
        assert!(handle.is_scanning());

        any_radio.stop().await.unwrap();
        assert!(!handle.is_scanning());
    }

    #[tokio::test]
    async fn test_any_key_source_mock() {
        let (keyboard, handle) = MockKeyboard::new();
        let mut any_source = AnyKeySource::from(keyboard);

        handle.press(KeyEvent::enter()).await.unwrap();
        let event = any_source.next_event().await.unwrap();
        any_source.consume(&event);

        assert_eq!(handle.consumed(), vec![KeyEvent::enter()]);
    }
}
