//! Common types shared across hardware capability implementations.
//!
//! This module defines the data exchanged with platform capabilities: device
//! filters and descriptors for the HID chooser, raw input reports, key events
//! and ambient scan events.

use bytes::Bytes;
use rollcall_core::constants::{ENTER_KEY, SUPPORTED_READERS};
use serde::{Deserialize, Serialize};

/// Chooser filter selecting devices by USB vendor and optional product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// USB vendor identifier.
    pub vendor_id: u16,

    /// USB product identifier; `None` matches every product of the vendor.
    #[serde(default)]
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Create a filter matching every product of a vendor.
    pub fn vendor(vendor_id: u16) -> Self {
        Self {
            vendor_id,
            product_id: None,
        }
    }

    /// Restrict the filter to a single product.
    pub fn with_product(mut self, product_id: u16) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Filters for the supported reader family.
    pub fn supported_readers() -> Vec<Self> {
        SUPPORTED_READERS
            .iter()
            .map(|&(vendor, product)| Self::vendor(vendor).with_product(product))
            .collect()
    }

    /// Check whether a vendor/product pair passes this filter.
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id.is_none_or(|p| p == product_id)
    }
}

/// Descriptor of a HID device as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidDeviceInfo {
    /// USB vendor identifier.
    pub vendor_id: u16,

    /// USB product identifier.
    pub product_id: u16,

    /// Product name (e.g., "ACR122U PICC Interface").
    pub product_name: String,

    /// Platform path used to open the device.
    pub path: String,

    /// Optional device serial number.
    pub serial_number: Option<String>,

    /// Whether the device is currently opened by someone.
    pub opened: bool,
}

impl HidDeviceInfo {
    /// Create a new descriptor with required fields.
    pub fn new(vendor_id: u16, product_id: u16, product_name: impl Into<String>) -> Self {
        let product_name = product_name.into();
        Self {
            vendor_id,
            product_id,
            path: format!("{vendor_id:04x}:{product_id:04x}"),
            product_name,
            serial_number: None,
            opened: false,
        }
    }

    /// Set the platform path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the serial number.
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Mark the device as opened.
    pub fn opened(mut self, opened: bool) -> Self {
        self.opened = opened;
        self
    }

    /// Check whether any of the filters matches this device.
    pub fn matches_any(&self, filters: &[DeviceFilter]) -> bool {
        filters
            .iter()
            .any(|f| f.matches(self.vendor_id, self.product_id))
    }
}

/// Raw input report received from a HID device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReport {
    /// Report identifier (0 for devices without numbered reports).
    pub report_id: u8,

    /// Report payload.
    pub data: Bytes,
}

impl InputReport {
    /// Create a new input report.
    pub fn new(report_id: u8, data: impl Into<Bytes>) -> Self {
        Self {
            report_id,
            data: data.into(),
        }
    }
}

/// Key-down event from the document-level keyboard stream.
///
/// `key` follows DOM naming: a single character for printable keys, or a
/// name such as `Enter`, `Shift` or `ArrowLeft`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key value.
    pub key: String,

    /// Control modifier held.
    pub ctrl: bool,

    /// Alt modifier held.
    pub alt: bool,

    /// Meta (command/windows) modifier held.
    pub meta: bool,
}

impl KeyEvent {
    /// Create an event for a key with no modifiers.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            alt: false,
            meta: false,
        }
    }

    /// Create an event for a printable character key.
    pub fn char(c: char) -> Self {
        Self::new(c.to_string())
    }

    /// Create an Enter key event.
    pub fn enter() -> Self {
        Self::new(ENTER_KEY)
    }

    /// Hold the control modifier.
    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    /// Hold the alt modifier.
    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    /// Hold the meta modifier.
    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Returns `true` if any of ctrl, alt or meta is held.
    pub fn has_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }

    /// Returns `true` for the Enter key.
    pub fn is_enter(&self) -> bool {
        self.key == ENTER_KEY
    }
}

/// Event reported by an ambient contactless scan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RadioEvent {
    /// A card was read; the serial is already framed.
    Reading {
        /// Serial number as formatted by the platform (e.g. `04:A2:3F:11`).
        serial_number: String,
    },

    /// The platform failed to read a card in the field.
    ReadingError {
        /// Error description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::constants::{ACR122U_PRODUCT_ID, ACS_VENDOR_ID};

    #[test]
    fn test_device_filter_matches() {
        let vendor_only = DeviceFilter::vendor(ACS_VENDOR_ID);
        assert!(vendor_only.matches(ACS_VENDOR_ID, 0x1234));
        assert!(!vendor_only.matches(0x1234, ACR122U_PRODUCT_ID));

        let exact = DeviceFilter::vendor(ACS_VENDOR_ID).with_product(ACR122U_PRODUCT_ID);
        assert!(exact.matches(ACS_VENDOR_ID, ACR122U_PRODUCT_ID));
        assert!(!exact.matches(ACS_VENDOR_ID, 0x223B + 1));
    }

    #[test]
    fn test_supported_reader_filters() {
        let filters = DeviceFilter::supported_readers();
        assert_eq!(filters.len(), SUPPORTED_READERS.len());

        let acr122u = HidDeviceInfo::new(ACS_VENDOR_ID, ACR122U_PRODUCT_ID, "ACR122U");
        assert!(acr122u.matches_any(&filters));

        let keyboard = HidDeviceInfo::new(0x046D, 0xC31C, "USB Keyboard");
        assert!(!keyboard.matches_any(&filters));
    }

    #[test]
    fn test_device_filter_deserialize_without_product() {
        let filter: DeviceFilter = serde_json::from_str(r#"{"vendor_id": 1839}"#).unwrap();
        assert_eq!(filter, DeviceFilter::vendor(0x072F));
    }

    #[test]
    fn test_hid_device_info_builder() {
        let info = HidDeviceInfo::new(ACS_VENDOR_ID, ACR122U_PRODUCT_ID, "ACR122U")
            .with_path("/dev/hidraw3")
            .with_serial_number("RR-0042")
            .opened(true);

        assert_eq!(info.path, "/dev/hidraw3");
        assert_eq!(info.serial_number.as_deref(), Some("RR-0042"));
        assert!(info.opened);
    }

    #[test]
    fn test_key_event_modifiers() {
        assert!(!KeyEvent::char('a').has_modifier());
        assert!(KeyEvent::char('c').with_ctrl().has_modifier());
        assert!(KeyEvent::char('x').with_alt().has_modifier());
        assert!(KeyEvent::char('v').with_meta().has_modifier());
        assert!(KeyEvent::enter().is_enter());
    }
}
