//! Constants for identifier framing and reader discovery.
//!
//! # Usage
//!
//! ```
//! use rollcall_core::constants::*;
//! use std::time::Duration;
//!
//! let debounce = Duration::from_millis(DEFAULT_DEBOUNCE_MS);
//! assert_eq!(debounce.as_millis(), 100);
//!
//! fn has_valid_length(uid: &str) -> bool {
//!     (MIN_IDENTIFIER_LENGTH..=MAX_IDENTIFIER_LENGTH).contains(&uid.len())
//! }
//! assert!(has_valid_length("04A23F11"));
//! ```

// ============================================================================
// Identifier Format
// ============================================================================

/// Minimum length of a normalized identifier, in hex digits.
///
/// Four UID bytes (the shortest ISO 14443 single-size UID) render as eight
/// hex digits.
pub const MIN_IDENTIFIER_LENGTH: usize = 8;

/// Maximum length of a normalized identifier, in hex digits.
///
/// Ten-byte triple-size UIDs render as twenty hex digits.
pub const MAX_IDENTIFIER_LENGTH: usize = 20;

/// Characters stripped from serial numbers reported by the ambient scanner.
///
/// Platforms report serials as `04:A2:3F:11`, `04-A2-3F-11` or space
/// separated byte pairs.
pub const SERIAL_SEPARATORS: &[char] = &[':', '-', ' ', '\t'];

// ============================================================================
// Framing
// ============================================================================

/// Silence after which a partially accumulated identifier is treated as
/// complete, in milliseconds.
///
/// Keyboard-wedge readers type a full UID in a single burst well under this
/// window, while a human typing stays above it between keystrokes.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Hard capacity of the input buffer, in characters.
///
/// Anything longer than this cannot become a valid identifier; the buffer is
/// discarded when it overflows.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 64;

/// Carriage return byte, treated as an end-of-identifier marker.
pub const CR: u8 = b'\r';

/// Line feed byte, treated as an end-of-identifier marker.
pub const LF: u8 = b'\n';

/// DOM-style key name of the terminator key sent by keyboard-wedge readers.
pub const ENTER_KEY: &str = "Enter";

// ============================================================================
// Reader Family
// ============================================================================

/// USB vendor identifier of Advanced Card Systems (ACS) readers.
pub const ACS_VENDOR_ID: u16 = 0x072F;

/// ACR122U contactless reader.
pub const ACR122U_PRODUCT_ID: u16 = 0x2200;

/// ACR1252U contactless reader.
pub const ACR1252U_PRODUCT_ID: u16 = 0x223B;

/// ACR1281U dual interface reader.
pub const ACR1281U_PRODUCT_ID: u16 = 0x2224;

/// Vendor/product pairs of the supported reader family.
pub const SUPPORTED_READERS: &[(u16, u16)] = &[
    (ACS_VENDOR_ID, ACR122U_PRODUCT_ID),
    (ACS_VENDOR_ID, ACR1252U_PRODUCT_ID),
    (ACS_VENDOR_ID, ACR1281U_PRODUCT_ID),
];

// ============================================================================
// Session Manager
// ============================================================================

/// Capacity of the internal adapter event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 100;

/// Capacity of the identifier broadcast channel.
///
/// Slow subscribers that fall further behind than this lose the oldest
/// identifiers (the snapshot always holds the latest one).
pub const DEFAULT_IDENTIFIER_BROADCAST_CAPACITY: usize = 32;

/// Delay before retrying after a non-fatal HID read error, in milliseconds.
pub const DEFAULT_REPORT_ERROR_BACKOFF_MS: u64 = 100;

/// Default bounded wait used by `manual_read` callers, in milliseconds.
pub const DEFAULT_MANUAL_READ_TIMEOUT_MS: u64 = 5000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_length_bounds() {
        assert!(MIN_IDENTIFIER_LENGTH < MAX_IDENTIFIER_LENGTH);
        assert!(DEFAULT_MAX_BUFFER_LEN >= MAX_IDENTIFIER_LENGTH);
    }

    #[test]
    fn test_supported_readers_share_vendor() {
        assert!(
            SUPPORTED_READERS
                .iter()
                .all(|(vendor, _)| *vendor == ACS_VENDOR_ID)
        );
    }
}
