//! Reader configuration.

use crate::framing::FramingConfig;
use rollcall_core::constants::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_IDENTIFIER_BROADCAST_CAPACITY,
    DEFAULT_MAX_BUFFER_LEN, DEFAULT_REPORT_ERROR_BACKOFF_MS, MAX_IDENTIFIER_LENGTH,
};
use rollcall_core::{ReaderError, Result};
use rollcall_hardware::DeviceFilter;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`CardReader`](crate::CardReader).
///
/// All durations are integer milliseconds so the struct maps directly onto a
/// JSON file. Missing fields take their default.
///
/// # Examples
///
/// ```
/// use rollcall_reader::ReaderConfig;
///
/// let config = ReaderConfig::from_json(r#"{ "debounce_ms": 150 }"#).unwrap();
/// assert_eq!(config.debounce_ms, 150);
/// assert!(config.auto_reconnect);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Silence that completes an identifier without a terminator.
    pub debounce_ms: u64,

    /// Maximum characters accumulated before the input is discarded.
    pub max_buffer_len: usize,

    /// Suppress an identifier equal to the previous one if it arrives within
    /// this interval. `None` emits every read.
    pub min_reemit_interval_ms: Option<u64>,

    /// Reopen a previously authorized HID reader at start-up.
    pub auto_reconnect: bool,

    /// Devices offered by the HID chooser and eligible for auto-reconnect.
    pub device_filters: Vec<DeviceFilter>,

    /// Capacity of the channel from transport adapters to the session.
    pub event_channel_capacity: usize,

    /// Capacity of the identifier broadcast; slow subscribers lag past it.
    pub identifier_broadcast_capacity: usize,

    /// Pause after a non-fatal HID read error before reading again.
    pub report_error_backoff_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            min_reemit_interval_ms: None,
            auto_reconnect: true,
            device_filters: DeviceFilter::supported_readers(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            identifier_broadcast_capacity: DEFAULT_IDENTIFIER_BROADCAST_CAPACITY,
            report_error_backoff_ms: DEFAULT_REPORT_ERROR_BACKOFF_MS,
        }
    }
}

impl ReaderConfig {
    /// Parse a JSON document and validate it.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::InvalidConfig` if the document does not parse or
    /// fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ReaderError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the reader cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(ReaderError::invalid_config("debounce_ms must be positive"));
        }

        if self.max_buffer_len < MAX_IDENTIFIER_LENGTH {
            return Err(ReaderError::invalid_config(format!(
                "max_buffer_len must be at least {MAX_IDENTIFIER_LENGTH}"
            )));
        }

        if self.device_filters.is_empty() {
            return Err(ReaderError::invalid_config("device_filters must not be empty"));
        }

        if self.event_channel_capacity == 0 || self.identifier_broadcast_capacity == 0 {
            return Err(ReaderError::invalid_config("channel capacities must be positive"));
        }

        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn min_reemit_interval(&self) -> Option<Duration> {
        self.min_reemit_interval_ms.map(Duration::from_millis)
    }

    pub fn report_error_backoff(&self) -> Duration {
        Duration::from_millis(self.report_error_backoff_ms)
    }

    /// Framing parameters derived from this configuration.
    pub fn framing(&self) -> FramingConfig {
        FramingConfig {
            debounce: self.debounce(),
            max_buffer_len: self.max_buffer_len,
        }
    }
}
