//! Mock ambient contactless scanner for testing and development.

use crate::{HardwareError, Result, traits::RadioScanner, types::RadioEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Mock ambient scanner.
///
/// Cards are "tapped" through a [`MockRadioHandle`]; readings are only
/// delivered while a scan is active.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockRadio;
/// use rollcall_hardware::traits::RadioScanner;
/// use rollcall_hardware::types::RadioEvent;
///
/// #[tokio::main]
/// async fn main() -> rollcall_hardware::Result<()> {
///     let (mut radio, handle) = MockRadio::new();
///     radio.scan().await?;
///
///     handle.tap("04:A2:3F:11").await?;
///     let event = radio.next_event().await?;
///     assert_eq!(
///         event,
///         RadioEvent::Reading { serial_number: "04:A2:3F:11".to_string() }
///     );
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockRadio {
    event_rx: mpsc::Receiver<RadioEvent>,
    scanning: Arc<AtomicBool>,
    deny_permission: Arc<AtomicBool>,
    scan_count: Arc<AtomicUsize>,
}

impl MockRadio {
    /// Create a new mock scanner.
    ///
    /// Returns a tuple of (MockRadio, MockRadioHandle) where the handle
    /// simulates cards entering the field.
    pub fn new() -> (Self, MockRadioHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let scanning = Arc::new(AtomicBool::new(false));
        let deny_permission = Arc::new(AtomicBool::new(false));
        let scan_count = Arc::new(AtomicUsize::new(0));

        let radio = Self {
            event_rx,
            scanning: scanning.clone(),
            deny_permission: deny_permission.clone(),
            scan_count: scan_count.clone(),
        };

        let handle = MockRadioHandle {
            event_tx,
            scanning,
            deny_permission,
            scan_count,
        };

        (radio, handle)
    }
}

impl RadioScanner for MockRadio {
    async fn scan(&mut self) -> Result<()> {
        if self.deny_permission.load(Ordering::SeqCst) {
            return Err(HardwareError::permission_denied("NFC radio"));
        }

        // Drop anything queued while the scan was not running
        while self.event_rx.try_recv().is_ok() {}

        self.scanning.store(true, Ordering::SeqCst);
        self.scan_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&mut self) -> Result<RadioEvent> {
        self.event_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("NFC radio"))
    }

    async fn stop(&mut self) -> Result<()> {
        self.scanning.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Handle for controlling a mock ambient scanner.
#[derive(Debug, Clone)]
pub struct MockRadioHandle {
    event_tx: mpsc::Sender<RadioEvent>,
    scanning: Arc<AtomicBool>,
    deny_permission: Arc<AtomicBool>,
    scan_count: Arc<AtomicUsize>,
}

impl MockRadioHandle {
    /// Bring a card with `serial_number` into the field.
    ///
    /// # Errors
    ///
    /// Returns an error if no scan is active or the scanner was dropped.
    pub async fn tap(&self, serial_number: &str) -> Result<()> {
        self.emit(RadioEvent::Reading {
            serial_number: serial_number.to_string(),
        })
        .await
    }

    /// Report a failed read.
    ///
    /// # Errors
    ///
    /// Returns an error if no scan is active or the scanner was dropped.
    pub async fn fail(&self, message: &str) -> Result<()> {
        self.emit(RadioEvent::ReadingError {
            message: message.to_string(),
        })
        .await
    }

    /// Deny (or restore) radio access for subsequent scans.
    pub fn deny_permission(&self, deny: bool) {
        self.deny_permission.store(deny, Ordering::SeqCst);
    }

    /// Whether a scan is currently active.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Number of scans started.
    pub fn scan_count(&self) -> usize {
        self.scan_count.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: RadioEvent) -> Result<()> {
        if !self.is_scanning() {
            return Err(HardwareError::unsupported("radio scan not active"));
        }

        self.event_tx
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("NFC radio"))
    }
}
