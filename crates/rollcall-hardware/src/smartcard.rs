//! Ambient contactless scanner built on PC/SC.
//!
//! A polling thread watches every PC/SC reader. When a card enters the field
//! its UID is fetched with the `GET DATA` pseudo-APDU and reported as a
//! colon-separated serial number.

use crate::{HardwareError, Result, traits::RadioScanner, types::RadioEvent};
use pcsc::{Context, Protocols, Scope, ShareMode};
use std::collections::HashSet;
use std::ffi::CString;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// PC/SC pseudo-APDU returning the card UID.
const GET_UID_APDU: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Ambient scanner over all PC/SC readers.
#[derive(Debug, Default)]
pub struct PcscScanner {
    event_rx: Option<mpsc::Receiver<RadioEvent>>,
    stop: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
}

impl PcscScanner {
    /// Create an idle scanner.
    pub fn new() -> Self {
        Self::default()
    }
}

fn map_pcsc_error(e: pcsc::Error) -> HardwareError {
    match e {
        pcsc::Error::NoService | pcsc::Error::ServiceStopped => {
            HardwareError::not_found("PC/SC service")
        }
        pcsc::Error::NoReadersAvailable | pcsc::Error::UnknownReader => {
            HardwareError::not_found("PC/SC reader")
        }
        pcsc::Error::SharingViolation => HardwareError::permission_denied("PC/SC reader"),
        other => HardwareError::communication(other.to_string()),
    }
}

/// Format UID bytes as `04:a2:3f:11`.
fn format_serial(uid: &[u8]) -> String {
    uid.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn read_uid(ctx: &Context, reader: &CString) -> std::result::Result<Option<String>, String> {
    let card = match ctx.connect(reader, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(pcsc::Error::NoSmartcard) | Err(pcsc::Error::RemovedCard) => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };

    let mut buf = [0u8; pcsc::MAX_BUFFER_SIZE];
    let response = card.transmit(&GET_UID_APDU, &mut buf).map_err(|e| e.to_string())?;

    match response {
        [uid @ .., 0x90, 0x00] if !uid.is_empty() => Ok(Some(format_serial(uid))),
        [.., sw1, sw2] => Err(format!("GET UID failed with status {sw1:02X}{sw2:02X}")),
        _ => Err("empty GET UID response".to_string()),
    }
}

fn poll_loop(ctx: Context, stop: Arc<AtomicBool>, event_tx: mpsc::Sender<RadioEvent>) {
    let mut present: HashSet<CString> = HashSet::new();

    while !stop.load(Ordering::Relaxed) {
        let readers = match ctx.list_readers_owned() {
            Ok(readers) => readers,
            Err(pcsc::Error::NoReadersAvailable) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "PC/SC reader enumeration failed");
                break;
            }
        };

        present.retain(|r| readers.contains(r));

        for reader in &readers {
            let event = match read_uid(&ctx, reader) {
                Ok(Some(serial_number)) => {
                    if !present.insert(reader.clone()) {
                        continue;
                    }
                    debug!(reader = ?reader, "Card entered field");
                    RadioEvent::Reading { serial_number }
                }
                Ok(None) => {
                    present.remove(reader);
                    continue;
                }
                Err(message) => {
                    if !present.insert(reader.clone()) {
                        continue;
                    }
                    RadioEvent::ReadingError { message }
                }
            };

            if event_tx.blocking_send(event).is_err() {
                return;
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

impl RadioScanner for PcscScanner {
    async fn scan(&mut self) -> Result<()> {
        if self.poller.is_some() {
            return Ok(());
        }

        let ctx = tokio::task::spawn_blocking(|| Context::establish(Scope::User))
            .await
            .map_err(|e| HardwareError::other(e.to_string()))?
            .map_err(map_pcsc_error)?;

        let (event_tx, event_rx) = mpsc::channel(32);
        self.stop = Arc::new(AtomicBool::new(false));
        let stop = self.stop.clone();

        let poller = std::thread::Builder::new()
            .name("rollcall-pcsc".to_string())
            .spawn(move || poll_loop(ctx, stop, event_tx))?;

        self.event_rx = Some(event_rx);
        self.poller = Some(poller);
        info!("PC/SC scan started");
        Ok(())
    }

    async fn next_event(&mut self) -> Result<RadioEvent> {
        let Some(rx) = &mut self.event_rx else {
            return Err(HardwareError::disconnected("PC/SC scan not running"));
        };

        rx.recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("PC/SC reader"))
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        self.event_rx = None;

        if let Some(poller) = self.poller.take() {
            tokio::task::spawn_blocking(move || poller.join())
                .await
                .map_err(|e| HardwareError::other(e.to_string()))?
                .map_err(|_| HardwareError::other("PC/SC poller thread panicked"))?;
            info!("PC/SC scan stopped");
        }
        Ok(())
    }
}

impl Drop for PcscScanner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_serial() {
        assert_eq!(format_serial(&[0x04, 0xA2, 0x3F, 0x11]), "04:a2:3f:11");
        assert_eq!(format_serial(&[]), "");
    }

    #[test]
    fn test_map_pcsc_error() {
        assert!(matches!(
            map_pcsc_error(pcsc::Error::NoService),
            HardwareError::NotFound { .. }
        ));
        assert!(matches!(
            map_pcsc_error(pcsc::Error::SharingViolation),
            HardwareError::PermissionDenied { .. }
        ));
    }
}
