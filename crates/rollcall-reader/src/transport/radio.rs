//! Ambient scan adapter.
//!
//! The platform reports complete serial numbers, so readings bypass the
//! input buffer and the framing engine.

use super::{AdapterContext, AdapterEvent, read_error};
use rollcall_core::{Identifier, ReaderError, TransportKind};
use rollcall_hardware::{AnyRadioScanner, RadioEvent, RadioScanner};
use tracing::{debug, warn};

/// Pump scan events until the session is cancelled or the radio goes away.
/// The scan is stopped before the scanner is handed back.
pub(crate) async fn run(mut scanner: AnyRadioScanner, ctx: AdapterContext) -> AnyRadioScanner {
    debug!(session = ctx.session, "Radio adapter started");

    loop {
        let event = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            event = scanner.next_event() => event,
        };

        let forwarded = match event {
            Ok(RadioEvent::Reading { serial_number }) => {
                match Identifier::from_serial_number(&serial_number, TransportKind::Radio) {
                    Ok(identifier) => ctx.forward(AdapterEvent::Framed(identifier)).await,
                    Err(e) => {
                        debug!(serial = %serial_number, error = %e, "Discarding invalid serial");
                        true
                    }
                }
            }
            Ok(RadioEvent::ReadingError { message }) => {
                warn!(session = ctx.session, %message, "Radio reading failed");
                ctx.fail(ReaderError::transport(message), false).await
            }
            Ok(other) => {
                debug!(event = ?other, "Ignoring radio event");
                true
            }
            Err(e) => {
                warn!(session = ctx.session, error = %e, "Radio scan ended");
                ctx.fail(read_error(e), true).await;
                false
            }
        };

        if !forwarded {
            break;
        }
    }

    if let Err(e) = scanner.stop().await {
        warn!(session = ctx.session, error = %e, "Failed to stop radio scan");
    }

    debug!(session = ctx.session, "Radio adapter stopped");
    scanner
}
