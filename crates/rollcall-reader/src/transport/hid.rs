//! HID report adapter.
//!
//! Class-compliant readers deliver the UID as ASCII inside fixed-size input
//! reports, padded with zeros and optionally followed by CR or LF.

use super::{AdapterContext, AdapterEvent, read_error};
use crate::framing::RawInput;
use rollcall_core::constants::{CR, LF};
use rollcall_hardware::{AnyHidDevice, HidDevice};
use std::time::Duration;
use tracing::{debug, warn};

/// Decode the payload of one input report.
///
/// CR and LF become terminators, printable ASCII becomes characters,
/// everything else (padding, control and high bytes) is dropped.
///
/// # Examples
///
/// ```
/// use rollcall_reader::framing::RawInput;
/// use rollcall_reader::transport::hid::decode_report;
///
/// let inputs: Vec<_> = decode_report(b"3A\r\0\0").collect();
/// assert_eq!(
///     inputs,
///     vec![RawInput::Char('3'), RawInput::Char('A'), RawInput::Terminator]
/// );
/// ```
pub fn decode_report(data: &[u8]) -> impl Iterator<Item = RawInput> + '_ {
    data.iter().filter_map(|&byte| match byte {
        CR | LF => Some(RawInput::Terminator),
        0x20..=0x7E => Some(RawInput::Char(byte as char)),
        _ => None,
    })
}

/// Pump reports from `device` until the session is cancelled or the device
/// goes away. The device is closed and dropped on the way out.
pub(crate) async fn run(
    mut device: AnyHidDevice,
    ctx: AdapterContext,
    error_backoff: Duration,
) {
    debug!(session = ctx.session, device = %device.info().product_name, "HID adapter started");

    'pump: loop {
        let report = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => break,
            report = device.read_report() => report,
        };

        match report {
            Ok(report) => {
                for input in decode_report(&report.data) {
                    if !ctx.forward(AdapterEvent::Input(input)).await {
                        break 'pump;
                    }
                }
            }
            Err(e) if e.is_disconnect() => {
                warn!(session = ctx.session, error = %e, "HID device went away");
                ctx.fail(read_error(e), true).await;
                break;
            }
            Err(e) => {
                warn!(session = ctx.session, error = %e, "HID read failed");
                if !ctx.fail(read_error(e), false).await {
                    break;
                }

                tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => break,
                    () = tokio::time::sleep(error_backoff) => {}
                }
            }
        }
    }

    if let Err(e) = device.close().await {
        warn!(session = ctx.session, error = %e, "Failed to close HID device");
    }

    debug!(session = ctx.session, "HID adapter stopped");
}
