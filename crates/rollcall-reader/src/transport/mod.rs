//! Transport adapters.
//!
//! Each adapter runs as a task owned by the open session. It pulls events
//! from one platform capability, translates them into [`RawInput`] (or a
//! ready [`Identifier`] for the ambient scanner), and forwards them to the
//! session manager over a single channel. Adapters never touch reader state
//! directly.
//!
//! [`RawInput`]: crate::framing::RawInput

pub mod hid;
pub mod keyboard;
pub mod radio;

use crate::framing::RawInput;
use rollcall_core::{Identifier, ReaderError};
use rollcall_hardware::{AnyKeySource, AnyRadioScanner, HardwareError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Something an adapter observed.
#[derive(Debug)]
pub(crate) enum AdapterEvent {
    /// Unframed input for the framing engine.
    Input(RawInput),

    /// Identifier framed by the platform.
    Framed(Identifier),

    /// Read failure. Fatal failures end the adapter.
    Failed { error: ReaderError, fatal: bool },
}

/// Adapter event tagged with the session it belongs to.
#[derive(Debug)]
pub(crate) struct SessionEvent {
    pub session: u64,
    pub event: AdapterEvent,
}

/// Capability lent to an adapter task and handed back when it stops.
/// HID devices are closed by their adapter and reopened through the backend.
#[derive(Debug)]
pub(crate) enum Released {
    Hid,
    Radio(AnyRadioScanner),
    Keyboard(AnyKeySource),
}

/// Per-session plumbing shared by all adapters.
#[derive(Debug, Clone)]
pub(crate) struct AdapterContext {
    pub session: u64,
    pub events: mpsc::Sender<SessionEvent>,
    pub cancel: CancellationToken,
}

impl AdapterContext {
    /// Forward an event to the session manager.
    ///
    /// Returns `false` once the session is cancelled or the manager is gone;
    /// the adapter must stop then.
    pub async fn forward(&self, event: AdapterEvent) -> bool {
        let event = SessionEvent {
            session: self.session,
            event,
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    /// Report a read failure.
    pub async fn fail(&self, error: ReaderError, fatal: bool) -> bool {
        self.forward(AdapterEvent::Failed { error, fatal }).await
    }
}

/// Map a capability failure during connect or reopen.
pub(crate) fn lifecycle_error(error: HardwareError) -> ReaderError {
    match error {
        HardwareError::PermissionDenied { device } => ReaderError::permission_denied(device),
        other => ReaderError::device_unavailable(other.to_string()),
    }
}

/// Map a capability failure while reading.
pub(crate) fn read_error(error: HardwareError) -> ReaderError {
    ReaderError::transport(error.to_string())
}
