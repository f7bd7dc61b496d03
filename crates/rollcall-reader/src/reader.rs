//! Public card reader handle.

use crate::config::ReaderConfig;
use crate::session::{Command, SessionManager, Transport};
use rollcall_core::{ConnectionState, Identifier, ReaderError, ReaderSnapshot, Result, TransportKind};
use rollcall_hardware::{AnyHidBackend, AnyKeySource, AnyRadioScanner};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Handle to a running card reader.
///
/// The reader runs as a background task that owns the selected capability,
/// the open session and the framing engine. This handle sends it commands and
/// observes its published state.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockKeyboard;
/// use rollcall_reader::CardReader;
///
/// #[tokio::main]
/// async fn main() -> rollcall_core::Result<()> {
///     let (keyboard, handle) = MockKeyboard::new();
///     let reader = CardReader::builder().with_keyboard(keyboard).build()?;
///     let mut identifiers = reader.identifiers();
///
///     reader.connect().await?;
///     handle.type_line("04a23f11").await.unwrap();
///
///     let id = identifiers.recv().await.unwrap();
///     assert_eq!(id.as_str(), "04A23F11");
///
///     reader.shutdown().await
/// }
/// ```
#[derive(Debug)]
pub struct CardReader {
    commands: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<ReaderSnapshot>,
    identifier_tx: broadcast::Sender<Identifier>,
    task: JoinHandle<()>,
}

impl CardReader {
    /// Start building a reader.
    pub fn builder() -> CardReaderBuilder {
        CardReaderBuilder::default()
    }

    /// Current reader state.
    pub fn snapshot(&self) -> ReaderSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Last emitted identifier.
    pub fn identifier(&self) -> Option<Identifier> {
        self.snapshot_rx.borrow().identifier.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.snapshot_rx.borrow().connection_state
    }

    /// Last surfaced error.
    pub fn error(&self) -> Option<ReaderError> {
        self.snapshot_rx.borrow().error.clone()
    }

    /// Transport selected at build time.
    pub fn reader_type(&self) -> Option<TransportKind> {
        self.snapshot_rx.borrow().reader_type
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<ReaderSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Receive every emitted identifier, including repeats of the same card.
    pub fn identifiers(&self) -> broadcast::Receiver<Identifier> {
        self.identifier_tx.subscribe()
    }

    /// Open a session on the selected transport.
    ///
    /// Connecting while connected succeeds without opening anything.
    ///
    /// # Errors
    ///
    /// - `NoDeviceSelected` if the chooser was dismissed (not recorded in the
    ///   snapshot)
    /// - `PermissionDenied` or `DeviceUnavailable` if the platform refused
    /// - `Closed` if the reader task has stopped
    pub async fn connect(&self) -> Result<()> {
        self.request(Command::Connect).await?
    }

    /// Close the session. Once this returns no identifier from the closed
    /// session can be emitted.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the reader task has stopped.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(Command::Disconnect).await
    }

    /// Forget the last identifier and any partial input. The session stays
    /// open; a pending manual read is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the reader task has stopped.
    pub async fn clear_data(&self) -> Result<()> {
        self.request(Command::ClearData).await
    }

    /// Clear the last identifier and error and wait up to `timeout` for a
    /// card. Expiry records `ReadTimeout` in the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if no session is open.
    pub async fn manual_read(&self, timeout: Duration) -> Result<()> {
        self.request(|reply| Command::ManualRead { timeout, reply })
            .await?
    }

    /// Arm a manual read and wait for its outcome.
    ///
    /// # Errors
    ///
    /// - `ReadTimeout` if no card was presented in time
    /// - `NotConnected` if no session is open, or it closed while waiting
    /// - the session error if the device went away while waiting
    pub async fn read_identifier(&self, timeout: Duration) -> Result<Identifier> {
        let mut snapshots = self.subscribe();
        let mut identifiers = self.identifiers();

        self.manual_read(timeout).await?;

        // The session broadcasts an identifier before it publishes any state
        // change that follows it, so identifiers win over the snapshot.
        loop {
            tokio::select! {
                biased;

                received = identifiers.recv() => match received {
                    Ok(identifier) => return Ok(identifier),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Identifier receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(ReaderError::Closed),
                },
                changed = snapshots.changed() => {
                    changed.map_err(|_| ReaderError::Closed)?;

                    let (connected, error) = {
                        let snapshot = snapshots.borrow_and_update();
                        (snapshot.connection_state.is_connected(), snapshot.error.clone())
                    };
                    if let Some(error @ ReaderError::ReadTimeout { .. }) = error {
                        return Err(error);
                    }
                    if !connected {
                        if let Ok(identifier) = identifiers.try_recv() {
                            return Ok(identifier);
                        }
                        return Err(error.unwrap_or(ReaderError::NotConnected));
                    }
                }
            }
        }
    }

    /// Disconnect and stop the reader task.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the reader task had already stopped.
    pub async fn shutdown(self) -> Result<()> {
        self.request(Command::Shutdown).await?;
        self.task.await.map_err(|_| ReaderError::Closed)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| ReaderError::Closed)?;
        reply_rx.await.map_err(|_| ReaderError::Closed)
    }
}

/// Builder for [`CardReader`].
///
/// Hand it every capability the platform offers; the reader uses the first
/// available one in the order radio scan, HID, keyboard wedge.
#[derive(Debug, Default)]
pub struct CardReaderBuilder {
    config: ReaderConfig,
    hid: Option<AnyHidBackend>,
    radio: Option<AnyRadioScanner>,
    keyboard: Option<AnyKeySource>,
}

impl CardReaderBuilder {
    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Offer a HID backend.
    pub fn with_hid(mut self, backend: impl Into<AnyHidBackend>) -> Self {
        self.hid = Some(backend.into());
        self
    }

    /// Offer an ambient contactless scanner.
    pub fn with_radio(mut self, scanner: impl Into<AnyRadioScanner>) -> Self {
        self.radio = Some(scanner.into());
        self
    }

    /// Offer a keyboard event source.
    pub fn with_keyboard(mut self, source: impl Into<AnyKeySource>) -> Self {
        self.keyboard = Some(source.into());
        self
    }

    /// Select a transport and start the reader task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration does not validate
    /// - `NoTransport` if no capability was offered
    pub fn build(self) -> Result<CardReader> {
        self.config.validate()?;

        let transport = if let Some(radio) = self.radio {
            Transport::Radio(Some(radio))
        } else if let Some(hid) = self.hid {
            Transport::Hid(hid)
        } else if let Some(keyboard) = self.keyboard {
            Transport::Keyboard(Some(keyboard))
        } else {
            return Err(ReaderError::NoTransport);
        };

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(ReaderSnapshot {
            reader_type: Some(transport.kind()),
            ..ReaderSnapshot::default()
        });
        let (identifier_tx, _) = broadcast::channel(self.config.identifier_broadcast_capacity);

        let manager = SessionManager::new(
            self.config,
            transport,
            command_rx,
            snapshot_tx,
            identifier_tx.clone(),
        );
        let task = tokio::spawn(manager.run());

        Ok(CardReader {
            commands: command_tx,
            snapshot_rx,
            identifier_tx,
            task,
        })
    }
}
