//! Reader session manager.
//!
//! A single task owns every piece of mutable reader state: the selected
//! capability, the open session and its adapter task, the framing engine and
//! the manual-read deadline. [`CardReader`](crate::CardReader) handles talk to
//! it through a command channel; adapters talk to it through one event
//! channel. Published state flows out through a `watch` snapshot and an
//! identifier `broadcast`.

use crate::config::ReaderConfig;
use crate::framing::FramingEngine;
use crate::transport::{
    self, AdapterContext, AdapterEvent, Released, SessionEvent, lifecycle_error,
};
use rollcall_core::{ConnectionState, Identifier, ReaderError, ReaderSnapshot, Result, TransportKind};
use rollcall_hardware::{
    AnyHidBackend, AnyHidDevice, AnyKeySource, AnyRadioScanner, HidBackend, HidDeviceInfo,
    RadioScanner,
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Request from a [`CardReader`](crate::CardReader) handle.
#[derive(Debug)]
pub(crate) enum Command {
    Connect(oneshot::Sender<Result<()>>),
    Disconnect(oneshot::Sender<()>),
    ClearData(oneshot::Sender<()>),
    ManualRead {
        timeout: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown(oneshot::Sender<()>),
}

/// The capability selected at build time.
///
/// Radio and keyboard capabilities are lent to the adapter task while a
/// session is open; the HID backend stays here and only the opened device
/// is lent.
#[derive(Debug)]
pub(crate) enum Transport {
    Hid(AnyHidBackend),
    Radio(Option<AnyRadioScanner>),
    Keyboard(Option<AnyKeySource>),
}

impl Transport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Hid(_) => TransportKind::Hid,
            Self::Radio(_) => TransportKind::Radio,
            Self::Keyboard(_) => TransportKind::KeyboardWedge,
        }
    }
}

/// What a successful connect hands to the adapter.
enum Lease {
    Hid(AnyHidDevice),
    Radio(AnyRadioScanner),
    Keyboard(AnyKeySource),
}

/// An open session and the adapter task serving it.
struct ActiveSession {
    id: u64,
    device: Option<HidDeviceInfo>,
    cancel: CancellationToken,
    task: JoinHandle<Released>,
}

struct ManualRead {
    deadline: Instant,
    timeout: Duration,
}

pub(crate) struct SessionManager {
    config: ReaderConfig,
    transport: Transport,
    engine: FramingEngine,
    active: Option<ActiveSession>,
    next_session: u64,
    manual_read: Option<ManualRead>,
    last_emitted: Option<(String, Instant)>,
    commands: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    snapshot_tx: watch::Sender<ReaderSnapshot>,
    identifier_tx: broadcast::Sender<Identifier>,
}

impl SessionManager {
    pub fn new(
        config: ReaderConfig,
        transport: Transport,
        commands: mpsc::Receiver<Command>,
        snapshot_tx: watch::Sender<ReaderSnapshot>,
        identifier_tx: broadcast::Sender<Identifier>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let engine = FramingEngine::new(config.framing(), transport.kind());

        Self {
            config,
            transport,
            engine,
            active: None,
            next_session: 0,
            manual_read: None,
            last_emitted: None,
            commands,
            events_tx,
            events_rx,
            snapshot_tx,
            identifier_tx,
        }
    }

    /// Run until shut down or every handle is dropped.
    pub async fn run(mut self) {
        info!(transport = %self.transport.kind(), "Reader session manager started");

        if self.config.auto_reconnect {
            self.auto_reconnect().await;
        }

        loop {
            let framing_deadline = self.engine.deadline();
            let manual_deadline = self.manual_read.as_ref().map(|m| m.deadline);

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All reader handles dropped");
                        self.disconnect().await;
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
                () = sleep_until_opt(framing_deadline) => {
                    let now = Instant::now();
                    if let Some(identifier) = self.engine.tick(now, None) {
                        self.emit(identifier, now);
                    }
                }
                () = sleep_until_opt(manual_deadline) => self.expire_manual_read(),
            }
        }

        info!("Reader session manager stopped");
    }

    /// Returns `false` once the manager should stop.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect(reply) => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Disconnect(reply) => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::ClearData(reply) => {
                self.clear_data();
                let _ = reply.send(());
            }
            Command::ManualRead { timeout, reply } => {
                let _ = reply.send(self.arm_manual_read(timeout));
            }
            Command::Shutdown(reply) => {
                self.disconnect().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn connect(&mut self) -> Result<()> {
        if self.active.is_some() {
            debug!("Connect requested while connected");
            return Ok(());
        }

        self.snapshot_tx.send_modify(|s| {
            s.connection_state = ConnectionState::Requesting;
            s.error = None;
        });

        match self.acquire().await {
            Ok((lease, device)) => {
                self.open_session(lease, device);
                Ok(())
            }
            Err(e) if !e.is_user_facing() => {
                debug!(error = %e, "No device selected");
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Connect failed");
                self.snapshot_tx.send_modify(|s| {
                    s.connection_state = ConnectionState::Error;
                    s.error = Some(e.clone());
                });
                Err(e)
            }
        }
    }

    /// Ask the platform for the selected capability.
    async fn acquire(&mut self) -> Result<(Lease, Option<HidDeviceInfo>)> {
        match &mut self.transport {
            Transport::Hid(backend) => {
                let chosen = backend
                    .request_device(&self.config.device_filters)
                    .await
                    .map_err(lifecycle_error)?;

                let Some(info) = chosen.into_iter().next() else {
                    return Err(ReaderError::NoDeviceSelected);
                };

                let device = backend.open(&info).await.map_err(lifecycle_error)?;
                Ok((Lease::Hid(device), Some(info)))
            }
            Transport::Radio(slot) => {
                let mut scanner = slot
                    .take()
                    .ok_or_else(|| ReaderError::device_unavailable("radio scanner lost"))?;

                match scanner.scan().await {
                    Ok(()) => Ok((Lease::Radio(scanner), None)),
                    Err(e) => {
                        *slot = Some(scanner);
                        Err(lifecycle_error(e))
                    }
                }
            }
            Transport::Keyboard(slot) => {
                let source = slot
                    .take()
                    .ok_or_else(|| ReaderError::device_unavailable("keyboard source lost"))?;
                Ok((Lease::Keyboard(source), None))
            }
        }
    }

    /// Reopen a previously authorized HID reader without prompting.
    async fn auto_reconnect(&mut self) {
        let Transport::Hid(backend) = &mut self.transport else {
            return;
        };

        let authorized = match backend.authorized_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Failed to list authorized devices");
                return;
            }
        };

        let mut candidates = authorized
            .into_iter()
            .filter(|d| d.matches_any(&self.config.device_filters));

        let info = match (candidates.next(), candidates.next()) {
            (Some(info), None) if !info.opened => info,
            (Some(_), None) => {
                debug!("Authorized reader already opened elsewhere");
                return;
            }
            (None, _) => {
                debug!("No authorized reader");
                return;
            }
            (Some(_), Some(_)) => {
                debug!("Several authorized readers, waiting for an explicit connect");
                return;
            }
        };

        self.set_state(ConnectionState::Requesting);

        let Transport::Hid(backend) = &mut self.transport else {
            return;
        };

        match backend.open(&info).await {
            Ok(device) => {
                info!(device = %info.product_name, "Reopened authorized reader");
                self.open_session(Lease::Hid(device), Some(info));
            }
            Err(e) => {
                warn!(device = %info.product_name, error = %e, "Auto-reconnect failed");
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    fn open_session(&mut self, lease: Lease, device: Option<HidDeviceInfo>) {
        self.next_session += 1;
        let id = self.next_session;

        self.set_state(ConnectionState::Connected);

        let ctx = AdapterContext {
            session: id,
            events: self.events_tx.clone(),
            cancel: CancellationToken::new(),
        };
        let cancel = ctx.cancel.clone();

        let task = match lease {
            Lease::Hid(device) => {
                let backoff = self.config.report_error_backoff();
                tokio::spawn(async move {
                    transport::hid::run(device, ctx, backoff).await;
                    Released::Hid
                })
            }
            Lease::Radio(scanner) => tokio::spawn(async move {
                Released::Radio(transport::radio::run(scanner, ctx).await)
            }),
            Lease::Keyboard(source) => tokio::spawn(async move {
                Released::Keyboard(transport::keyboard::run(source, ctx).await)
            }),
        };

        info!(
            session = id,
            transport = %self.transport.kind(),
            device = device.as_ref().map(|d| d.product_name.as_str()).unwrap_or("-"),
            "Reader session opened"
        );

        self.active = Some(ActiveSession {
            id,
            device,
            cancel,
            task,
        });
        self.set_state(ConnectionState::Reading);
    }

    /// Stop the adapter, wait for it, and take back the lent capability.
    async fn close_session(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        match active.task.await {
            Ok(released) => self.restore(released),
            Err(e) => warn!(session = active.id, error = %e, "Adapter task failed"),
        }

        self.engine.reset();
        self.manual_read = None;

        debug!(
            session = active.id,
            device = active.device.as_ref().map(|d| d.product_name.as_str()).unwrap_or("-"),
            "Reader session closed"
        );
    }

    fn restore(&mut self, released: Released) {
        match (released, &mut self.transport) {
            (Released::Radio(scanner), Transport::Radio(slot)) => *slot = Some(scanner),
            (Released::Keyboard(source), Transport::Keyboard(slot)) => *slot = Some(source),
            // Closed by the adapter; the backend can reopen it.
            (Released::Hid, _) => {}
            (released, _) => warn!(?released, "Released capability does not match transport"),
        }
    }

    async fn disconnect(&mut self) {
        let state = self.snapshot_tx.borrow().connection_state;
        if self.active.is_none() && state == ConnectionState::Disconnected {
            return;
        }

        self.close_session().await;
        self.set_state(ConnectionState::Disconnected);
        info!("Reader disconnected");
    }

    fn clear_data(&mut self) {
        self.engine.reset();
        self.manual_read = None;
        self.last_emitted = None;
        self.snapshot_tx.send_modify(|s| s.identifier = None);
        debug!("Reader data cleared");
    }

    fn arm_manual_read(&mut self, timeout: Duration) -> Result<()> {
        if self.active.is_none() {
            return Err(ReaderError::NotConnected);
        }

        self.manual_read = Some(ManualRead {
            deadline: Instant::now() + timeout,
            timeout,
        });
        self.snapshot_tx.send_modify(|s| {
            s.identifier = None;
            s.error = None;
        });

        debug!(timeout_ms = timeout.as_millis() as u64, "Manual read armed");
        Ok(())
    }

    fn expire_manual_read(&mut self) {
        let Some(manual) = self.manual_read.take() else {
            return;
        };

        let timeout_ms = manual.timeout.as_millis() as u64;
        info!(timeout_ms, "Manual read timed out");
        self.snapshot_tx
            .send_modify(|s| s.error = Some(ReaderError::read_timeout(timeout_ms)));
    }

    async fn handle_event(&mut self, SessionEvent { session, event }: SessionEvent) {
        if self.active.as_ref().is_none_or(|active| active.id != session) {
            debug!(session, "Dropping event from a closed session");
            return;
        }

        match event {
            AdapterEvent::Input(input) => {
                let now = Instant::now();
                if let Some(identifier) = self.engine.tick(now, Some(input)) {
                    self.emit(identifier, now);
                }
            }
            AdapterEvent::Framed(identifier) => self.emit(identifier, Instant::now()),
            AdapterEvent::Failed { error, fatal: false } => {
                self.snapshot_tx.send_modify(|s| s.error = Some(error));
            }
            AdapterEvent::Failed { error, fatal: true } => {
                warn!(session, error = %error, "Reader session lost");
                self.close_session().await;
                self.snapshot_tx.send_modify(|s| {
                    s.connection_state = ConnectionState::Error;
                    s.error = Some(error);
                });
            }
        }
    }

    fn emit(&mut self, identifier: Identifier, now: Instant) {
        if let (Some(interval), Some((last, at))) =
            (self.config.min_reemit_interval(), &self.last_emitted)
        {
            if last == identifier.as_str() && now.duration_since(*at) < interval {
                debug!(identifier = %identifier, "Suppressing repeated read");
                return;
            }
        }

        self.last_emitted = Some((identifier.as_str().to_string(), now));
        self.manual_read = None;

        info!(identifier = %identifier, source = %identifier.source(), "Card read");

        // Broadcast first: readers watching both channels must see the card
        // before any state change that follows it. No subscribers is fine.
        let _ = self.identifier_tx.send(identifier.clone());
        self.snapshot_tx.send_modify(|s| {
            s.identifier = Some(identifier);
            s.error = None;
        });
    }

    fn set_state(&self, state: ConnectionState) {
        self.snapshot_tx.send_if_modified(|s| {
            if s.connection_state == state {
                return false;
            }
            s.connection_state = state;
            true
        });
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
