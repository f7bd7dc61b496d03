//! Mock HID backend for testing and development.
//!
//! This module provides a simulated permission-gated HID platform: attached
//! devices, a scriptable chooser, a list of previously granted devices, and a
//! report channel into whichever device is currently open.

use crate::{
    HardwareError, Result,
    traits::{HidBackend, HidDevice},
    types::{DeviceFilter, HidDeviceInfo, InputReport},
};
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// What the simulated user does when the chooser is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChooserResponse {
    /// Pick the first attached device matching the filters.
    #[default]
    SelectFirst,

    /// Dismiss the chooser.
    Cancel,
}

#[derive(Debug, Default)]
struct MockHidState {
    attached: Vec<HidDeviceInfo>,
    authorized: Vec<String>,
    chooser: ChooserResponse,
    deny_permission: bool,
    open_failure: Option<String>,
    chooser_prompts: usize,
    open_count: usize,
    open_path: Option<String>,
    report_tx: Option<mpsc::Sender<InputReport>>,
}

#[derive(Debug, Clone, Default)]
struct SharedState(Arc<Mutex<MockHidState>>);

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, MockHidState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Mock HID backend.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockHid;
/// use rollcall_hardware::traits::{HidBackend, HidDevice};
/// use rollcall_hardware::types::{DeviceFilter, HidDeviceInfo};
///
/// #[tokio::main]
/// async fn main() -> rollcall_hardware::Result<()> {
///     let (mut backend, handle) = MockHid::new();
///     handle.attach(HidDeviceInfo::new(0x072F, 0x2200, "ACR122U"));
///
///     let chosen = backend.request_device(&DeviceFilter::supported_readers()).await?;
///     let mut device = backend.open(&chosen[0]).await?;
///
///     handle.send_bytes(b"3A4B5C6D\r").await?;
///     let report = device.read_report().await?;
///     assert_eq!(&report.data[..], b"3A4B5C6D\r");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockHid {
    state: SharedState,
}

impl MockHid {
    /// Create a new mock backend with no attached devices.
    ///
    /// Returns a tuple of (MockHid, MockHidHandle) where the handle controls
    /// the simulated platform.
    pub fn new() -> (Self, MockHidHandle) {
        let state = SharedState::default();
        let backend = Self {
            state: state.clone(),
        };
        (backend, MockHidHandle { state })
    }
}

impl HidBackend for MockHid {
    type Device = MockHidDevice;

    async fn request_device(&mut self, filters: &[DeviceFilter]) -> Result<Vec<HidDeviceInfo>> {
        let mut state = self.state.lock();
        state.chooser_prompts += 1;

        if state.deny_permission {
            return Err(HardwareError::permission_denied("HID device class"));
        }

        if state.chooser == ChooserResponse::Cancel {
            return Ok(Vec::new());
        }

        let Some(selected) = state
            .attached
            .iter()
            .find(|d| d.matches_any(filters))
            .cloned()
        else {
            return Ok(Vec::new());
        };

        if !state.authorized.contains(&selected.path) {
            state.authorized.push(selected.path.clone());
        }

        Ok(vec![selected])
    }

    async fn authorized_devices(&mut self) -> Result<Vec<HidDeviceInfo>> {
        let state = self.state.lock();
        Ok(state
            .attached
            .iter()
            .filter(|d| state.authorized.contains(&d.path))
            .map(|d| {
                let opened = state.open_path.as_deref() == Some(d.path.as_str());
                d.clone().opened(opened)
            })
            .collect())
    }

    async fn open(&mut self, device: &HidDeviceInfo) -> Result<MockHidDevice> {
        let mut state = self.state.lock();

        if state.deny_permission {
            return Err(HardwareError::permission_denied(device.path.clone()));
        }

        if let Some(message) = &state.open_failure {
            return Err(HardwareError::open_failed(
                device.product_name.clone(),
                message.clone(),
            ));
        }

        if !state.attached.iter().any(|d| d.path == device.path) {
            return Err(HardwareError::not_found(device.path.clone()));
        }

        let (report_tx, report_rx) = mpsc::channel(32);
        state.report_tx = Some(report_tx);
        state.open_path = Some(device.path.clone());
        state.open_count += 1;

        Ok(MockHidDevice {
            info: device.clone().opened(true),
            report_rx: Some(report_rx),
            state: self.state.clone(),
        })
    }
}

/// Device returned by [`MockHid::open`].
#[derive(Debug)]
pub struct MockHidDevice {
    info: HidDeviceInfo,
    report_rx: Option<mpsc::Receiver<InputReport>>,
    state: SharedState,
}

impl HidDevice for MockHidDevice {
    fn info(&self) -> &HidDeviceInfo {
        &self.info
    }

    async fn read_report(&mut self) -> Result<InputReport> {
        match &mut self.report_rx {
            Some(rx) => rx
                .recv()
                .await
                .ok_or_else(|| HardwareError::disconnected(self.info.product_name.clone())),
            None => Err(HardwareError::disconnected(self.info.product_name.clone())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.report_rx.take().is_none() {
            return Ok(());
        }

        let mut state = self.state.lock();
        if state.open_path.as_deref() == Some(self.info.path.as_str()) {
            state.open_path = None;
            state.report_tx = None;
        }
        Ok(())
    }
}

/// Handle for controlling a mock HID platform.
///
/// The handle can be cloned and shared across tasks; all clones control the
/// same platform.
#[derive(Debug, Clone)]
pub struct MockHidHandle {
    state: SharedState,
}

impl MockHidHandle {
    /// Plug a device in.
    pub fn attach(&self, device: HidDeviceInfo) {
        self.state.lock().attached.push(device);
    }

    /// Plug a device in and mark it as granted in an earlier session.
    pub fn attach_authorized(&self, device: HidDeviceInfo) {
        let mut state = self.state.lock();
        state.authorized.push(device.path.clone());
        state.attached.push(device);
    }

    /// Unplug a device. If it is open, its report channel closes.
    pub fn unplug(&self, path: &str) {
        let mut state = self.state.lock();
        state.attached.retain(|d| d.path != path);
        if state.open_path.as_deref() == Some(path) {
            state.open_path = None;
            state.report_tx = None;
        }
    }

    /// Script the chooser outcome.
    pub fn set_chooser(&self, response: ChooserResponse) {
        self.state.lock().chooser = response;
    }

    /// Deny (or restore) platform access to HID devices.
    pub fn deny_permission(&self, deny: bool) {
        self.state.lock().deny_permission = deny;
    }

    /// Make every open attempt fail with `message`, or succeed again with `None`.
    pub fn fail_open(&self, message: Option<&str>) {
        self.state.lock().open_failure = message.map(str::to_string);
    }

    /// Deliver an input report to the open device.
    ///
    /// # Errors
    ///
    /// Returns an error if no device is open.
    pub async fn send_report(&self, report: InputReport) -> Result<()> {
        let tx = self
            .state
            .lock()
            .report_tx
            .clone()
            .ok_or_else(|| HardwareError::disconnected("no open HID device"))?;

        tx.send(report)
            .await
            .map_err(|_| HardwareError::disconnected("HID report channel closed"))
    }

    /// Deliver `bytes` as a single report with id 0.
    ///
    /// # Errors
    ///
    /// Returns an error if no device is open.
    pub async fn send_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.send_report(InputReport::new(0, Bytes::copy_from_slice(bytes)))
            .await
    }

    /// Number of times the chooser was shown.
    pub fn chooser_prompts(&self) -> usize {
        self.state.lock().chooser_prompts
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// Whether a device is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().open_path.is_some()
    }
}
