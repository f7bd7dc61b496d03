//! USB HID backend built on `hidapi`.
//!
//! Native platforms have no consent chooser: every attached device matching
//! the configured filters is treated as granted, and the "chooser" picks the
//! first match. Reads run on a dedicated thread and are forwarded into the
//! async world through a channel.

use crate::{
    HardwareError, Result,
    traits::{HidBackend, HidDevice},
    types::{DeviceFilter, HidDeviceInfo, InputReport},
};
use bytes::Bytes;
use hidapi::{DeviceInfo, HidApi};
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const REPORT_BUFFER_LEN: usize = 64;
const READ_POLL_MS: i32 = 100;

/// HID backend for readers attached over USB.
pub struct UsbHidBackend {
    api: Arc<Mutex<HidApi>>,
    filters: Vec<DeviceFilter>,
}

impl std::fmt::Debug for UsbHidBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbHidBackend")
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl UsbHidBackend {
    /// Initialize the HID library.
    ///
    /// `filters` bounds which devices count as granted.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform HID library cannot be initialized.
    pub fn new(filters: Vec<DeviceFilter>) -> Result<Self> {
        let api = HidApi::new().map_err(|e| HardwareError::other(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            filters,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HidApi> {
        self.api.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enumerate(&self, filters: &[DeviceFilter]) -> Result<Vec<HidDeviceInfo>> {
        let mut api = self.lock();
        api.refresh_devices()
            .map_err(|e| HardwareError::communication(e.to_string()))?;

        let devices: Vec<HidDeviceInfo> = api
            .device_list()
            .map(device_info)
            .filter(|d| d.matches_any(filters))
            .collect();

        debug!(count = devices.len(), "Enumerated HID devices");
        Ok(devices)
    }
}

fn device_info(d: &DeviceInfo) -> HidDeviceInfo {
    let info = HidDeviceInfo::new(
        d.vendor_id(),
        d.product_id(),
        d.product_string().unwrap_or("Unknown"),
    )
    .with_path(d.path().to_string_lossy().into_owned());

    match d.serial_number() {
        Some(serial) if !serial.is_empty() => info.with_serial_number(serial),
        _ => info,
    }
}

impl HidBackend for UsbHidBackend {
    type Device = UsbHidDevice;

    async fn request_device(&mut self, filters: &[DeviceFilter]) -> Result<Vec<HidDeviceInfo>> {
        Ok(self.enumerate(filters)?.into_iter().take(1).collect())
    }

    async fn authorized_devices(&mut self) -> Result<Vec<HidDeviceInfo>> {
        let filters = self.filters.clone();
        self.enumerate(&filters)
    }

    async fn open(&mut self, info: &HidDeviceInfo) -> Result<UsbHidDevice> {
        let path = CString::new(info.path.clone())
            .map_err(|_| HardwareError::invalid_data(format!("bad device path {}", info.path)))?;

        let device = self.lock().open_path(&path).map_err(|e| {
            let message = e.to_string();
            if message.to_lowercase().contains("permission") {
                HardwareError::permission_denied(info.path.clone())
            } else {
                HardwareError::open_failed(info.product_name.clone(), message)
            }
        })?;

        info!(device = %info.product_name, path = %info.path, "Opened HID device");

        let (report_tx, report_rx) = mpsc::channel(32);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let name = info.product_name.clone();

        let reader = std::thread::Builder::new()
            .name("rollcall-hid".to_string())
            .spawn(move || {
                let mut buf = [0u8; REPORT_BUFFER_LEN];
                while !thread_stop.load(Ordering::Relaxed) {
                    let item = match device.read_timeout(&mut buf, READ_POLL_MS) {
                        Ok(0) => continue,
                        Ok(n) => Ok(InputReport::new(0, Bytes::copy_from_slice(&buf[..n]))),
                        Err(e) => {
                            warn!(device = %name, error = %e, "HID read failed");
                            Err(HardwareError::disconnected(name.clone()))
                        }
                    };

                    let failed = item.is_err();
                    if report_tx.blocking_send(item).is_err() || failed {
                        break;
                    }
                }
            })?;

        Ok(UsbHidDevice {
            info: info.clone().opened(true),
            report_rx: Some(report_rx),
            stop,
            reader: Some(reader),
        })
    }
}

/// Device opened by [`UsbHidBackend`].
#[derive(Debug)]
pub struct UsbHidDevice {
    info: HidDeviceInfo,
    report_rx: Option<mpsc::Receiver<Result<InputReport>>>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl HidDevice for UsbHidDevice {
    fn info(&self) -> &HidDeviceInfo {
        &self.info
    }

    async fn read_report(&mut self) -> Result<InputReport> {
        let Some(rx) = &mut self.report_rx else {
            return Err(HardwareError::disconnected(self.info.product_name.clone()));
        };

        match rx.recv().await {
            Some(item) => item,
            None => Err(HardwareError::disconnected(self.info.product_name.clone())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        self.report_rx = None;

        if let Some(reader) = self.reader.take() {
            tokio::task::spawn_blocking(move || reader.join())
                .await
                .map_err(|e| HardwareError::other(e.to_string()))?
                .map_err(|_| HardwareError::other("HID reader thread panicked"))?;
            debug!(device = %self.info.product_name, "Closed HID device");
        }
        Ok(())
    }
}

impl Drop for UsbHidDevice {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
