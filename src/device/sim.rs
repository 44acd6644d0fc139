//! Simulated device backends.
//!
//! Stand-ins for the video pipeline daemon, the USB gadget stack and the
//! OTA machinery, used by tests and by the demo server. They record what
//! was asked of them so assertions can inspect it, and can be flipped
//! offline to exercise error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::json;

use crate::events::EventSender;

use super::{DeviceError, UpdateStatus, Updater, UsbGadget, VideoControl, DEFAULT_EDID};

/// In-memory [`VideoControl`].
pub struct SimVideoControl {
    state: Mutex<VideoState>,
}

struct VideoState {
    edid: String,
    quality_factor: f64,
}

impl SimVideoControl {
    /// Backend with the default EDID and full quality.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VideoState {
                edid: DEFAULT_EDID.to_string(),
                quality_factor: 1.0,
            }),
        }
    }

    /// The quality factor last applied.
    pub fn quality_factor(&self) -> f64 {
        self.lock().quality_factor
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VideoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimVideoControl {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoControl for SimVideoControl {
    fn set_quality_factor(&self, factor: f64) -> Result<(), DeviceError> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(DeviceError::new(format!(
                "quality factor out of range: {factor}"
            )));
        }
        self.lock().quality_factor = factor;
        Ok(())
    }

    fn edid(&self) -> Result<String, DeviceError> {
        Ok(self.lock().edid.clone())
    }

    fn set_edid(&self, edid: &str) -> Result<(), DeviceError> {
        self.lock().edid = edid.to_string();
        Ok(())
    }
}

/// One HID report recorded by [`SimUsbGadget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReport {
    /// Keyboard report.
    Keyboard {
        /// Modifier bitmap.
        modifier: u8,
        /// Pressed key codes.
        keys: Vec<u8>,
    },
    /// Absolute pointer report.
    AbsMouse {
        /// X position.
        x: i64,
        /// Y position.
        y: i64,
        /// Button bitmap.
        buttons: u8,
    },
    /// Wheel report.
    Wheel {
        /// Signed wheel delta.
        delta: i8,
    },
}

/// In-memory [`UsbGadget`] recording every injected report.
pub struct SimUsbGadget {
    reports: Mutex<Vec<InputReport>>,
    emulation: AtomicBool,
    cdrom: AtomicBool,
    offline: AtomicBool,
}

impl SimUsbGadget {
    /// Gadget bound and in file mode.
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            emulation: AtomicBool::new(true),
            cdrom: AtomicBool::new(false),
            offline: AtomicBool::new(false),
        }
    }

    /// All reports injected so far.
    pub fn reports(&self) -> Vec<InputReport> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// When offline, every operation fails; exercises handler error
    /// propagation.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), DeviceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DeviceError::new("usb gadget offline"));
        }
        Ok(())
    }

    fn record(&self, report: InputReport) -> Result<(), DeviceError> {
        self.check_online()?;
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(report);
        Ok(())
    }
}

impl Default for SimUsbGadget {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbGadget for SimUsbGadget {
    fn keyboard_report(&self, modifier: u8, keys: &[u8]) -> Result<(), DeviceError> {
        self.record(InputReport::Keyboard {
            modifier,
            keys: keys.to_vec(),
        })
    }

    fn abs_mouse_report(&self, x: i64, y: i64, buttons: u8) -> Result<(), DeviceError> {
        self.record(InputReport::AbsMouse { x, y, buttons })
    }

    fn wheel_report(&self, delta: i8) -> Result<(), DeviceError> {
        self.record(InputReport::Wheel { delta })
    }

    fn emulation_enabled(&self) -> Result<bool, DeviceError> {
        self.check_online()?;
        Ok(self.emulation.load(Ordering::SeqCst))
    }

    fn set_emulation_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.check_online()?;
        self.emulation.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn mass_storage_cdrom(&self) -> Result<bool, DeviceError> {
        self.check_online()?;
        Ok(self.cdrom.load(Ordering::SeqCst))
    }

    fn set_mass_storage_cdrom(&self, cdrom: bool) -> Result<(), DeviceError> {
        self.check_online()?;
        self.cdrom.store(cdrom, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory [`Updater`] with fixed local/remote versions.
pub struct SimUpdater {
    local_version: String,
    remote_version: String,
}

impl SimUpdater {
    /// Updater reporting the given versions.
    pub fn new(local_version: impl Into<String>, remote_version: impl Into<String>) -> Self {
        Self {
            local_version: local_version.into(),
            remote_version: remote_version.into(),
        }
    }
}

impl Updater for SimUpdater {
    fn status(
        &self,
        _device_id: &str,
        _include_pre_release: bool,
    ) -> Result<UpdateStatus, DeviceError> {
        Ok(UpdateStatus {
            local_version: self.local_version.clone(),
            remote_version: self.remote_version.clone(),
            update_available: self.local_version != self.remote_version,
        })
    }

    fn apply(
        &self,
        _device_id: &str,
        _include_pre_release: bool,
        events: &EventSender,
    ) -> Result<(), DeviceError> {
        if self.local_version == self.remote_version {
            return Err(DeviceError::new("already up to date"));
        }

        events.emit(
            "otaState",
            &json!({
                "updating": true,
                "targetVersion": self.remote_version,
            }),
        );
        events.emit(
            "otaState",
            &json!({
                "updating": false,
                "installedVersion": self.remote_version,
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_records_quality_factor() {
        let video = SimVideoControl::new();
        video.set_quality_factor(0.25).unwrap();
        assert_eq!(video.quality_factor(), 0.25);
    }

    #[test]
    fn test_video_rejects_out_of_range_factor() {
        let video = SimVideoControl::new();
        assert!(video.set_quality_factor(1.5).is_err());
        assert!(video.set_quality_factor(-0.1).is_err());
    }

    #[test]
    fn test_gadget_records_reports_in_order() {
        let usb = SimUsbGadget::new();
        usb.keyboard_report(0, &[4]).unwrap();
        usb.wheel_report(-1).unwrap();

        assert_eq!(
            usb.reports(),
            vec![
                InputReport::Keyboard {
                    modifier: 0,
                    keys: vec![4]
                },
                InputReport::Wheel { delta: -1 },
            ]
        );
    }

    #[test]
    fn test_offline_gadget_fails_everything() {
        let usb = SimUsbGadget::new();
        usb.set_offline(true);

        assert!(usb.keyboard_report(0, &[]).is_err());
        assert!(usb.emulation_enabled().is_err());
        assert!(usb.set_mass_storage_cdrom(true).is_err());
    }

    #[test]
    fn test_updater_status_reflects_versions() {
        let updater = SimUpdater::new("1.0.0", "1.0.0");
        let status = updater.status("id", false).unwrap();
        assert!(!status.update_available);
    }

    #[test]
    fn test_apply_without_update_is_an_error() {
        let updater = SimUpdater::new("1.0.0", "1.0.0");
        let events = EventSender::new();
        assert!(updater.apply("id", false, &events).is_err());
    }
}
