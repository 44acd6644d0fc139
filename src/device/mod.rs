//! Device layer: the registration table and the hardware boundary.
//!
//! The dispatch core never knows what a method does; this module supplies
//! the table of control operations and the context they run against.
//! Hardware-touching concerns stay behind two narrow traits -
//! [`VideoControl`] for the video pipeline daemon and [`UsbGadget`] for
//! the USB gadget stack - plus [`Updater`] for the OTA machinery.
//! Simulated implementations for development and tests live in [`sim`].

mod methods;
pub mod sim;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventSender;
use crate::handler::MethodError;
use crate::state::ConfigStore;

pub use methods::{register_control_methods, WakeOnLanParams};

/// EDID programmed into the video input when the client asks for a
/// restore, advertising a generic 1080p display.
pub const DEFAULT_EDID: &str = "00ffffffffffff0052620188008888881c150103800000780a0dc9a05747982712484c00000001010101010101010101010101010101023a801871382d40582c4500c48e2100001e011d007251d01e206e285500c48e2100001e000000fc00543734392d6648443732300a20000000fd00147801ff1d000a202020202020017b";

/// A failure reported by a device backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DeviceError(pub String);

impl DeviceError {
    /// Create a backend error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<DeviceError> for MethodError {
    fn from(e: DeviceError) -> Self {
        MethodError::new(e.0)
    }
}

/// Boundary to the video pipeline daemon.
pub trait VideoControl: Send + Sync {
    /// Apply a stream quality factor in `(0, 1]`.
    fn set_quality_factor(&self, factor: f64) -> Result<(), DeviceError>;

    /// Currently programmed EDID, as a hex string.
    fn edid(&self) -> Result<String, DeviceError>;

    /// Program a new EDID.
    fn set_edid(&self, edid: &str) -> Result<(), DeviceError>;
}

/// Boundary to the USB gadget stack (HID injection, mass storage,
/// emulation bind state).
pub trait UsbGadget: Send + Sync {
    /// Inject a HID keyboard report.
    fn keyboard_report(&self, modifier: u8, keys: &[u8]) -> Result<(), DeviceError>;

    /// Inject an absolute pointer report.
    fn abs_mouse_report(&self, x: i64, y: i64, buttons: u8) -> Result<(), DeviceError>;

    /// Inject a wheel report.
    fn wheel_report(&self, delta: i8) -> Result<(), DeviceError>;

    /// Whether the gadget is bound to the USB device controller.
    fn emulation_enabled(&self) -> Result<bool, DeviceError>;

    /// Bind or unbind the gadget.
    fn set_emulation_enabled(&self, enabled: bool) -> Result<(), DeviceError>;

    /// Whether mass storage is exposed as a CD-ROM drive.
    fn mass_storage_cdrom(&self) -> Result<bool, DeviceError>;

    /// Switch mass storage between CD-ROM and plain file modes.
    fn set_mass_storage_cdrom(&self, cdrom: bool) -> Result<(), DeviceError>;
}

/// Version information reported by [`Updater::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateStatus {
    /// Version currently running.
    pub local_version: String,
    /// Newest version offered on the selected channel.
    pub remote_version: String,
    /// Whether the remote version is newer.
    pub update_available: bool,
}

/// Boundary to the OTA update machinery.
pub trait Updater: Send + Sync {
    /// Check the update channel.
    fn status(&self, device_id: &str, include_pre_release: bool)
        -> Result<UpdateStatus, DeviceError>;

    /// Download and apply an update, reporting progress as `otaState`
    /// events. Runs on a detached task, never inside a handler call.
    fn apply(
        &self,
        device_id: &str,
        include_pre_release: bool,
        events: &EventSender,
    ) -> Result<(), DeviceError>;
}

/// Context passed to every control-method handler call.
///
/// Replaces ambient globals: everything a handler may consult - the
/// persisted config, the device backends, the event path - is reachable
/// from here, and each piece is individually safe for concurrent
/// sessions plus background work.
pub struct DeviceContext {
    /// Unique appliance identifier.
    pub device_id: String,
    /// Persisted configuration.
    pub config: ConfigStore,
    /// Video pipeline boundary.
    pub video: Arc<dyn VideoControl>,
    /// USB gadget boundary.
    pub usb: Arc<dyn UsbGadget>,
    /// OTA boundary.
    pub updater: Arc<dyn Updater>,
    /// Outbound event path.
    pub events: EventSender,
}

impl DeviceContext {
    /// Assemble a context from its parts.
    pub fn new(
        device_id: impl Into<String>,
        config: ConfigStore,
        video: Arc<dyn VideoControl>,
        usb: Arc<dyn UsbGadget>,
        updater: Arc<dyn Updater>,
        events: EventSender,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            config,
            video,
            usb,
            updater,
            events,
        }
    }
}
