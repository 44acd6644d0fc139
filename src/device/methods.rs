//! Control-method handlers and the registration table.
//!
//! Every operation the appliance exposes is one entry in
//! [`register_control_methods`]; adding an operation means adding one
//! handler function and one `register` line, nothing in the dispatcher
//! changes.

use std::net::UdpSocket;

use serde::{Deserialize, Serialize};

use crate::handler::{MethodError, MethodRegistry};
use crate::record_param;
use crate::state::WakeOnLanDevice;

use super::{DeviceContext, UpdateStatus, DEFAULT_EDID};

/// Structured parameter of `setWakeOnLanDevices`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WakeOnLanParams {
    /// Replacement device list.
    pub devices: Vec<WakeOnLanDevice>,
}

record_param!(WakeOnLanParams);

/// Build the full registration table of control operations.
pub fn register_control_methods(table: &mut MethodRegistry<DeviceContext>) {
    table.register("ping", [], ping);
    table.register("getDeviceID", [], get_device_id);

    table.register("keyboardReport", ["modifier", "keys"], keyboard_report);
    table.register("absMouseReport", ["x", "y", "buttons"], abs_mouse_report);
    table.register("wheelReport", ["wheelY"], wheel_report);

    table.register("getStreamQualityFactor", [], get_stream_quality_factor);
    table.register("setStreamQualityFactor", ["factor"], set_stream_quality_factor);
    table.register("getEDID", [], get_edid);
    table.register("setEDID", ["edid"], set_edid);

    table.register("getAutoUpdateState", [], get_auto_update_state);
    table.register("setAutoUpdateState", ["enabled"], set_auto_update_state);
    table.register("getDevChannelState", [], get_dev_channel_state);
    table.register("setDevChannelState", ["enabled"], set_dev_channel_state);
    table.register("getUpdateStatus", [], get_update_status);
    table.register("tryUpdate", [], try_update);

    table.register("getUsbEmulationState", [], get_usb_emulation_state);
    table.register("setUsbEmulationState", ["enabled"], set_usb_emulation_state);
    table.register("getMassStorageMode", [], get_mass_storage_mode);
    table.register("setMassStorageMode", ["mode"], set_mass_storage_mode);

    table.register("getJigglerState", [], get_jiggler_state);
    table.register("setJigglerState", ["enabled"], set_jiggler_state);

    table.register("getWakeOnLanDevices", [], get_wake_on_lan_devices);
    table.register("setWakeOnLanDevices", ["params"], set_wake_on_lan_devices);
    table.register("sendWOLMagicPacket", ["macAddress"], send_wol_magic_packet);

    table.register("resetConfig", [], reset_config);
}

fn ping(_ctx: &DeviceContext) -> Result<&'static str, MethodError> {
    Ok("pong")
}

fn get_device_id(ctx: &DeviceContext) -> Result<String, MethodError> {
    Ok(ctx.device_id.clone())
}

fn keyboard_report(ctx: &DeviceContext, modifier: u8, keys: Vec<u8>) -> Result<(), MethodError> {
    ctx.usb.keyboard_report(modifier, &keys)?;
    Ok(())
}

fn abs_mouse_report(ctx: &DeviceContext, x: i64, y: i64, buttons: u8) -> Result<(), MethodError> {
    ctx.usb.abs_mouse_report(x, y, buttons)?;
    Ok(())
}

fn wheel_report(ctx: &DeviceContext, wheel_y: i8) -> Result<(), MethodError> {
    ctx.usb.wheel_report(wheel_y)?;
    Ok(())
}

fn get_stream_quality_factor(ctx: &DeviceContext) -> Result<f64, MethodError> {
    Ok(ctx.config.snapshot().stream_quality_factor)
}

fn set_stream_quality_factor(ctx: &DeviceContext, factor: f64) -> Result<(), MethodError> {
    tracing::info!("setting stream quality factor to {factor}");
    ctx.video.set_quality_factor(factor)?;
    ctx.config
        .update(|c| c.stream_quality_factor = factor)
        .map_err(|e| MethodError::new(format!("failed to save config: {e}")))?;
    Ok(())
}

fn get_edid(ctx: &DeviceContext) -> Result<String, MethodError> {
    Ok(ctx.video.edid()?)
}

fn set_edid(ctx: &DeviceContext, edid: String) -> Result<(), MethodError> {
    let edid = if edid.is_empty() {
        tracing::info!("restoring EDID to default");
        DEFAULT_EDID.to_string()
    } else {
        tracing::info!("setting EDID to {edid}");
        edid
    };
    ctx.video.set_edid(&edid)?;
    Ok(())
}

fn get_auto_update_state(ctx: &DeviceContext) -> Result<bool, MethodError> {
    Ok(ctx.config.snapshot().auto_update_enabled)
}

fn set_auto_update_state(ctx: &DeviceContext, enabled: bool) -> Result<bool, MethodError> {
    ctx.config
        .update(|c| c.auto_update_enabled = enabled)
        .map_err(|e| MethodError::new(format!("failed to save config: {e}")))?;
    Ok(enabled)
}

fn get_dev_channel_state(ctx: &DeviceContext) -> Result<bool, MethodError> {
    Ok(ctx.config.snapshot().include_pre_release)
}

fn set_dev_channel_state(ctx: &DeviceContext, enabled: bool) -> Result<(), MethodError> {
    ctx.config
        .update(|c| c.include_pre_release = enabled)
        .map_err(|e| MethodError::new(format!("failed to save config: {e}")))?;
    Ok(())
}

fn get_update_status(ctx: &DeviceContext) -> Result<UpdateStatus, MethodError> {
    let include_pre_release = ctx.config.snapshot().include_pre_release;
    ctx.updater
        .status(&ctx.device_id, include_pre_release)
        .map_err(|e| MethodError::new(format!("error checking for updates: {e}")))
}

/// Detaches the actual update work; progress arrives as `otaState`
/// events, the reply is immediate.
fn try_update(ctx: &DeviceContext) -> Result<(), MethodError> {
    let updater = ctx.updater.clone();
    let events = ctx.events.clone();
    let device_id = ctx.device_id.clone();
    let include_pre_release = ctx.config.snapshot().include_pre_release;

    tokio::task::spawn_blocking(move || {
        if let Err(e) = updater.apply(&device_id, include_pre_release, &events) {
            tracing::warn!("failed to try update: {e}");
        }
    });

    Ok(())
}

fn get_usb_emulation_state(ctx: &DeviceContext) -> Result<bool, MethodError> {
    Ok(ctx.usb.emulation_enabled()?)
}

fn set_usb_emulation_state(ctx: &DeviceContext, enabled: bool) -> Result<(), MethodError> {
    ctx.usb.set_emulation_enabled(enabled)?;
    Ok(())
}

fn get_mass_storage_mode(ctx: &DeviceContext) -> Result<String, MethodError> {
    let cdrom = ctx
        .usb
        .mass_storage_cdrom()
        .map_err(|e| MethodError::new(format!("failed to get mass storage mode: {e}")))?;
    Ok(mode_name(cdrom).to_string())
}

fn set_mass_storage_mode(ctx: &DeviceContext, mode: String) -> Result<String, MethodError> {
    let cdrom = match mode.as_str() {
        "cdrom" => true,
        "file" => false,
        other => return Err(MethodError::new(format!("invalid mode: {other}"))),
    };

    ctx.usb
        .set_mass_storage_cdrom(cdrom)
        .map_err(|e| MethodError::new(format!("failed to set mass storage mode: {e}")))?;

    // Report the mode actually in effect after the switch.
    get_mass_storage_mode(ctx)
}

fn mode_name(cdrom: bool) -> &'static str {
    if cdrom {
        "cdrom"
    } else {
        "file"
    }
}

fn get_jiggler_state(ctx: &DeviceContext) -> Result<bool, MethodError> {
    Ok(ctx.config.snapshot().jiggler_enabled)
}

fn set_jiggler_state(ctx: &DeviceContext, enabled: bool) -> Result<(), MethodError> {
    ctx.config
        .update(|c| c.jiggler_enabled = enabled)
        .map_err(|e| MethodError::new(format!("failed to save config: {e}")))?;
    Ok(())
}

fn get_wake_on_lan_devices(ctx: &DeviceContext) -> Result<Vec<WakeOnLanDevice>, MethodError> {
    Ok(ctx.config.snapshot().wake_on_lan_devices)
}

fn set_wake_on_lan_devices(ctx: &DeviceContext, params: WakeOnLanParams) -> Result<(), MethodError> {
    ctx.config
        .update(|c| c.wake_on_lan_devices = params.devices)
        .map_err(|e| MethodError::new(format!("failed to save config: {e}")))?;
    Ok(())
}

fn send_wol_magic_packet(_ctx: &DeviceContext, mac_address: String) -> Result<(), MethodError> {
    let mac = parse_mac(&mac_address)
        .ok_or_else(|| MethodError::new(format!("invalid MAC address: {mac_address}")))?;

    let packet = magic_packet(&mac);
    let socket = UdpSocket::bind(("0.0.0.0", 0))
        .map_err(|e| MethodError::new(format!("failed to open socket: {e}")))?;
    socket
        .set_broadcast(true)
        .map_err(|e| MethodError::new(format!("failed to enable broadcast: {e}")))?;
    socket
        .send_to(&packet, ("255.255.255.255", 9))
        .map_err(|e| MethodError::new(format!("failed to send magic packet: {e}")))?;

    Ok(())
}

fn reset_config(ctx: &DeviceContext) -> Result<(), MethodError> {
    ctx.config
        .reset()
        .map_err(|e| MethodError::new(format!("failed to reset config: {e}")))?;
    tracing::info!("configuration reset to default");
    Ok(())
}

/// Parse `aa:bb:cc:dd:ee:ff` (or `-` separated) into raw bytes.
fn parse_mac(mac: &str) -> Option<[u8; 6]> {
    let mut bytes = [0u8; 6];
    let mut count = 0;

    for part in mac.split(|c| c == ':' || c == '-') {
        if count == 6 || part.len() != 2 {
            return None;
        }
        bytes[count] = u8::from_str_radix(part, 16).ok()?;
        count += 1;
    }

    (count == 6).then_some(bytes)
}

/// Six bytes of `0xff` followed by the target MAC sixteen times.
fn magic_packet(mac: &[u8; 6]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(102);
    packet.extend_from_slice(&[0xff; 6]);
    for _ in 0..16 {
        packet.extend_from_slice(mac);
    }
    packet
}
