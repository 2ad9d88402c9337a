//! Control-plane transport over the UVC VideoControl interface.
//!
//! The camera's vendor protocol rides on standard UVC extension-unit
//! control transfers (SET_CUR / GET_CUR / GET_LEN). The `ControlTransport`
//! trait is the seam between the protocol engine and the USB stack so the
//! protocol and bring-up logic can be tested against a mock device.

use crate::error::GestureCamError;
use crate::protocol::{PID, VID};
use crate::types::DeviceInfo;
use crate::Result;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;

// UVC class request codes.
const SET_CUR: u8 = 0x01;
const GET_CUR: u8 = 0x81;
const GET_LEN: u8 = 0x85;

// Class-specific request types (interface recipient).
const REQ_TYPE_SET: u8 = 0x21;
const REQ_TYPE_GET: u8 = 0xA1;

// Video class descriptor constants.
const CC_VIDEO: u8 = 0x0E;
const SC_VIDEOCONTROL: u8 = 0x01;
const CS_INTERFACE: u8 = 0x24;
const VC_EXTENSION_UNIT: u8 = 0x06;

const CTRL_TIMEOUT: Duration = Duration::from_millis(500);

/// Synchronous extension-unit control channel to one camera.
pub trait ControlTransport {
    /// Issue a SET_CUR transfer to `selector` on `unit`.
    fn set_cur(&self, unit: u8, selector: u8, data: &[u8]) -> Result<()>;
    /// Issue a GET_CUR transfer, filling `data` completely.
    fn get_cur(&self, unit: u8, selector: u8, data: &mut [u8]) -> Result<()>;
    /// Query the control's buffer length via GET_LEN.
    fn ctrl_len(&self, unit: u8, selector: u8) -> Result<usize>;
    /// Find the unit ID of the extension unit carrying `guid`, if any.
    fn find_extension_unit(&self, guid: &[u8; 16]) -> Option<u8>;
}

/// rusb-backed transport for a real camera.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    vc_interface: u8,
}

impl UsbTransport {
    /// Open the first attached GestureCam on `ctx`.
    pub fn open_first(ctx: &Context) -> Result<UsbTransport> {
        Self::open_nth(ctx, 0)
    }

    /// Open the `index`-th attached GestureCam on `ctx`.
    pub fn open_nth(ctx: &Context, index: usize) -> Result<UsbTransport> {
        let device = matching_devices(ctx)?
            .into_iter()
            .nth(index)
            .ok_or(GestureCamError::DeviceNotFound)?;
        Self::open_device(&device)
    }

    fn open_device(device: &Device<Context>) -> Result<UsbTransport> {
        let handle = device.open()?;
        let vc_interface =
            find_videocontrol_interface(device)?.ok_or(GestureCamError::ExtensionUnitNotFound)?;

        // The uvcvideo kernel driver owns the interface on Linux.
        match handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => return Err(e.into()),
        }
        handle.claim_interface(vc_interface)?;

        log::info!(
            "Opened GestureCam at bus {} addr {} (VideoControl interface {})",
            device.bus_number(),
            device.address(),
            vc_interface
        );

        Ok(UsbTransport {
            handle,
            vc_interface,
        })
    }

    /// Device serial number from the string descriptor, if present.
    pub fn serial_number(&self) -> Option<String> {
        let desc = self.handle.device().device_descriptor().ok()?;
        self.handle.read_serial_number_string_ascii(&desc).ok()
    }

    fn index(&self, unit: u8) -> u16 {
        (unit as u16) << 8 | self.vc_interface as u16
    }
}

impl ControlTransport for UsbTransport {
    fn set_cur(&self, unit: u8, selector: u8, data: &[u8]) -> Result<()> {
        self.handle.write_control(
            REQ_TYPE_SET,
            SET_CUR,
            (selector as u16) << 8,
            self.index(unit),
            data,
            CTRL_TIMEOUT,
        )?;
        Ok(())
    }

    fn get_cur(&self, unit: u8, selector: u8, data: &mut [u8]) -> Result<()> {
        let len = self.handle.read_control(
            REQ_TYPE_GET,
            GET_CUR,
            (selector as u16) << 8,
            self.index(unit),
            data,
            CTRL_TIMEOUT,
        )?;
        if len != data.len() {
            return Err(GestureCamError::Protocol(format!(
                "short control read: got {} of {} bytes",
                len,
                data.len()
            )));
        }
        Ok(())
    }

    fn ctrl_len(&self, unit: u8, selector: u8) -> Result<usize> {
        let mut buf = [0u8; 2];
        self.handle.read_control(
            REQ_TYPE_GET,
            GET_LEN,
            (selector as u16) << 8,
            self.index(unit),
            &mut buf,
            CTRL_TIMEOUT,
        )?;
        Ok(u16::from_le_bytes(buf) as usize)
    }

    fn find_extension_unit(&self, guid: &[u8; 16]) -> Option<u8> {
        let config = self.handle.device().active_config_descriptor().ok()?;
        for interface in config.interfaces() {
            for desc in interface.descriptors() {
                if desc.class_code() != CC_VIDEO || desc.sub_class_code() != SC_VIDEOCONTROL {
                    continue;
                }
                if let Some(unit) = scan_extension_units(desc.extra(), guid) {
                    return Some(unit);
                }
            }
        }
        None
    }
}

/// Walk the class-specific descriptors trailing a VideoControl interface
/// and return the bUnitID of the extension unit matching `guid`.
fn scan_extension_units(extra: &[u8], guid: &[u8; 16]) -> Option<u8> {
    let mut off = 0;
    while off + 2 <= extra.len() {
        let len = extra[off] as usize;
        if len < 2 || off + len > extra.len() {
            break;
        }
        // Extension unit layout: bLength, bDescriptorType, bDescriptorSubtype,
        // bUnitID, guidExtensionCode[16], ...
        if len >= 20
            && extra[off + 1] == CS_INTERFACE
            && extra[off + 2] == VC_EXTENSION_UNIT
            && &extra[off + 4..off + 20] == guid
        {
            return Some(extra[off + 3]);
        }
        off += len;
    }
    None
}

fn matching_devices(ctx: &Context) -> Result<Vec<Device<Context>>> {
    let mut found = Vec::new();
    for device in ctx.devices()?.iter() {
        let desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(_) => continue,
        };
        if desc.vendor_id() == VID && desc.product_id() == PID {
            found.push(device);
        }
    }
    Ok(found)
}

fn find_videocontrol_interface(device: &Device<Context>) -> Result<Option<u8>> {
    let config = device.active_config_descriptor()?;
    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            if desc.class_code() == CC_VIDEO && desc.sub_class_code() == SC_VIDEOCONTROL {
                return Ok(Some(desc.interface_number()));
            }
        }
    }
    Ok(None)
}

/// List all attached GestureCam devices, opening each briefly to read its
/// serial number.
pub fn list_devices(ctx: &Context) -> Result<Vec<DeviceInfo>> {
    let mut infos = Vec::new();
    for device in matching_devices(ctx)? {
        let serial = device
            .open()
            .ok()
            .and_then(|h| {
                let desc = device.device_descriptor().ok()?;
                h.read_serial_number_string_ascii(&desc).ok()
            });
        infos.push(DeviceInfo {
            bus_number: device.bus_number(),
            device_address: device.address(),
            serial,
        });
    }
    Ok(infos)
}

/// Number of attached GestureCam devices.
pub fn num_devices(ctx: &Context) -> Result<usize> {
    Ok(matching_devices(ctx)?.len())
}
