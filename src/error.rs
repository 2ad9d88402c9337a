/// Errors that can occur when interacting with the GestureCam device.
#[derive(Debug, thiserror::Error)]
pub enum GestureCamError {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Device not found (VID=041E PID=4096)")]
    DeviceNotFound,

    #[error("Vendor extension unit not found on device")]
    ExtensionUnitNotFound,

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Operation attempted without an open session")]
    NotReady,

    #[error("Stream is already started")]
    InvalidMode,

    #[error("Timed out waiting for device ready state")]
    Timeout,
}
