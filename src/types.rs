/// Logical depth image width in pixels (after de-interleaving I/Q pairs).
pub const DEPTH_WIDTH: usize = 320;
/// Depth image height in pixels.
pub const DEPTH_HEIGHT: usize = 240;
/// Samples per raw depth row: two 16-bit quadrature samples per logical pixel.
pub const RAW_DEPTH_WIDTH: usize = 640;
/// Size in bytes of one raw depth frame as delivered by the transport.
pub const RAW_DEPTH_FRAME_BYTES: usize = RAW_DEPTH_WIDTH * DEPTH_HEIGHT * 2;

/// Default color video width in pixels.
pub const VIDEO_WIDTH: usize = 1280;
/// Default color video height in pixels.
pub const VIDEO_HEIGHT: usize = 720;

/// Depth stream frame rate. Selects the sensor divider written during
/// FPGA bring-up; only these two rates are supported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRate {
    Fps30,
    #[default]
    Fps60,
}

impl FrameRate {
    /// Sensor divider value for register 0x12.
    pub(crate) fn divider(self) -> u16 {
        match self {
            FrameRate::Fps60 => 2,
            FrameRate::Fps30 => 4,
        }
    }
}

/// Color video stream format requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
}

impl Default for VideoFormat {
    fn default() -> Self {
        VideoFormat {
            width: VIDEO_WIDTH,
            height: VIDEO_HEIGHT,
            fps: 30,
        }
    }
}

impl VideoFormat {
    /// Bytes per packed-RGB frame at this format.
    pub fn frame_bytes(&self) -> usize {
        self.width * self.height * 3
    }
}

bitflags::bitflags! {
    /// Output maps that can be independently enabled on a session.
    ///
    /// All flags except `VIDEO` are derived from the depth stream;
    /// enabling any of them starts it, disabling the last one stops it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MapFlags: u16 {
        /// Per-pixel scaled phase angle (i16, -2pi..2pi domain).
        const PHASE = 1 << 0;
        /// Per-pixel L1 magnitude |I| + |Q| (u16).
        const CONFIDENCE = 1 << 1;
        /// Per-pixel UV coordinates (f32 pairs). Allocated but not yet
        /// computed; requires per-device calibration data.
        const UV = 1 << 2;
        /// Linear remap of phase into a positive range (u16). Not a
        /// calibrated physical distance.
        const DISTANCE = 1 << 3;
        /// Raw 16-bit in-phase/quadrature sample maps.
        const RAW_IQ = 1 << 4;
        /// 8-bit IR preview maps derived from I/Q.
        const IR_PREVIEW = 1 << 5;
        /// False-color RGB rendering of the phase map.
        const DEPTH_COLOR = 1 << 6;
        /// Buffered color video frames.
        const VIDEO = 1 << 7;

        /// Every map that requires the depth stream.
        const DEPTH_DERIVED = Self::PHASE.bits()
            | Self::CONFIDENCE.bits()
            | Self::UV.bits()
            | Self::DISTANCE.bits()
            | Self::RAW_IQ.bits()
            | Self::IR_PREVIEW.bits()
            | Self::DEPTH_COLOR.bits();
    }
}

/// Identification info for one attached GestureCam.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub bus_number: u8,
    pub device_address: u8,
    pub serial: Option<String>,
}
