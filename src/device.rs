//! Device session: stream lifecycle, the map toggle surface, and the
//! per-tick consumer side of the frame channels.

use crate::atan::FastAtan2;
use crate::buffer::{FrameChannel, FrameSink};
use crate::decode::{decode_depth_frame, OutputMaps};
use crate::fpga;
use crate::register::VendorControl;
use crate::transport::{ControlTransport, UsbTransport};
use crate::types::{FrameRate, MapFlags, VideoFormat, RAW_DEPTH_FRAME_BYTES};
use crate::{GestureCamError, Result};
use rusb::Context;

/// An opened GestureCam session.
///
/// Owns the control channel, both frame channels' consumer halves, and
/// the output maps. Producer halves are handed to the hosting transport
/// via [`depth_sink`](Self::depth_sink) / [`video_sink`](Self::video_sink)
/// and may run on their own threads; everything else is single-threaded
/// through `&mut self`.
pub struct GestureCam<T: ControlTransport = UsbTransport> {
    ctrl: VendorControl<T>,
    serial: Option<String>,
    open: bool,

    enabled: MapFlags,
    depth_rate: FrameRate,
    video_format: VideoFormat,
    depth_active: bool,
    video_active: bool,

    depth_chan: FrameChannel,
    video_chan: FrameChannel,
    depth_front: Vec<u8>,
    video_front: Vec<u8>,

    atan: FastAtan2,
    maps: OutputMaps,
    new_depth: bool,
    new_video: bool,
}

impl GestureCam<UsbTransport> {
    /// Open the first attached GestureCam on `ctx`.
    pub fn open_first(ctx: &Context) -> Result<Self> {
        let io = UsbTransport::open_first(ctx)?;
        let serial = io.serial_number();
        Self::new(io, serial)
    }

    /// Open the `index`-th attached GestureCam on `ctx`.
    pub fn open_nth(ctx: &Context, index: usize) -> Result<Self> {
        let io = UsbTransport::open_nth(ctx, index)?;
        let serial = io.serial_number();
        Self::new(io, serial)
    }
}

impl<T: ControlTransport> GestureCam<T> {
    /// Open a session over an arbitrary control transport.
    pub fn with_transport(io: T) -> Result<Self> {
        Self::new(io, None)
    }

    fn new(io: T, serial: Option<String>) -> Result<Self> {
        let ctrl = VendorControl::new(io)?;
        Ok(GestureCam {
            ctrl,
            serial,
            open: true,
            enabled: MapFlags::empty(),
            depth_rate: FrameRate::default(),
            video_format: VideoFormat::default(),
            depth_active: false,
            video_active: false,
            depth_chan: FrameChannel::new(),
            video_chan: FrameChannel::new(),
            depth_front: Vec::new(),
            video_front: Vec::new(),
            atan: FastAtan2::new(),
            maps: OutputMaps::new(),
            new_depth: false,
            new_video: false,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(GestureCamError::NotReady)
        }
    }

    /// Device serial number, when the transport exposes one.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Direct register access for diagnostics and calibration tooling.
    pub fn controls(&self) -> &VendorControl<T> {
        &self.ctrl
    }

    /// Latest accelerometer reading (valid once the depth stream has been
    /// brought up at least once; bring-up powers the sensor).
    pub fn accel(&self) -> Result<[i16; 3]> {
        self.ensure_open()?;
        self.ctrl.read_accel()
    }

    /// Read calibration ROM.
    pub fn read_rom(&self, start: u16, len: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.ctrl.read_rom(start, len)
    }

    /// Select the depth frame rate used by subsequent bring-ups.
    pub fn set_depth_frame_rate(&mut self, rate: FrameRate) -> Result<()> {
        if self.depth_active {
            return Err(GestureCamError::InvalidMode);
        }
        self.depth_rate = rate;
        Ok(())
    }

    /// Select the color video format used by subsequent video starts.
    pub fn set_video_format(&mut self, format: VideoFormat) -> Result<()> {
        if self.video_active {
            return Err(GestureCamError::InvalidMode);
        }
        self.video_format = format;
        Ok(())
    }

    // -- Stream lifecycle --

    /// Bring the depth stream up: allocate its channel and program the
    /// FPGA. The hosting transport must separately start isochronous
    /// delivery into [`depth_sink`](Self::depth_sink).
    pub fn start_depth(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.depth_active {
            return Err(GestureCamError::InvalidMode);
        }

        self.depth_chan.allocate(RAW_DEPTH_FRAME_BYTES);
        self.depth_front = vec![0; RAW_DEPTH_FRAME_BYTES];
        if let Err(e) = fpga::bring_up(&self.ctrl, self.depth_rate) {
            self.depth_chan.clear();
            self.depth_front = Vec::new();
            return Err(e);
        }
        self.depth_active = true;
        Ok(())
    }

    /// Stop the depth stream: tear the FPGA down first (so no further
    /// frames are produced), then release the channel.
    pub fn stop_depth(&mut self) -> Result<()> {
        if !self.depth_active {
            return Ok(());
        }
        self.depth_active = false;
        let res = fpga::tear_down(&self.ctrl);
        self.depth_chan.clear();
        self.depth_front = Vec::new();
        self.new_depth = false;
        res
    }

    /// Open the color video channel at the configured format.
    pub fn start_video(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.video_active {
            return Err(GestureCamError::InvalidMode);
        }
        self.video_chan.allocate(self.video_format.frame_bytes());
        self.video_front = vec![0; self.video_format.frame_bytes()];
        self.video_active = true;
        Ok(())
    }

    pub fn stop_video(&mut self) -> Result<()> {
        if !self.video_active {
            return Ok(());
        }
        self.video_active = false;
        self.video_chan.clear();
        self.video_front = Vec::new();
        self.new_video = false;
        Ok(())
    }

    pub fn is_depth_active(&self) -> bool {
        self.depth_active
    }

    pub fn is_video_active(&self) -> bool {
        self.video_active
    }

    /// Producer handle for raw depth frames. One sink per stream; it is
    /// intended to live on the transport's frame-delivery thread.
    pub fn depth_sink(&self) -> FrameSink {
        self.depth_chan.sink()
    }

    /// Producer handle for decompressed packed-RGB video frames.
    pub fn video_sink(&self) -> FrameSink {
        self.video_chan.sink()
    }

    // -- Toggle surface --

    /// Enable output maps. Enabling any depth-derived map starts the
    /// depth stream if it is idle; `VIDEO` likewise starts the video
    /// channel.
    pub fn enable(&mut self, flags: MapFlags) -> Result<()> {
        self.ensure_open()?;
        let adds = flags - self.enabled;
        if adds.is_empty() {
            return Ok(());
        }

        if adds.intersects(MapFlags::DEPTH_DERIVED) && !self.depth_active {
            self.start_depth()?;
        }
        if adds.contains(MapFlags::VIDEO) && !self.video_active {
            self.start_video()?;
        }

        self.maps.set_enabled(adds, true);
        self.enabled |= adds;
        log::debug!("maps enabled: {:?}", self.enabled);
        Ok(())
    }

    /// Disable output maps, stopping a stream once its last dependent map
    /// goes away.
    pub fn disable(&mut self, flags: MapFlags) -> Result<()> {
        let drops = flags & self.enabled;
        if drops.is_empty() {
            return Ok(());
        }

        self.maps.set_enabled(drops, false);
        self.enabled -= drops;

        if self.depth_active && !self.enabled.intersects(MapFlags::DEPTH_DERIVED) {
            self.stop_depth()?;
        }
        if self.video_active && !self.enabled.contains(MapFlags::VIDEO) {
            self.stop_video()?;
        }
        log::debug!("maps enabled: {:?}", self.enabled);
        Ok(())
    }

    pub fn enabled(&self) -> MapFlags {
        self.enabled
    }

    // -- Consumer tick --

    /// Consume the freshest frame from each stream, if any, and decode
    /// the enabled depth maps. Call once per application tick from a
    /// single thread; decode runs entirely outside the channel locks.
    pub fn update(&mut self) {
        self.new_depth = self.depth_chan.consume_into(&mut self.depth_front);
        if self.new_depth {
            decode_depth_frame(
                &self.depth_front,
                self.enabled & MapFlags::DEPTH_DERIVED,
                &self.atan,
                &mut self.maps,
            );
        }

        self.new_video = self.video_chan.consume_into(&mut self.video_front);
    }

    /// Whether the last `update()` consumed a new depth frame.
    pub fn is_new_depth_frame(&self) -> bool {
        self.new_depth
    }

    /// Whether the last `update()` consumed a new video frame.
    pub fn is_new_video_frame(&self) -> bool {
        self.new_video
    }

    // -- Output map accessors (empty slices while disabled) --

    pub fn phase_pixels(&self) -> &[i16] {
        &self.maps.phase
    }

    pub fn confidence_pixels(&self) -> &[u16] {
        &self.maps.confidence
    }

    pub fn uv_coords(&self) -> &[f32] {
        &self.maps.uv
    }

    pub fn distance_pixels(&self) -> &[u16] {
        &self.maps.distance
    }

    pub fn raw_iq_pixels(&self) -> (&[i16], &[i16]) {
        (&self.maps.raw_i, &self.maps.raw_q)
    }

    pub fn ir_preview_pixels(&self) -> (&[u8], &[u8]) {
        (&self.maps.ir_i, &self.maps.ir_q)
    }

    pub fn depth_rgb_pixels(&self) -> &[u8] {
        &self.maps.depth_rgb
    }

    /// Most recent packed-RGB video frame.
    pub fn video_pixels(&self) -> &[u8] {
        &self.video_front
    }

    /// Stop both streams and release every buffer. Streams go down before
    /// the buffers so producer callbacks cannot land frames mid-teardown.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        let depth_res = self.stop_depth();
        let video_res = self.stop_video();

        self.maps.set_enabled(self.enabled, false);
        self.enabled = MapFlags::empty();
        self.open = false;
        log::info!("session closed");

        depth_res.and(video_res)
    }
}

impl<T: ControlTransport> Drop for GestureCam<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("error closing session: {e}");
        }
    }
}
