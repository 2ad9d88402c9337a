//! # gesturecam - Rust driver for the Creative GestureCam (Senz3D)
//!
//! Drives the camera's vendor control protocol over its UVC extension
//! unit, brings the on-board FPGA to streaming state, and decodes the raw
//! quadrature depth samples into phase / confidence / distance maps:
//! - Register read/write and bulk calibration-ROM reads (rusb control
//!   transfers against the extension unit)
//! - FPGA bring-up/teardown sequencing with a bounded ready-poll
//! - Triple-buffered frame channels between the transport's delivery
//!   threads and the application tick
//! - Fixed-point phase decode (table arctangent, no floating point on the
//!   per-pixel path) with per-map enable flags and false-color rendering
//!
//! Isochronous frame delivery itself is the hosting transport's job: it
//! pushes raw frames into the [`FrameSink`] handles this crate hands out.
//!
//! ## Quick Start
//! ```no_run
//! use gesturecam::{GestureCam, MapFlags};
//!
//! let ctx = rusb::Context::new().unwrap();
//! let mut cam = GestureCam::open_first(&ctx).unwrap();
//! cam.enable(MapFlags::PHASE | MapFlags::CONFIDENCE).unwrap();
//!
//! let sink = cam.depth_sink(); // hand to the streaming transport
//! # let _ = sink;
//! loop {
//!     cam.update();
//!     if cam.is_new_depth_frame() {
//!         println!("phase[0] = {}", cam.phase_pixels()[0]);
//!     }
//! }
//! ```

pub mod atan;
pub mod buffer;
pub mod decode;
pub mod device;
pub mod error;
pub mod fpga;
pub mod protocol;
pub mod register;
pub mod transport;
pub mod types;

pub use buffer::{FrameChannel, FrameSink};
pub use device::GestureCam;
pub use error::GestureCamError;
pub use register::VendorControl;
pub use transport::{list_devices, num_devices, ControlTransport, UsbTransport};
pub use types::*;

/// Result type alias for gesturecam operations.
pub type Result<T> = std::result::Result<T, GestureCamError>;
