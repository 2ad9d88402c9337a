//! Depth decode pipeline: de-interleaves the raw quadrature samples and
//! fills whichever output maps are enabled, one pass, no floating point.

use crate::atan::FastAtan2;
use crate::types::{MapFlags, DEPTH_HEIGHT, DEPTH_WIDTH, RAW_DEPTH_FRAME_BYTES, RAW_DEPTH_WIDTH};

/// Reserved sample value meaning "no signal"; short-circuits the
/// arctangent and doubles as the calibration-marker phase.
pub const NO_SIGNAL_PHASE: i16 = 0x7fff;

/// Confidence floor below which the false-color output is forced to the
/// no-confidence color.
pub const CONFIDENCE_THRESHOLD: u16 = 50;

/// Samples are interleaved in 8-pixel stripes: eight in-phase values,
/// then the eight matching quadrature values.
const STRIPE: usize = 8;

/// Precomputed phase-to-RGB palette for the false-color map.
pub struct DepthColors {
    no_confidence: [u8; 3],
    table: Vec<[u8; 3]>,
}

impl DepthColors {
    pub fn new() -> Self {
        let mut table: Vec<[u8; 3]> = (0..65536u32)
            .map(|i| hue_rgb(((i >> 4) & 0xff) as u8))
            .collect();
        // The no-signal phase renders white as a calibration marker.
        table[(NO_SIGNAL_PHASE as i32 + 32767) as usize] = [255, 255, 255];
        DepthColors {
            no_confidence: [0, 0, 0],
            table,
        }
    }

    pub fn lookup(&self, phase: i16, confidence: u16) -> [u8; 3] {
        if confidence < CONFIDENCE_THRESHOLD {
            return self.no_confidence;
        }
        self.table[(phase as i32 + 32767).max(0) as usize]
    }
}

impl Default for DepthColors {
    fn default() -> Self {
        Self::new()
    }
}

/// Hue (0..=255) to RGB at full saturation and brightness. Build-time
/// only; the decode loop sees the finished table.
fn hue_rgb(hue: u8) -> [u8; 3] {
    let h = hue as f32 * 6.0 / 255.0;
    let sector = (h.floor() as u32).min(5);
    let f = h - sector as f32;
    let q = (255.0 * (1.0 - f)).round() as u8;
    let t = (255.0 * f).round() as u8;
    match sector {
        0 => [255, t, 0],
        1 => [q, 255, 0],
        2 => [0, 255, t],
        3 => [0, q, 255],
        4 => [t, 0, 255],
        _ => [255, 0, q],
    }
}

/// Per-pixel output maps. Each is empty until its flag is enabled; the
/// decode loop only writes maps named in the enabled set, so the two must
/// be kept in sync (the session guarantees this).
#[derive(Default)]
pub struct OutputMaps {
    pub phase: Vec<i16>,
    pub confidence: Vec<u16>,
    /// Placeholder: allocated but never filled. Computing real UV
    /// coordinates needs per-device calibration data.
    pub uv: Vec<f32>,
    pub distance: Vec<u16>,
    pub raw_i: Vec<i16>,
    pub raw_q: Vec<i16>,
    pub ir_i: Vec<u8>,
    pub ir_q: Vec<u8>,
    pub depth_rgb: Vec<u8>,
    pub colors: Option<DepthColors>,
}

const PIXELS: usize = DEPTH_WIDTH * DEPTH_HEIGHT;

impl OutputMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate or free the storage behind each flag in `flags`.
    pub fn set_enabled(&mut self, flags: MapFlags, on: bool) {
        if flags.contains(MapFlags::PHASE) {
            resize(&mut self.phase, on);
        }
        if flags.contains(MapFlags::CONFIDENCE) {
            resize(&mut self.confidence, on);
        }
        if flags.contains(MapFlags::UV) {
            if on {
                self.uv.resize(PIXELS * 2, 0.0);
            } else {
                self.uv = Vec::new();
            }
        }
        if flags.contains(MapFlags::DISTANCE) {
            resize(&mut self.distance, on);
        }
        if flags.contains(MapFlags::RAW_IQ) {
            resize(&mut self.raw_i, on);
            resize(&mut self.raw_q, on);
        }
        if flags.contains(MapFlags::IR_PREVIEW) {
            resize(&mut self.ir_i, on);
            resize(&mut self.ir_q, on);
        }
        if flags.contains(MapFlags::DEPTH_COLOR) {
            if on {
                self.depth_rgb.resize(PIXELS * 3, 0);
                if self.colors.is_none() {
                    self.colors = Some(DepthColors::new());
                }
            } else {
                self.depth_rgb = Vec::new();
                self.colors = None;
            }
        }
    }
}

fn resize<T: Default + Clone>(map: &mut Vec<T>, on: bool) {
    if on {
        map.resize(PIXELS, T::default());
    } else {
        *map = Vec::new();
    }
}

/// Decode one raw depth frame into the enabled output maps.
///
/// The raw frame is 640x240 little-endian i16 samples; along each row,
/// eight in-phase samples alternate with the eight quadrature samples for
/// the same logical pixels. Output pixels are produced in row-major order
/// over the 320x240 grid.
pub fn decode_depth_frame(
    raw: &[u8],
    enabled: MapFlags,
    atan: &FastAtan2,
    maps: &mut OutputMaps,
) {
    debug_assert_eq!(raw.len(), RAW_DEPTH_FRAME_BYTES);

    let mut px = 0;
    for y in 0..DEPTH_HEIGHT {
        let row = RAW_DEPTH_WIDTH * y;
        for x in (0..DEPTH_WIDTH).step_by(STRIPE) {
            for j in 0..STRIPE {
                let base = (row + 2 * x + j) * 2;
                let qoff = base + STRIPE * 2;
                let i_sample = i16::from_le_bytes([raw[base], raw[base + 1]]);
                let q_sample = i16::from_le_bytes([raw[qoff], raw[qoff + 1]]);

                let phase = if q_sample == NO_SIGNAL_PHASE {
                    NO_SIGNAL_PHASE
                } else {
                    atan.angle(q_sample, i_sample)
                };
                let confidence =
                    ((i_sample as i32).abs() + (q_sample as i32).abs()) as u16;

                if enabled.contains(MapFlags::PHASE) {
                    maps.phase[px] = phase;
                }
                if enabled.contains(MapFlags::CONFIDENCE) {
                    maps.confidence[px] = confidence;
                }
                if enabled.contains(MapFlags::DISTANCE) {
                    // Placeholder remap, not calibrated physical distance.
                    maps.distance[px] = ((phase as i32 + 32767) / 16) as u16;
                }
                if enabled.contains(MapFlags::RAW_IQ) {
                    maps.raw_i[px] = i_sample;
                    maps.raw_q[px] = q_sample;
                }
                if enabled.contains(MapFlags::IR_PREVIEW) {
                    maps.ir_i[px] = (((i_sample as i32) >> 1) + 128) as u8;
                    maps.ir_q[px] = (((q_sample as i32) >> 1) + 128) as u8;
                }
                if enabled.contains(MapFlags::DEPTH_COLOR) {
                    if let Some(colors) = maps.colors.as_ref() {
                        let rgb = colors.lookup(phase, confidence);
                        maps.depth_rgb[px * 3..px * 3 + 3].copy_from_slice(&rgb);
                    }
                }

                px += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raw frame where every logical pixel decodes to the same (I, Q).
    fn make_frame(i_val: i16, q_val: i16) -> Vec<u8> {
        let mut raw = vec![0u8; RAW_DEPTH_FRAME_BYTES];
        for s in 0..RAW_DEPTH_WIDTH * DEPTH_HEIGHT {
            let in_phase = (s % RAW_DEPTH_WIDTH / STRIPE) % 2 == 0;
            let val = if in_phase { i_val } else { q_val };
            raw[s * 2..s * 2 + 2].copy_from_slice(&val.to_le_bytes());
        }
        raw
    }

    fn full_maps() -> (OutputMaps, MapFlags) {
        let mut maps = OutputMaps::new();
        let flags = MapFlags::DEPTH_DERIVED;
        maps.set_enabled(flags, true);
        (maps, flags)
    }

    #[test]
    fn test_decode_uniform_frame() {
        let atan = FastAtan2::new();
        let (mut maps, flags) = full_maps();
        let raw = make_frame(100, 0);

        decode_depth_frame(&raw, flags, &atan, &mut maps);

        assert_eq!(maps.phase.len(), PIXELS);
        assert!(maps.phase.iter().all(|&p| p == 0));
        assert!(maps.confidence.iter().all(|&c| c == 100));
        assert!(maps.distance.iter().all(|&d| d == 32767 / 16));
        assert!(maps.raw_i.iter().all(|&v| v == 100));
        assert!(maps.raw_q.iter().all(|&v| v == 0));
        assert!(maps.ir_i.iter().all(|&v| v == 178));
        assert!(maps.ir_q.iter().all(|&v| v == 128));

        // Confidence 100 >= threshold: hue entry for phase 0.
        let expected = maps.colors.as_ref().unwrap().lookup(0, 100);
        assert_eq!(&maps.depth_rgb[..3], &expected);
        assert_ne!(expected, [0, 0, 0]);
    }

    #[test]
    fn test_no_signal_sentinel() {
        let atan = FastAtan2::new();
        let (mut maps, flags) = full_maps();
        let raw = make_frame(100, NO_SIGNAL_PHASE);

        decode_depth_frame(&raw, flags, &atan, &mut maps);

        assert!(maps.phase.iter().all(|&p| p == NO_SIGNAL_PHASE));
        // Sentinel phase renders as the white calibration marker.
        assert_eq!(&maps.depth_rgb[..3], &[255, 255, 255]);
    }

    #[test]
    fn test_low_confidence_forces_black() {
        let atan = FastAtan2::new();
        let (mut maps, flags) = full_maps();
        // |10| + |20| = 30 < 50
        let raw = make_frame(10, 20);

        decode_depth_frame(&raw, flags, &atan, &mut maps);

        assert!(maps.confidence.iter().all(|&c| c == 30));
        assert!(maps.depth_rgb.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_palette_threshold_boundary() {
        let colors = DepthColors::new();
        assert_eq!(colors.lookup(1234, 49), [0, 0, 0]);
        assert_ne!(colors.lookup(1234, 50), [0, 0, 0]);
        assert_eq!(colors.lookup(NO_SIGNAL_PHASE, 50), [255, 255, 255]);
    }

    #[test]
    fn test_only_enabled_maps_written() {
        let atan = FastAtan2::new();
        let mut maps = OutputMaps::new();
        maps.set_enabled(MapFlags::PHASE, true);
        let raw = make_frame(100, 0);

        decode_depth_frame(&raw, MapFlags::PHASE, &atan, &mut maps);

        assert_eq!(maps.phase.len(), PIXELS);
        assert!(maps.confidence.is_empty());
        assert!(maps.depth_rgb.is_empty());
        assert!(maps.colors.is_none());
    }

    #[test]
    fn test_disable_frees_storage() {
        let mut maps = OutputMaps::new();
        maps.set_enabled(MapFlags::DEPTH_DERIVED, true);
        assert_eq!(maps.uv.len(), PIXELS * 2);
        maps.set_enabled(MapFlags::DEPTH_DERIVED, false);
        assert!(maps.phase.is_empty());
        assert!(maps.uv.is_empty());
        assert!(maps.colors.is_none());
    }

    #[test]
    fn test_hue_endpoints_wrap_to_red() {
        assert_eq!(hue_rgb(0), [255, 0, 0]);
        assert_eq!(hue_rgb(255), [255, 0, 0]);
        // Mid-scale is far from red.
        let mid = hue_rgb(128);
        assert!(mid[0] < 64);
    }
}
