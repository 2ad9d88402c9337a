//! FPGA bring-up and teardown sequencing for the depth sensor.
//!
//! The register map is vendor-reverse-engineered and opaque; the writes
//! are not idempotent, so the order below must be preserved exactly.
//! Reordering breaks streaming.

use crate::protocol::FPGA_STATE_READY;
use crate::register::VendorControl;
use crate::transport::ControlTransport;
use crate::types::FrameRate;
use crate::{GestureCamError, Result};
use std::time::Duration;

/// Ready-poll budget. A stuck device surfaces as `Timeout` after ~3
/// seconds instead of hanging the caller's thread.
const READY_POLL_ATTEMPTS: u32 = 600;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Sensor timing, gain, and windowing setup, issued once the FPGA reports
/// ready. This also powers up the on-board accelerometer.
const SENSOR_SETUP: &[(u16, u16)] = &[
    (0x1a, 0x0000),
    (0x1b, 0x0000),
    (0x13, 0x0004),
    (0x14, 0x2c00),
    (0x15, 0x0001),
    (0x16, 0x0000),
    (0x17, 0x00ef),
    (0x18, 0x0000),
    (0x19, 0x013f),
    (0x1a, 0x0400),
    (0x1b, 0x0100),
    (0x1b, 0x0500),
    (0x1b, 0x0d00),
    (0x1c, 0x0005),
    (0x20, 0x04b0),
    (0x27, 0x0106),
    (0x28, 0x014d),
    (0x29, 0x00f0),
    (0x2a, 0x014d),
    (0x30, 0x0000),
    (0x31, 0x0000),
    (0x32, 0x0000),
    (0x3c, 0x002f),
    (0x3d, 0x03e7),
    (0x3e, 0x000f),
    (0x3f, 0x000f),
    (0x40, 0x03e8),
    (0x43, 0x0109),
    (0x1e, 0x8209),
    (0x1d, 0x0119),
    (0x44, 0x001e),
    (0x1b, 0x0d00),
    (0x1b, 0x4d00),
    (0x45, 0x0101),
    (0x46, 0x0002),
    (0x47, 0x0032),
    (0x2f, 0x0060),
    (0x00, 0x0c0c),
    (0x01, 0x0c0c),
    (0x2f, 0x0060),
    (0x03, 0x0000),
    (0x04, 0x0030),
    (0x05, 0x0060),
    (0x06, 0x0090),
    (0x07, 0x0000),
    (0x08, 0x0000),
    (0x09, 0x0000),
    (0x0a, 0x0000),
    (0x02, 0x0000),
    (0x0b, 0xea60),
    (0x0c, 0x0000),
    (0x0d, 0x4740),
    (0x0e, 0x0000),
    (0x0f, 0x0000),
    (0x10, 0x0000),
    (0x11, 0x01e0),
];

/// Frame-rate divider register, written between setup and enable.
const REG_DIVIDER: u16 = 0x12;

/// Output enable. The three 0x1a writes come last and stay separate to
/// avoid glitching the sensor output while it spins up.
const STREAM_ENABLE: &[(u16, u16)] = &[
    (0x1a, 0x1400),
    (0x33, 0x70f0),
    (0x4a, 0x0002),
    (0x1a, 0x1480),
    (0x1a, 0x14c0),
];

/// Master disable, stream disable, power-down.
const TEARDOWN: &[(u16, u16)] = &[(0x1a, 0x0000), (0x1b, 0x0000), (0x4b, 0x0000)];

fn wait_ready<T: ControlTransport>(
    ctrl: &VendorControl<T>,
    attempts: u32,
    interval: Duration,
) -> Result<()> {
    for attempt in 0..attempts {
        let state = ctrl.fpga_state()?;
        if state == FPGA_STATE_READY {
            if attempt > 0 {
                log::debug!("FPGA ready after {attempt} polls");
            }
            return Ok(());
        }
        log::trace!("waiting for FPGA (state={state})");
        std::thread::sleep(interval);
    }
    Err(GestureCamError::Timeout)
}

/// Poll until the FPGA is ready, then program the sensor for streaming at
/// the requested frame rate.
pub fn bring_up<T: ControlTransport>(ctrl: &VendorControl<T>, rate: FrameRate) -> Result<()> {
    wait_ready(ctrl, READY_POLL_ATTEMPTS, READY_POLL_INTERVAL)?;

    for &(reg, val) in SENSOR_SETUP {
        ctrl.write_register(reg, val)?;
    }
    ctrl.write_register(REG_DIVIDER, rate.divider())?;
    for &(reg, val) in STREAM_ENABLE {
        ctrl.write_register(reg, val)?;
    }

    log::info!("FPGA configured for depth streaming at {rate:?}");
    Ok(())
}

/// Disable streaming and power the sensor down. No-op when the FPGA is
/// not in the ready state.
pub fn tear_down<T: ControlTransport>(ctrl: &VendorControl<T>) -> Result<()> {
    if ctrl.fpga_state()? != FPGA_STATE_READY {
        return Ok(());
    }
    for &(reg, val) in TEARDOWN {
        ctrl.write_register(reg, val)?;
    }
    log::info!("FPGA streaming torn down");
    Ok(())
}

/// The complete ordered write list `bring_up` issues for `rate`. Exposed
/// for conformance checks.
pub fn bring_up_writes(rate: FrameRate) -> Vec<(u16, u16)> {
    let mut writes = SENSOR_SETUP.to_vec();
    writes.push((REG_DIVIDER, rate.divider()));
    writes.extend_from_slice(STREAM_ENABLE);
    writes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::testing::MockTransport;

    #[test]
    fn test_bring_up_issues_exact_sequence() {
        let ctrl = VendorControl::new(MockTransport::ready()).unwrap();
        bring_up(&ctrl, FrameRate::Fps60).unwrap();

        let writes = ctrl.transport().writes.borrow();
        assert_eq!(*writes, bring_up_writes(FrameRate::Fps60));
        // Enable bits are the last three 0x1a writes, in this order.
        let tail: Vec<_> = writes.iter().rev().take(5).cloned().collect();
        assert_eq!(tail[0], (0x1a, 0x14c0));
        assert_eq!(tail[1], (0x1a, 0x1480));
        assert_eq!(writes[writes.len() - 5], (0x1a, 0x1400));
    }

    #[test]
    fn test_frame_rate_divider() {
        let ctrl = VendorControl::new(MockTransport::ready()).unwrap();
        bring_up(&ctrl, FrameRate::Fps30).unwrap();
        let writes = ctrl.transport().writes.borrow();
        let divider = writes.iter().find(|&&(reg, _)| reg == REG_DIVIDER);
        assert_eq!(divider, Some(&(REG_DIVIDER, 4)));
    }

    #[test]
    fn test_ready_poll_bounded() {
        let io = MockTransport::ready();
        io.state.set(0);
        let ctrl = VendorControl::new(io).unwrap();
        let res = wait_ready(&ctrl, 3, Duration::ZERO);
        assert!(matches!(res, Err(GestureCamError::Timeout)));
        assert!(ctrl.transport().writes.borrow().is_empty());
    }

    #[test]
    fn test_tear_down_skipped_when_not_ready() {
        let io = MockTransport::ready();
        io.state.set(1);
        let ctrl = VendorControl::new(io).unwrap();
        tear_down(&ctrl).unwrap();
        assert!(ctrl.transport().writes.borrow().is_empty());

        ctrl.transport().state.set(FPGA_STATE_READY);
        tear_down(&ctrl).unwrap();
        assert_eq!(*ctrl.transport().writes.borrow(), TEARDOWN.to_vec());
    }
}
