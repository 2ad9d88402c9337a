//! Register Protocol Engine: paired control-transfer operations against
//! the resolved vendor extension unit.

use crate::protocol::{
    self, build_register_cmd, build_rom_arm_cmd, build_rom_phase_cmd, check_rom_ack,
    parse_register_response, EXTENSION_UNIT_GUID, OP_FPGA_STATE, OP_READ_REG, OP_WRITE_REG,
    REGISTER_CMD_LEN, ROM_CHUNK, ROM_CMD_LEN, ROM_PHASE_COMMIT, ROM_PHASE_TRANSFER,
    SELECTOR_REGISTER, SELECTOR_ROM,
};
use crate::transport::ControlTransport;
use crate::{GestureCamError, Result};

/// Vendor register access bound to a resolved extension unit.
///
/// Construction resolves the unit from the device's descriptor set; every
/// operation afterwards is guaranteed a valid unit reference.
pub struct VendorControl<T: ControlTransport> {
    io: T,
    unit: u8,
}

impl<T: ControlTransport> VendorControl<T> {
    /// Resolve the vendor extension unit on `io`. Fails with
    /// `ExtensionUnitNotFound` if the device does not expose it.
    pub fn new(io: T) -> Result<Self> {
        let unit = io
            .find_extension_unit(&EXTENSION_UNIT_GUID)
            .ok_or(GestureCamError::ExtensionUnitNotFound)?;
        log::debug!("Vendor extension unit resolved: id {unit}");
        Ok(VendorControl { io, unit })
    }

    pub fn transport(&self) -> &T {
        &self.io
    }

    /// Write a 16-bit register value.
    pub fn write_register(&self, addr: u16, val: u16) -> Result<()> {
        let cmd = build_register_cmd(OP_WRITE_REG, addr, val);
        self.io.set_cur(self.unit, SELECTOR_REGISTER, &cmd)
    }

    /// Read a 16-bit register value.
    pub fn read_register(&self, addr: u16) -> Result<u16> {
        self.read_op(OP_READ_REG, addr)
    }

    /// Query the FPGA state word.
    pub fn fpga_state(&self) -> Result<u16> {
        self.read_op(OP_FPGA_STATE, 0)
    }

    fn read_op(&self, op: u8, addr: u16) -> Result<u16> {
        let cmd = build_register_cmd(op, addr, 0);
        self.io.set_cur(self.unit, SELECTOR_REGISTER, &cmd)?;

        let mut resp = [0u8; REGISTER_CMD_LEN];
        self.io.get_cur(self.unit, SELECTOR_REGISTER, &mut resp)?;

        let (echo_addr, val) = parse_register_response(&resp);
        if echo_addr != addr {
            // The device occasionally echoes a stale address while still
            // returning the right value field. Not fatal.
            log::warn!("register echo mismatch: got {echo_addr:04x}, expected {addr:04x}");
        }
        Ok(val)
    }

    /// Bulk-read `len` bytes of calibration ROM starting at `start`.
    ///
    /// Three-phase handshake: arm with the address window, verify the
    /// acknowledgement sentinel, commit, switch to transfer mode, then
    /// collect 32-byte chunks.
    pub fn read_rom(&self, start: u16, len: usize) -> Result<Vec<u8>> {
        let ctrl_len = self.io.ctrl_len(self.unit, SELECTOR_ROM)?;
        if ctrl_len != ROM_CMD_LEN {
            return Err(GestureCamError::Protocol(format!(
                "ROM control length {ctrl_len}, expected {ROM_CMD_LEN}"
            )));
        }

        self.io.set_cur(
            self.unit,
            SELECTOR_ROM,
            &build_rom_arm_cmd(start, len as u16),
        )?;

        let mut buf = [0u8; ROM_CMD_LEN];
        self.io.get_cur(self.unit, SELECTOR_ROM, &mut buf)?;
        check_rom_ack(&buf, start).map_err(GestureCamError::Protocol)?;

        self.io.set_cur(
            self.unit,
            SELECTOR_ROM,
            &build_rom_phase_cmd(ROM_PHASE_COMMIT),
        )?;
        self.io.set_cur(
            self.unit,
            SELECTOR_ROM,
            &build_rom_phase_cmd(ROM_PHASE_TRANSFER),
        )?;

        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            self.io.get_cur(self.unit, SELECTOR_ROM, &mut buf)?;
            let take = ROM_CHUNK.min(len - out.len());
            out.extend_from_slice(&buf[1..1 + take]);
        }
        Ok(out)
    }

    /// Read the on-board accelerometer (powered up as a side effect of the
    /// depth bring-up sequence).
    pub fn read_accel(&self) -> Result<[i16; 3]> {
        Ok([
            self.read_register(protocol::REG_ACCEL_X)? as i16,
            self.read_register(protocol::REG_ACCEL_Y)? as i16,
            self.read_register(protocol::REG_ACCEL_Z)? as i16,
        ])
    }
}

/// In-memory device emulation for protocol, bring-up, and session tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MockTransport {
        pub regs: RefCell<HashMap<u16, u16>>,
        /// Every write_register op, in issue order.
        pub writes: RefCell<Vec<(u16, u16)>>,
        /// FPGA state reported to OP_FPGA_STATE reads.
        pub state: Cell<u16>,
        /// Non-zero to make the device echo a stale register address.
        pub echo_skew: Cell<u16>,
        /// Simulated ROM contents, addressed from 0.
        pub rom: RefCell<Vec<u8>>,
        /// Corrupt the ROM arm acknowledgement.
        pub bad_rom_ack: Cell<bool>,
        /// Set false to simulate a device without the vendor unit.
        pub has_unit: Cell<bool>,

        pending: Cell<Option<(u8, u16)>>,
        rom_window: Cell<(u16, u16)>,
        rom_armed: Cell<bool>,
        rom_cursor: Cell<usize>,
    }

    impl MockTransport {
        pub fn ready() -> Self {
            MockTransport {
                state: Cell::new(protocol::FPGA_STATE_READY),
                has_unit: Cell::new(true),
                ..Default::default()
            }
        }
    }

    impl ControlTransport for MockTransport {
        fn set_cur(&self, _unit: u8, selector: u8, data: &[u8]) -> Result<()> {
            match selector {
                SELECTOR_REGISTER => {
                    assert_eq!(data.len(), REGISTER_CMD_LEN);
                    let addr = protocol::read_le16(&data[1..3]);
                    let val = protocol::read_le16(&data[3..5]);
                    match data[0] {
                        OP_WRITE_REG => {
                            self.regs.borrow_mut().insert(addr, val);
                            self.writes.borrow_mut().push((addr, val));
                        }
                        op => self.pending.set(Some((op, addr))),
                    }
                }
                SELECTOR_ROM => {
                    assert_eq!(data.len(), ROM_CMD_LEN);
                    match data[0] {
                        protocol::ROM_PHASE_ARM => {
                            let start = protocol::read_le16(&data[1..3]);
                            let end = protocol::read_le16(&data[3..5]);
                            self.rom_window.set((start, end));
                            self.rom_armed.set(true);
                            self.rom_cursor.set(start as usize);
                        }
                        ROM_PHASE_COMMIT | ROM_PHASE_TRANSFER => {}
                        other => panic!("unexpected ROM phase {other:#04x}"),
                    }
                }
                other => panic!("unexpected selector {other:#04x}"),
            }
            Ok(())
        }

        fn get_cur(&self, _unit: u8, selector: u8, data: &mut [u8]) -> Result<()> {
            match selector {
                SELECTOR_REGISTER => {
                    let (op, addr) = self.pending.take().expect("GET_CUR without pending read");
                    let val = match op {
                        OP_FPGA_STATE => self.state.get(),
                        OP_READ_REG => self.regs.borrow().get(&addr).copied().unwrap_or(0),
                        other => panic!("unexpected read op {other:#04x}"),
                    };
                    let echo = addr.wrapping_add(self.echo_skew.get());
                    data.copy_from_slice(&build_register_cmd(op, echo, val));
                }
                SELECTOR_ROM => {
                    if self.rom_armed.take() {
                        let (start, _end) = self.rom_window.get();
                        data.fill(0);
                        data[0] = protocol::ROM_PHASE_ARM;
                        if self.bad_rom_ack.get() {
                            protocol::write_le16(&mut data[1..3], 0x1234);
                        } else {
                            protocol::write_le16(&mut data[1..3], 0xffff);
                            protocol::write_le16(&mut data[3..5], !start);
                        }
                    } else {
                        let rom = self.rom.borrow();
                        let cursor = self.rom_cursor.get();
                        data.fill(0);
                        for (i, slot) in data[1..].iter_mut().enumerate() {
                            *slot = rom.get(cursor + i).copied().unwrap_or(0);
                        }
                        self.rom_cursor.set(cursor + ROM_CHUNK);
                    }
                }
                other => panic!("unexpected selector {other:#04x}"),
            }
            Ok(())
        }

        fn ctrl_len(&self, _unit: u8, selector: u8) -> Result<usize> {
            Ok(match selector {
                SELECTOR_REGISTER => REGISTER_CMD_LEN,
                SELECTOR_ROM => ROM_CMD_LEN,
                _ => 0,
            })
        }

        fn find_extension_unit(&self, guid: &[u8; 16]) -> Option<u8> {
            (self.has_unit.get() && guid == &EXTENSION_UNIT_GUID).then_some(4)
        }
    }
}
