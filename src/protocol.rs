//! Wire-level constants and command-buffer layout for the vendor
//! extension-unit protocol. Everything here is pure byte manipulation;
//! the transfers themselves live in `transport` and `register`.

// -- USB identifiers --
pub const VID: u16 = 0x041E;
pub const PID: u16 = 0x4096;

/// GUID of the vendor extension unit ("dd880f8a-1cba-4954-8a25-f7875967f0f7"
/// in USB descriptor byte order).
pub const EXTENSION_UNIT_GUID: [u8; 16] = [
    0x8A, 0x0F, 0x88, 0xDD, 0xBA, 0x1C, 0x54, 0x49, 0x8A, 0x25, 0xF7, 0x87, 0x59, 0x67, 0xF0,
    0xF7,
];

// -- Extension unit control selectors --
/// Register read/write operations (7-byte command buffer).
pub const SELECTOR_REGISTER: u8 = 0x02;
/// Bulk ROM read operations (33-byte command buffer).
pub const SELECTOR_ROM: u8 = 0x03;

// -- Command buffer geometry --
pub const REGISTER_CMD_LEN: usize = 7;
pub const ROM_CMD_LEN: usize = 33;
/// Payload bytes delivered per ROM read chunk.
pub const ROM_CHUNK: usize = ROM_CMD_LEN - 1;

// -- Opcodes (first byte of the register command buffer) --
pub const OP_READ_REG: u8 = 0x92;
pub const OP_WRITE_REG: u8 = 0x12;
pub const OP_FPGA_STATE: u8 = 0x86;

// -- ROM handshake phase bytes --
pub const ROM_PHASE_ARM: u8 = 0x01;
pub const ROM_PHASE_COMMIT: u8 = 0x02;
pub const ROM_PHASE_TRANSFER: u8 = 0x03;

/// FPGA state value meaning "configured and ready for register writes".
pub const FPGA_STATE_READY: u16 = 2;

// -- Interesting register addresses --
pub const REG_ACCEL_X: u16 = 0x38;
pub const REG_ACCEL_Y: u16 = 0x39;
pub const REG_ACCEL_Z: u16 = 0x3A;

pub fn write_le16(buf: &mut [u8], val: u16) {
    buf[0] = val as u8;
    buf[1] = (val >> 8) as u8;
}

pub fn read_le16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

/// Build a 7-byte register command: `[op, addr_lo, addr_hi, val_lo, val_hi, 0, 0]`.
pub fn build_register_cmd(op: u8, addr: u16, val: u16) -> [u8; REGISTER_CMD_LEN] {
    let mut buf = [0u8; REGISTER_CMD_LEN];
    buf[0] = op;
    write_le16(&mut buf[1..3], addr);
    write_le16(&mut buf[3..5], val);
    buf
}

/// Parse a register response buffer into its echoed (address, value) pair.
pub fn parse_register_response(buf: &[u8; REGISTER_CMD_LEN]) -> (u16, u16) {
    (read_le16(&buf[1..3]), read_le16(&buf[3..5]))
}

/// Build the ROM arm command covering `[start, start + len - 1]`.
pub fn build_rom_arm_cmd(start: u16, len: u16) -> [u8; ROM_CMD_LEN] {
    let mut buf = [0u8; ROM_CMD_LEN];
    buf[0] = ROM_PHASE_ARM;
    write_le16(&mut buf[1..3], start);
    write_le16(&mut buf[3..5], start.wrapping_add(len).wrapping_sub(1));
    buf
}

/// Build a bare ROM phase command (commit / transfer).
pub fn build_rom_phase_cmd(phase: u8) -> [u8; ROM_CMD_LEN] {
    let mut buf = [0u8; ROM_CMD_LEN];
    buf[0] = phase;
    buf
}

/// Check the device acknowledgement of the ROM arm phase. The device
/// echoes phase 0x01, address 0xffff, and the bitwise complement of the
/// start address; anything else means the handshake is out of sync.
pub fn check_rom_ack(buf: &[u8; ROM_CMD_LEN], start: u16) -> Result<(), String> {
    let addr = read_le16(&buf[1..3]);
    let complement = read_le16(&buf[3..5]);
    if buf[0] != ROM_PHASE_ARM || addr != 0xffff || complement != !start {
        return Err(format!(
            "ROM arm ack mismatch: got {:02x} {:04x} {:04x}, expected {:02x} ffff {:04x}",
            buf[0],
            addr,
            complement,
            ROM_PHASE_ARM,
            !start
        ));
    }
    Ok(())
}
