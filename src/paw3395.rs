//! PAW3395 register map and the few register sequences the link needs.

pub const PRODUCT_ID: u8 = 0x00;
pub const MOTION_BURST: u8 = 0x16;
pub const POWER_UP_RESET: u8 = 0x3A;
pub const PERFORMANCE: u8 = 0x40;
pub const SET_RESOLUTION: u8 = 0x47;
pub const RES_X_LOW: u8 = 0x48;
pub const RES_X_HIGH: u8 = 0x49;
pub const RES_Y_LOW: u8 = 0x4A;
pub const RES_Y_HIGH: u8 = 0x4B;
pub const RIPPLE_CONTROL: u8 = 0x5A;
pub const AXIS_CONTROL: u8 = 0x5B;
pub const RUN_DOWNSHIFT: u8 = 0x77;
pub const REST1_DOWNSHIFT: u8 = 0x79;
pub const REST2_DOWNSHIFT: u8 = 0x7B;
pub const RUN_DOWNSHIFT_MULT: u8 = 0x7D;

pub const SET_RESOLUTION_SET_RES: u8 = 1 << 0;
pub const RIPPLE_CONTROL_CTRL8: u8 = 1 << 7;
pub const AXIS_CONTROL_INVX: u8 = 1 << 5;
pub const RUN_DOWNSHIFT_MULT_MASK: u8 = 0b1111;
pub const RUN_DOWNSHIFT_MULT_2048: u8 = 0b1010;

/// Write bit OR'd into the register address.
pub const WRITE: u8 = 1 << 7;

/// Number of bytes read by a motion burst.
pub const BURST_LEN: usize = 6;

/// Resolution granularity of the sensor.
pub const DPI_STEP: u16 = 50;
pub const DPI_MAX: u16 = 26_000;
/// From this resolution on the datasheet asks for ripple control.
pub const RIPPLE_CONTROL_DPI: u16 = 9_000;

/// Blocking register access, used at power-up before the link runs.
pub trait Registers {
    fn read(&mut self, addr: u8) -> u8;
    fn write(&mut self, addr: u8, value: u8);

    fn modify(&mut self, addr: u8, clear: u8, set: u8) {
        let value = self.read(addr);
        self.write(addr, (value & !clear) | set);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpMode {
    Run,
    Rest1,
    Rest2,
    Rest3,
}

impl OpMode {
    pub const fn from_motion(motion: u8) -> Self {
        match motion & 0b11 {
            0b00 => OpMode::Run,
            0b01 => OpMode::Rest1,
            0b10 => OpMode::Rest2,
            _ => OpMode::Rest3,
        }
    }
}

/// A decoded motion burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Burst {
    pub op_mode: OpMode,
    pub dx: i16,
    pub dy: i16,
}

impl Burst {
    pub fn parse(raw: &[u8; BURST_LEN]) -> Self {
        Burst {
            op_mode: OpMode::from_motion(raw[0]),
            dx: i16::from_le_bytes([raw[2], raw[3]]),
            dy: i16::from_le_bytes([raw[4], raw[5]]),
        }
    }
}

/// One register access of a queued sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegOp {
    Write(u8, u8),
    /// Read-modify-write: clears `clear`, then sets `set`.
    Modify { addr: u8, clear: u8, set: u8 },
}

impl RegOp {
    /// Runs the access right away on a blocking bus.
    pub fn apply<R: Registers>(self, regs: &mut R) {
        match self {
            RegOp::Write(addr, value) => regs.write(addr, value),
            RegOp::Modify { addr, clear, set } => regs.modify(addr, clear, set),
        }
    }
}

/// Longest sequence [`resolution_ops`] produces.
pub const MAX_RESOLUTION_OPS: usize = 6;

/// Register accesses programming X and Y resolution. `dpi` is rounded down
/// to a multiple of 50.
pub fn resolution_ops(dpi: u16) -> impl Iterator<Item = RegOp> {
    let [low, high] = (dpi.min(DPI_MAX) / DPI_STEP).to_le_bytes();
    [
        RegOp::Write(RES_X_LOW, low),
        RegOp::Write(RES_X_HIGH, high),
        RegOp::Write(RES_Y_LOW, low),
        RegOp::Write(RES_Y_HIGH, high),
        RegOp::Modify {
            addr: SET_RESOLUTION,
            clear: 0,
            set: SET_RESOLUTION_SET_RES,
        },
    ]
    .into_iter()
    .chain((dpi >= RIPPLE_CONTROL_DPI).then_some(RegOp::Modify {
        addr: RIPPLE_CONTROL,
        clear: 0,
        set: RIPPLE_CONTROL_CTRL8,
    }))
}

/// Downshift timing (run->rest1 15 s, rest1->rest2 30 s, rest2->rest3 64 s)
/// and X axis orientation, applied once after power-up.
pub fn configure_downshift<R: Registers>(regs: &mut R) {
    regs.modify(RUN_DOWNSHIFT_MULT, RUN_DOWNSHIFT_MULT_MASK, RUN_DOWNSHIFT_MULT_2048);
    regs.write(RUN_DOWNSHIFT, 146);
    regs.write(REST1_DOWNSHIFT, 234);
    regs.write(REST2_DOWNSHIFT, 10);
    regs.modify(AXIS_CONTROL, AXIS_CONTROL_INVX, 0);
}

/// Vendor-supplied register writes of the power-up sequence (datasheet step 4).
pub const POWER_UP_SEQUENCE: &[(u8, u8)] = &[
    (0x7F, 0x07), (0x40, 0x41), (0x7F, 0x00), (0x40, 0x80), (0x7F, 0x0E), (0x55, 0x0D),
    (0x56, 0x1B), (0x57, 0xE8), (0x58, 0xD5), (0x7F, 0x14), (0x42, 0xBC), (0x43, 0x74),
    (0x4B, 0x20), (0x4D, 0x00), (0x53, 0x0E), (0x7F, 0x05), (0x44, 0x04), (0x4D, 0x06),
    (0x51, 0x40), (0x53, 0x40), (0x55, 0xCA), (0x5A, 0xE8), (0x5B, 0xEA), (0x61, 0x31),
    (0x62, 0x64), (0x6D, 0xB8), (0x6E, 0x0F), (0x70, 0x02), (0x4A, 0x2A), (0x60, 0x26),
    (0x7F, 0x06), (0x6D, 0x70), (0x6E, 0x60), (0x6F, 0x04), (0x53, 0x02), (0x55, 0x11),
    (0x7A, 0x01), (0x7D, 0x51), (0x7F, 0x07), (0x41, 0x10), (0x42, 0x32), (0x43, 0x00),
    (0x7F, 0x08), (0x71, 0x4F), (0x7F, 0x09), (0x62, 0x1F), (0x63, 0x1F), (0x65, 0x03),
    (0x66, 0x03), (0x67, 0x1F), (0x68, 0x1F), (0x69, 0x03), (0x6A, 0x03), (0x6C, 0x1F),
    (0x6D, 0x1F), (0x51, 0x04), (0x53, 0x20), (0x54, 0x20), (0x71, 0x0C), (0x72, 0x07),
    (0x73, 0x07), (0x7F, 0x0A), (0x4A, 0x14), (0x4C, 0x14), (0x55, 0x19), (0x7F, 0x14),
    (0x4B, 0x30), (0x4C, 0x03), (0x61, 0x0B), (0x62, 0x0A), (0x63, 0x02), (0x7F, 0x15),
    (0x4C, 0x02), (0x56, 0x02), (0x41, 0x91), (0x4D, 0x0A), (0x7F, 0x0C), (0x4A, 0x10),
    (0x4B, 0x0C), (0x4C, 0x40), (0x41, 0x25), (0x55, 0x18), (0x56, 0x14), (0x49, 0x0A),
    (0x42, 0x00), (0x43, 0x2D), (0x44, 0x0C), (0x54, 0x1A), (0x5A, 0x0D), (0x5F, 0x1E),
    (0x5B, 0x05), (0x5E, 0x0F), (0x7F, 0x0D), (0x48, 0xDD), (0x4F, 0x03), (0x52, 0x49),
    (0x51, 0x00), (0x54, 0x5B), (0x53, 0x00), (0x56, 0x64), (0x55, 0x00), (0x58, 0xA5),
    (0x57, 0x02), (0x5A, 0x29), (0x5B, 0x47), (0x5C, 0x81), (0x5D, 0x40), (0x71, 0xDC),
    (0x70, 0x07), (0x73, 0x00), (0x72, 0x08), (0x75, 0xDC), (0x74, 0x07), (0x77, 0x00),
    (0x76, 0x08), (0x7F, 0x10), (0x4C, 0xD0), (0x7F, 0x00), (0x4F, 0x63), (0x4E, 0x00),
    (0x52, 0x63), (0x51, 0x00), (0x54, 0x54), (0x5A, 0x10), (0x77, 0x4F), (0x47, 0x01),
    (0x5B, 0x40), (0x64, 0x60), (0x65, 0x06), (0x66, 0x13), (0x67, 0x0F), (0x78, 0x01),
    (0x79, 0x9C), (0x40, 0x00), (0x55, 0x02), (0x23, 0x70), (0x22, 0x01),
];

/// Register polled after the power-up sequence until it reads `POWER_UP_READY`.
pub const POWER_UP_STATUS: u8 = 0x6C;
pub const POWER_UP_READY: u8 = 0x80;
pub const POWER_UP_POLLS: usize = 60;
/// Fallback writes when the status never settles.
pub const POWER_UP_FALLBACK: &[(u8, u8)] = &[(0x7F, 0x14), (0x6C, 0x00), (0x7F, 0x00)];
/// Final writes of the power-up sequence.
pub const POWER_UP_FINISH: &[(u8, u8)] = &[
    (0x22, 0x00), (0x55, 0x00), (0x7F, 0x07), (0x40, 0x40), (0x7F, 0x00), (0x68, 0x01),
];
/// Motion registers read once to clear them after power-up.
pub const MOTION_REGISTERS: core::ops::RangeInclusive<u8> = 0x02..=0x06;
