#![no_std]
//! Over-the-air and over-USB contract shared by the mouse, the dongle and
//! the host tools.

use zerocopy::byteorder::little_endian::{I16, U16};
use zerocopy::{FromBytes, IntoBytes};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Payload bytes of a mouse packet (status + dx + dy + wheel).
pub const MOUSE_PAYLOAD_LEN: u8 = 6;
/// Payload bytes of a dongle packet (cycle count + dpi).
pub const DONGLE_PAYLOAD_LEN: u8 = 4;

/// On-air mouse frame, length byte included.
pub const MOUSE_FRAME_LEN: usize = 1 + MOUSE_PAYLOAD_LEN as usize;
/// On-air dongle frame, length byte included.
pub const DONGLE_FRAME_LEN: usize = 1 + DONGLE_PAYLOAD_LEN as usize;

/// Size of a radio DMA buffer able to hold any frame the radio accepts.
pub const FRAME_BUF_LEN: usize = 1 + air::MAX_PAYLOAD as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Buffer shorter than the fixed frame.
    Truncated,
    /// Length byte does not match the fixed payload size.
    Length(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct MouseFrame {
    length: u8,
    status: u8,
    dx: I16,
    dy: I16,
    wheel: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct DongleFrame {
    length: u8,
    cycle_us: U16,
    dpi: U16,
}

const _: [(); 1] = [(); (core::mem::size_of::<MouseFrame>() == MOUSE_FRAME_LEN) as usize];
const _: [(); 1] = [(); (core::mem::size_of::<DongleFrame>() == DONGLE_FRAME_LEN) as usize];

/// Mouse status byte.
///
/// Bit 0 is the left button, bit 1 the right button, bits 2..=7 hold the
/// last sampled battery ladder step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    pub const LEFT: u8 = 1 << 0;
    pub const RIGHT: u8 = 1 << 1;
    pub const BUTTON_MASK: u8 = Self::LEFT | Self::RIGHT;
    const BATTERY_SHIFT: u8 = 2;

    pub const fn new(left: bool, right: bool, battery_step: u8) -> Self {
        Status(
            (left as u8)
                | ((right as u8) << 1)
                | ((battery_step << Self::BATTERY_SHIFT) & !Self::BUTTON_MASK),
        )
    }

    pub const fn left(self) -> bool {
        self.0 & Self::LEFT != 0
    }

    pub const fn right(self) -> bool {
        self.0 & Self::RIGHT != 0
    }

    pub const fn buttons(self) -> u8 {
        self.0 & Self::BUTTON_MASK
    }

    pub const fn battery_step(self) -> u8 {
        self.0 >> Self::BATTERY_SHIFT
    }
}

/// Motion snapshot sent from the mouse once per link cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MousePacket {
    pub status: Status,
    pub dx: i16,
    pub dy: i16,
    pub wheel: i8,
}

impl MousePacket {
    pub fn encode(&self) -> [u8; MOUSE_FRAME_LEN] {
        let frame = MouseFrame {
            length: MOUSE_PAYLOAD_LEN,
            status: self.status.0,
            dx: I16::new(self.dx),
            dy: I16::new(self.dy),
            wheel: self.wheel,
        };
        let mut out = [0u8; MOUSE_FRAME_LEN];
        out.copy_from_slice(frame.as_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let (frame, _) = MouseFrame::read_from_prefix(buf).map_err(|_| DecodeError::Truncated)?;
        if frame.length != MOUSE_PAYLOAD_LEN {
            return Err(DecodeError::Length(frame.length));
        }
        Ok(MousePacket {
            status: Status(frame.status),
            dx: frame.dx.get(),
            dy: frame.dy.get(),
            wheel: frame.wheel,
        })
    }
}

/// Timing and settings reply sent by the dongle right after each mouse packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DonglePacket {
    /// Microseconds until the dongle expects the next mouse transmission.
    pub cycle_us: u16,
    pub dpi: u16,
}

impl DonglePacket {
    pub fn encode(&self) -> [u8; DONGLE_FRAME_LEN] {
        let frame = DongleFrame {
            length: DONGLE_PAYLOAD_LEN,
            cycle_us: U16::new(self.cycle_us),
            dpi: U16::new(self.dpi),
        };
        let mut out = [0u8; DONGLE_FRAME_LEN];
        out.copy_from_slice(frame.as_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let (frame, _) = DongleFrame::read_from_prefix(buf).map_err(|_| DecodeError::Truncated)?;
        if frame.length != DONGLE_PAYLOAD_LEN {
            return Err(DecodeError::Length(frame.length));
        }
        Ok(DonglePacket {
            cycle_us: frame.cycle_us.get(),
            dpi: frame.dpi.get(),
        })
    }
}

/// Radio configuration both ends must agree on. Nothing here is negotiated.
pub mod air {
    /// 2402 MHz.
    pub const FREQUENCY: u8 = 2;
    pub const LENGTH_FIELD_BITS: u8 = 8;
    pub const MAX_PAYLOAD: u8 = 8;
    pub const BASE_ADDRESS_LEN: u8 = 3;
    pub const BASE0: u32 = 0x0044_0967;
    pub const BASE1: u32 = 0x0076_4635;
    pub const PREFIX0: u32 = 0x2A5F;

    /// Logical address the mouse transmits on and the dongle listens to.
    pub const MOUSE_TO_DONGLE: u8 = 0;
    /// Logical address the dongle transmits on and the mouse listens to.
    pub const DONGLE_TO_MOUSE: u8 = 1;

    pub const CRC_LEN: u8 = 2;
    pub const CRC_POLY: u32 = 0x0016_85F1;
    pub const CRC_INIT: u32 = 0x0006_56E9;
    pub const WHITENING_IV: u8 = 0x69;
}

/// Vendor control requests understood by the dongle on endpoint 0.
pub mod vendor {
    pub const USB_VID: u16 = 0x1915;
    pub const USB_PID: u16 = 0x572B;

    /// Host-to-device, vendor, device recipient.
    pub const SET_MOUSESETTINGS_TYPE: u8 = 0b0100_0000;
    /// `wValue` = DPI (0 keeps the current one), `wIndex` = bInterval (0 keeps it).
    pub const SET_MOUSESETTINGS: u8 = 0x01;

    /// Device-to-host, vendor, device recipient.
    pub const GET_BATTERY_TYPE: u8 = 0b1100_0000;
    /// Returns the raw mouse status byte (one byte).
    pub const GET_BATTERY: u8 = 0x01;

    /// bInterval for each configurator poll mode; mode 0 leaves the interval alone.
    pub const POLL_MODE_INTERVALS: [u8; 5] = [0, 8, 4, 2, 1];

    pub fn poll_mode_interval(mode: u8) -> Option<u8> {
        POLL_MODE_INTERVALS.get(mode as usize).copied()
    }

    /// Configurator DPI slider: 400 * 2^step, capped to what a `u16` holds.
    pub fn dpi_for_step(step: u8) -> u16 {
        400u32
            .checked_shl(step as u32)
            .filter(|dpi| *dpi <= u16::MAX as u32)
            .map_or(u16::MAX, |dpi| dpi as u16)
    }
}

/// Battery ladder conversion.
///
/// The mouse compares VDDH/5 against `(step + 1) / 64` of the 1.2 V reference.
pub mod battery {
    use crate::Status;

    pub const REFERENCE_MV: u32 = 1200;
    pub const VDDH_DIVIDER: u32 = 5;
    pub const LADDER_STEPS: u32 = 64;

    pub const fn millivolts(step: u8) -> u16 {
        (((step as u32 + 1) * REFERENCE_MV * VDDH_DIVIDER) / LADDER_STEPS) as u16
    }

    /// Extracts the ladder step from a raw GET_BATTERY reply.
    pub const fn step_from_status(raw: u8) -> u8 {
        Status(raw).battery_step()
    }
}
