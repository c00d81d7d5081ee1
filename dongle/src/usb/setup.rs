//! Setup packet layout and request codes (USB 2.0 chapter 9).

/// `bmRequestType` fields.
pub mod request_type {
    pub const DIRECTION: u8 = 0b1000_0000;
    pub const IN: u8 = 0b1000_0000;
    pub const OUT: u8 = 0b0000_0000;

    pub const TYPE: u8 = 0b0110_0000;
    pub const STANDARD: u8 = 0b0000_0000;
    pub const CLASS: u8 = 0b0010_0000;
    pub const VENDOR: u8 = 0b0100_0000;

    pub const RECIPIENT: u8 = 0b0001_1111;
    pub const DEVICE: u8 = 0b0000_0000;
    pub const INTERFACE: u8 = 0b0000_0001;
    pub const ENDPOINT: u8 = 0b0000_0010;
    pub const OTHER: u8 = 0b0000_0011;

    /// Matches on direction, type and recipient.
    pub const ALL: u8 = DIRECTION | TYPE | RECIPIENT;
}

/// Standard `bRequest` codes.
pub mod request {
    pub const GET_STATUS: u8 = 0;
    pub const CLEAR_FEATURE: u8 = 1;
    pub const SET_FEATURE: u8 = 3;
    pub const SET_ADDRESS: u8 = 5;
    pub const GET_DESCRIPTOR: u8 = 6;
    pub const SET_DESCRIPTOR: u8 = 7;
    pub const GET_CONFIGURATION: u8 = 8;
    pub const SET_CONFIGURATION: u8 = 9;
    pub const GET_INTERFACE: u8 = 10;
    pub const SET_INTERFACE: u8 = 11;
    pub const SYNCH_FRAME: u8 = 12;
}

pub mod descriptor_type {
    pub const DEVICE: u8 = 1;
    pub const CONFIGURATION: u8 = 2;
    pub const STRING: u8 = 3;
    pub const INTERFACE: u8 = 4;
    pub const ENDPOINT: u8 = 5;
    pub const HID: u8 = 0x21;
    pub const HID_REPORT: u8 = 0x22;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    pub const fn parse(raw: &[u8; 8]) -> Self {
        SetupPacket {
            request_type: raw[0],
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }

    /// Device-to-host data stage.
    pub const fn is_in(&self) -> bool {
        self.request_type & request_type::DIRECTION == request_type::IN
    }

    pub const fn kind(&self) -> u8 {
        self.request_type & request_type::TYPE
    }

    pub const fn recipient(&self) -> u8 {
        self.request_type & request_type::RECIPIENT
    }

    /// GET_DESCRIPTOR type, from the high byte of `wValue`.
    pub const fn descriptor_type(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// GET_DESCRIPTOR index, from the low byte of `wValue`.
    pub const fn descriptor_index(&self) -> u8 {
        self.value as u8
    }
}
