//! Descriptors of the dongle: one configuration with a single HID interface
//! and one interrupt IN endpoint.
//!
//! The configuration block is rendered on request because the endpoint's
//! bInterval can change at run time.

use zerocopy::byteorder::little_endian::U16;
use zerocopy::IntoBytes;
use zerocopy_derive::{Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{HID_ENDPOINT, HID_REPORT_LEN, MANUFACTURER, PRODUCT, SERIAL};
use crate::hid::REPORT_DESCRIPTOR;
use crate::usb::setup::descriptor_type;
use icd::vendor::{USB_PID, USB_VID};

pub const CONFIGURATION_VALUE: u8 = 1;
const CONFIG_ATTR_RESERVED: u8 = 0x80;
const CONFIG_ATTR_SELF_POWERED: u8 = 0x40;
/// In 2 mA units.
const MAX_POWER: u8 = 0x32;
const LANGID_EN_US: u16 = 0x0409;

const CLASS_HID: u8 = 3;
const HID_SUBCLASS_NONE: u8 = 0;
const HID_PROTOCOL_NONE: u8 = 0;
const ENDPOINT_INTERRUPT: u8 = 3;

#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct DeviceDescriptor {
    length: u8,
    descriptor_type: u8,
    bcd_usb: U16,
    device_class: u8,
    device_sub_class: u8,
    device_protocol: u8,
    max_packet_size0: u8,
    vendor: U16,
    product: U16,
    bcd_device: U16,
    manufacturer_string: u8,
    product_string: u8,
    serial_string: u8,
    configurations: u8,
}

#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct ConfigurationDescriptor {
    length: u8,
    descriptor_type: u8,
    total_length: U16,
    interfaces: u8,
    configuration_value: u8,
    configuration_string: u8,
    attributes: u8,
    max_power: u8,
}

#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct InterfaceDescriptor {
    length: u8,
    descriptor_type: u8,
    interface_number: u8,
    alternate_setting: u8,
    endpoints: u8,
    interface_class: u8,
    interface_sub_class: u8,
    interface_protocol: u8,
    interface_string: u8,
}

/// HID 1.11 section 6.2.1, with exactly one report descriptor.
#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct HidDescriptor {
    length: u8,
    descriptor_type: u8,
    bcd_hid: U16,
    country_code: u8,
    descriptors: u8,
    report_descriptor_type: u8,
    report_descriptor_length: U16,
}

#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct EndpointDescriptor {
    length: u8,
    descriptor_type: u8,
    endpoint_address: u8,
    attributes: u8,
    max_packet_size: U16,
    interval: u8,
}

#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct ConfigurationBlock {
    configuration: ConfigurationDescriptor,
    interface: InterfaceDescriptor,
    hid: HidDescriptor,
    endpoint: EndpointDescriptor,
}

pub const DEVICE_LEN: usize = core::mem::size_of::<DeviceDescriptor>();
pub const CONFIGURATION_LEN: usize = core::mem::size_of::<ConfigurationBlock>();

const fn string_descriptor<const N: usize>(s: &str) -> [u8; N] {
    let chars = s.as_bytes();
    let mut out = [0u8; N];
    out[0] = N as u8;
    out[1] = descriptor_type::STRING;
    let mut i = 0;
    while i < chars.len() {
        // UTF-16LE, ASCII only
        out[2 + 2 * i] = chars[i];
        i += 1;
    }
    out
}

const LANGIDS: [u8; 4] = {
    let id = LANGID_EN_US.to_le_bytes();
    [4, descriptor_type::STRING, id[0], id[1]]
};
const MANUFACTURER_STRING: [u8; 2 + 2 * MANUFACTURER.len()] = string_descriptor(MANUFACTURER);
const PRODUCT_STRING: [u8; 2 + 2 * PRODUCT.len()] = string_descriptor(PRODUCT);
const SERIAL_STRING: [u8; 2 + 2 * SERIAL.len()] = string_descriptor(SERIAL);

static STRINGS: [&[u8]; 4] = [
    &LANGIDS,
    &MANUFACTURER_STRING,
    &PRODUCT_STRING,
    &SERIAL_STRING,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Descriptors {
    max_packet_size0: u8,
    interval: u8,
}

impl Descriptors {
    pub const fn new(max_packet_size0: u8, interval: u8) -> Self {
        Self {
            max_packet_size0,
            interval,
        }
    }

    pub const fn max_packet_size0(&self) -> u8 {
        self.max_packet_size0
    }

    pub const fn interval(&self) -> u8 {
        self.interval
    }

    /// Takes effect at the next enumeration.
    pub fn set_interval(&mut self, interval: u8) {
        self.interval = interval;
    }

    pub const fn self_powered(&self) -> bool {
        CONFIG_ATTR_RESERVED & CONFIG_ATTR_SELF_POWERED != 0
    }

    pub fn device(&self) -> [u8; DEVICE_LEN] {
        let desc = DeviceDescriptor {
            length: DEVICE_LEN as u8,
            descriptor_type: descriptor_type::DEVICE,
            bcd_usb: U16::new(0x0200),
            device_class: 0,
            device_sub_class: 0,
            device_protocol: 0,
            max_packet_size0: self.max_packet_size0,
            vendor: U16::new(USB_VID),
            product: U16::new(USB_PID),
            bcd_device: U16::new(0x0200),
            manufacturer_string: 1,
            product_string: 2,
            serial_string: 3,
            configurations: 1,
        };
        let mut out = [0u8; DEVICE_LEN];
        out.copy_from_slice(desc.as_bytes());
        out
    }

    pub fn configuration(&self) -> [u8; CONFIGURATION_LEN] {
        let block = ConfigurationBlock {
            configuration: ConfigurationDescriptor {
                length: core::mem::size_of::<ConfigurationDescriptor>() as u8,
                descriptor_type: descriptor_type::CONFIGURATION,
                total_length: U16::new(CONFIGURATION_LEN as u16),
                interfaces: 1,
                configuration_value: CONFIGURATION_VALUE,
                configuration_string: 0,
                attributes: CONFIG_ATTR_RESERVED,
                max_power: MAX_POWER,
            },
            interface: InterfaceDescriptor {
                length: core::mem::size_of::<InterfaceDescriptor>() as u8,
                descriptor_type: descriptor_type::INTERFACE,
                interface_number: 0,
                alternate_setting: 0,
                endpoints: 1,
                interface_class: CLASS_HID,
                interface_sub_class: HID_SUBCLASS_NONE,
                interface_protocol: HID_PROTOCOL_NONE,
                interface_string: 0,
            },
            hid: HidDescriptor {
                length: core::mem::size_of::<HidDescriptor>() as u8,
                descriptor_type: descriptor_type::HID,
                bcd_hid: U16::new(0x0111),
                country_code: 0,
                descriptors: 1,
                report_descriptor_type: descriptor_type::HID_REPORT,
                report_descriptor_length: U16::new(REPORT_DESCRIPTOR.len() as u16),
            },
            endpoint: EndpointDescriptor {
                length: core::mem::size_of::<EndpointDescriptor>() as u8,
                descriptor_type: descriptor_type::ENDPOINT,
                endpoint_address: HID_ENDPOINT,
                attributes: ENDPOINT_INTERRUPT,
                max_packet_size: U16::new(HID_REPORT_LEN as u16),
                interval: self.interval,
            },
        };
        let mut out = [0u8; CONFIGURATION_LEN];
        out.copy_from_slice(block.as_bytes());
        out
    }

    pub fn string(&self, index: u8) -> Option<&'static [u8]> {
        STRINGS.get(index as usize).copied()
    }
}
