//! Compile-time settings of the dongle.

/// Subtracted from the poll countdown so the mouse packet lands just before
/// the host polls.
pub const CYCLE_LEEWAY_US: u32 = 100;

/// DPI relayed to the mouse until the host picks one.
pub const DEFAULT_DPI: u16 = 800;

/// Capacity of the endpoint 0 request handler registry.
pub const MAX_HANDLERS: usize = 4;

pub const EP0_MAX_PACKET: u8 = 64;
/// Largest control IN transfer the device can answer.
pub const CONTROL_BUF_LEN: usize = 256;
/// EasyDMA staging buffer, one full-speed packet.
pub const DMA_BUF_LEN: usize = 64;

pub const HID_ENDPOINT: u8 = 0x81;
pub const HID_REPORT_LEN: usize = 8;
pub const DEFAULT_POLL_INTERVAL: u8 = 1;

/// Time given to the host to finish the SET_MOUSESETTINGS transfer before the
/// device drops off the bus to re-enumerate.
pub const RESTART_SETTLE_MS: u64 = 5;

pub const MANUFACTURER: &str = "Hiiri Co.";
pub const PRODUCT: &str = "HID Mouse";
pub const SERIAL: &str = "69420";

/// Radio activity LED, lit while the reply is on air.
pub const LED_PIN: usize = 6;
