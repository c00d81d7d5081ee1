//! Link timing and board constants for the mouse.

/// How long the mouse listens for the dongle's reply after its own TX.
pub const RX_TIMEOUT_US: u32 = 200;
/// Extra room after the RX timeout so a TX slot never precedes the timeout path.
pub const RX_GUARD_US: u32 = 50;
/// Shortest cycle the mouse will accept from the dongle.
pub const MIN_CYCLE_US: u32 = RX_TIMEOUT_US + RX_GUARD_US;
/// TX period used until the first dongle packet arrives (1 kHz).
pub const DEFAULT_CYCLE_US: u32 = 1000;
/// Compare value parking the RX timeout channel while no RX is pending.
pub const RX_TIMEOUT_DISARMED: u32 = u32::MAX;

/// Accumulated link time between battery samples.
pub const BATTERY_INTERVAL_US: u32 = 10_000_000;
/// First comparator threshold tried, roughly 4.2 V.
pub const LADDER_START: u8 = 44;
/// Stop walking down once the threshold falls below this step (about 3.0 V).
pub const LADDER_FLOOR: u8 = 31;

/// Sensor address-to-data delay (t_SRAD) inside a motion burst.
pub const SRAD_US: u32 = 2;
/// Chip select high time between register accesses (t_SWW, t_SWR).
pub const REGISTER_GAP_US: u32 = 5;

pub mod pins {
    pub const LED: usize = 7;
    pub const L_NO: usize = 8;
    pub const L_NC: usize = 29;
    pub const R_NO: usize = 15;
    pub const R_NC: usize = 14;
    pub const ENC_A: usize = 20;
    pub const ENC_B: usize = 18;
    pub const NCS: usize = 0;
    pub const MISO: usize = 1;
    pub const MOSI: usize = 4;
    pub const SCK: usize = 5;
    pub const MOTION: usize = 6;
}
