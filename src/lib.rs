//! Mouse side of the hiiri wireless link.
//!
//! Everything here is hardware-independent: the peripherals are reached
//! through the traits in [`link`], [`sensor`] and [`battery`], and the firmware
//! binary feeds interrupt events into [`link::LinkEngine::handle`].
#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod battery;
pub mod buttons;
pub mod config;
pub mod link;
pub mod paw3395;
pub mod sensor;

pub use icd;
