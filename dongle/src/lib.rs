//! Dongle side of the hiiri wireless link.
//!
//! The radio answers every mouse packet with the time left until the host's
//! next HID poll, and the USB device presents the latest mouse packet as a
//! HID mouse report. The two sides only meet through the [`mailbox`] slots.
#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod config;
mod error;
pub mod hid;
pub mod link;
pub mod mailbox;
pub mod usb;

pub use error::Error;
pub use icd;
