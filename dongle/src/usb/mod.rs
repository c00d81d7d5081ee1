//! Full-speed USB device stack for a single-configuration device.
//!
//! [`device::UsbDevice`] takes the peripheral's events one at a time. Endpoint
//! 0 runs through [`control::ControlPipe`], requests are offered to the class
//! handlers in [`registry::Registry`] before falling back to [`standard`], and
//! every endpoint transfer goes through the DMA guard in [`dma`].

pub mod control;
pub mod descriptor;
pub mod device;
pub mod dma;
pub mod registry;
pub mod setup;
pub mod standard;

pub use control::{Reply, Stage};
pub use device::{Class, UsbBus, UsbDevice, UsbEvent};
pub use dma::{EndpointRegisters, Endpoints};
pub use registry::{Outcome, Registry};
pub use setup::SetupPacket;
