//! Motion burst reader.
//!
//! A burst is three bus phases: the address byte goes out, the bus idles for
//! t_SRAD on a one-shot timer, then six data bytes are clocked in. Each phase
//! is started from the completion of the previous one, so the reader never
//! blocks inside an interrupt. Register writes asked for while the link runs
//! go through the same phases, one access at a time.

use crate::config::{REGISTER_GAP_US, SRAD_US};
use crate::paw3395::{self, Burst, RegOp, BURST_LEN, MAX_RESOLUTION_OPS, MOTION_BURST};

/// DMA-driven sensor bus.
pub trait BurstBus {
    /// Asserts chip select and clocks out one address byte.
    fn send_address(&mut self, addr: u8);
    /// Asserts chip select and clocks out a register write.
    fn send_write(&mut self, addr: u8, value: u8);
    /// Arms the one-shot delay timer.
    fn start_delay(&mut self, us: u32);
    /// Clocks in `len` bytes into the receive buffer.
    fn receive(&mut self, len: usize);
    /// Releases chip select.
    fn deselect(&mut self);
    /// Bytes captured by the last `receive`.
    fn received(&self) -> [u8; BURST_LEN];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// SPI transfer finished.
    TransferEnd,
    /// The one-shot delay elapsed.
    DelayElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Idle,
    Address,
    Delay,
    Data,
    /// Register write on the wire.
    RegWrite,
    /// Address of a register read on the wire.
    RegAddress,
    RegDelay,
    RegData,
    /// Chip select released between register accesses.
    RegGap,
}

pub struct BurstReader<B> {
    bus: B,
    phase: Phase,
    latest: Option<Burst>,
    ops: [RegOp; MAX_RESOLUTION_OPS],
    len: usize,
    next: usize,
    /// Read half of a read-modify-write: register, clear, set.
    modifying: Option<(u8, u8, u8)>,
    /// Write half, sent after the gap.
    pending_write: Option<(u8, u8)>,
    target: u16,
    resolution: u16,
}

impl<B: BurstBus> BurstReader<B> {
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            phase: Phase::Idle,
            latest: None,
            ops: [RegOp::Write(0, 0); MAX_RESOLUTION_OPS],
            len: 0,
            next: 0,
            modifying: None,
            pending_write: None,
            target: 0,
            resolution: 0,
        }
    }

    /// Starts a burst unless the bus is in use. Any unread result is dropped.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.latest = None;
        self.bus.send_address(MOTION_BURST);
        self.phase = Phase::Address;
        true
    }

    pub fn handle(&mut self, event: BusEvent) {
        match (self.phase, event) {
            (Phase::Address, BusEvent::TransferEnd) => {
                self.bus.start_delay(SRAD_US);
                self.phase = Phase::Delay;
            }
            (Phase::Delay, BusEvent::DelayElapsed) => {
                self.bus.receive(BURST_LEN);
                self.phase = Phase::Data;
            }
            (Phase::Data, BusEvent::TransferEnd) => {
                self.bus.deselect();
                self.latest = Some(Burst::parse(&self.bus.received()));
                self.phase = Phase::Idle;
            }
            (Phase::RegWrite, BusEvent::TransferEnd) => {
                self.bus.deselect();
                self.bus.start_delay(REGISTER_GAP_US);
                self.phase = Phase::RegGap;
            }
            (Phase::RegAddress, BusEvent::TransferEnd) => {
                self.bus.start_delay(SRAD_US);
                self.phase = Phase::RegDelay;
            }
            (Phase::RegDelay, BusEvent::DelayElapsed) => {
                self.bus.receive(1);
                self.phase = Phase::RegData;
            }
            (Phase::RegData, BusEvent::TransferEnd) => {
                self.bus.deselect();
                if let Some((addr, clear, set)) = self.modifying.take() {
                    let value = self.bus.received()[0];
                    self.pending_write = Some((addr, (value & !clear) | set));
                }
                self.bus.start_delay(REGISTER_GAP_US);
                self.phase = Phase::RegGap;
            }
            (Phase::RegGap, BusEvent::DelayElapsed) => self.next_register_op(),
            (phase, event) => trace!("burst event {:?} in {:?}", event, phase),
        }
    }

    fn next_register_op(&mut self) {
        if let Some((addr, value)) = self.pending_write.take() {
            self.bus.send_write(addr, value);
            self.phase = Phase::RegWrite;
            return;
        }
        let Some(&op) = self.ops[..self.len].get(self.next) else {
            debug!("resolution {} -> {}", self.resolution, self.target);
            self.resolution = self.target;
            self.phase = Phase::Idle;
            return;
        };
        self.next += 1;
        match op {
            RegOp::Write(addr, value) => {
                self.bus.send_write(addr, value);
                self.phase = Phase::RegWrite;
            }
            RegOp::Modify { addr, clear, set } => {
                self.modifying = Some((addr, clear, set));
                self.bus.send_address(addr & !paw3395::WRITE);
                self.phase = Phase::RegAddress;
            }
        }
    }

    /// Result of the last burst, if it finished and was not taken yet.
    pub fn take(&mut self) -> Option<Burst> {
        self.latest.take()
    }

    pub fn is_ready(&self) -> bool {
        self.latest.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Starts writing a new resolution. Refused while the bus is in use; the
    /// value shows up in [`resolution`](Self::resolution) once the last
    /// register access finished.
    pub fn set_resolution(&mut self, dpi: u16) -> bool {
        if self.is_busy() {
            return false;
        }
        self.len = 0;
        self.next = 0;
        for (slot, op) in self.ops.iter_mut().zip(paw3395::resolution_ops(dpi)) {
            *slot = op;
            self.len += 1;
        }
        self.target = dpi;
        self.next_register_op();
        true
    }

    /// Resolution last written in full, 0 before the first one.
    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
