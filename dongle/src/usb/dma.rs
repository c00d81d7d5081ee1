//! Endpoint transfers through the USBD EasyDMA engine.
//!
//! Only one EasyDMA transfer can run in the peripheral at a time. The busy
//! flag is taken with a test-and-set before any endpoint register is touched
//! and released by the end-of-transfer event or a bus reset.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::DMA_BUF_LEN;
use crate::Error;

/// Highest endpoint number of the peripheral.
pub const MAX_ENDPOINT: u8 = 7;

pub trait EndpointRegisters {
    /// Points the IN endpoint at `data` and starts the DMA transfer.
    fn start_in(&mut self, ep: u8, data: &[u8]);
    /// Transfer finished or was cut short by a reset.
    fn dma_done(&mut self);
}

pub struct Endpoints<R> {
    regs: R,
    busy: AtomicBool,
    buf: [u8; DMA_BUF_LEN],
}

impl<R: EndpointRegisters> Endpoints<R> {
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            busy: AtomicBool::new(false),
            buf: [0; DMA_BUF_LEN],
        }
    }

    /// Stages `data` in RAM and starts an IN transfer on endpoint address
    /// `addr`. Returns the number of bytes queued.
    pub fn write(&mut self, addr: u8, data: &[u8]) -> Result<usize, Error> {
        let ep = addr & 0x7F;
        if ep > MAX_ENDPOINT {
            return Err(Error::InvalidEndpoint);
        }
        if self.busy.swap(true, Ordering::Acquire) {
            return Err(Error::DmaBusy);
        }
        let len = data.len().min(DMA_BUF_LEN);
        self.buf[..len].copy_from_slice(&data[..len]);
        self.regs.start_in(ep, &self.buf[..len]);
        Ok(len)
    }

    /// End of a DMA transfer.
    pub fn end(&mut self) {
        self.regs.dma_done();
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }
}
