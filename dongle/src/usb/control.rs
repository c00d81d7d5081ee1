//! Endpoint 0 control transfers.
//!
//! ```text
//! Idle --setup, IN data--> DataIn* --> LastDataIn --> StatusOut --> Idle
//! Idle --setup, no data--> StatusIn --> Idle
//! ```
//!
//! Host-to-device data stages are not supported. The peripheral runs the
//! status stage on its own once told to, so the pipe leaves StatusIn and
//! StatusOut as soon as that happens.
//!
//! A data packet that finds the DMA engine busy is held back and sent from
//! [`ControlPipe::resume`] when the running transfer ends.

use crate::config::CONTROL_BUF_LEN;
use crate::usb::dma::{EndpointRegisters, Endpoints};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    Idle,
    DataIn,
    LastDataIn,
    StatusIn,
    StatusOut,
}

/// What the device has to do after a pipe transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// A data packet was queued.
    Sent,
    /// The status stage has to be started.
    Status,
    /// The transfer is over.
    Done,
    Stall,
}

/// Data returned by a request handler.
pub struct Reply<'a> {
    buf: &'a mut [u8],
    len: usize,
    requested: u16,
    notify: bool,
}

impl Reply<'_> {
    /// `wLength` of the request, after any clamping.
    pub fn requested(&self) -> u16 {
        self.requested
    }

    pub fn clamp_requested(&mut self, max: u16) {
        self.requested = self.requested.min(max);
    }

    /// Copies as much of `data` as the host asked for.
    pub fn send(&mut self, data: &[u8]) {
        let len = data.len().min(self.requested as usize).min(self.buf.len());
        self.buf[..len].copy_from_slice(&data[..len]);
        self.len = len;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Asks for a callback once the status stage of this request starts.
    pub fn notify_on_status(&mut self) {
        self.notify = true;
    }

    pub fn wants_status_notification(&self) -> bool {
        self.notify
    }
}

pub struct ControlPipe {
    stage: Stage,
    buf: [u8; CONTROL_BUF_LEN],
    offset: usize,
    remaining: usize,
    zlp: bool,
    /// A data packet is owed but the DMA engine was busy.
    waiting: bool,
}

impl Default for ControlPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPipe {
    pub const fn new() -> Self {
        Self {
            stage: Stage::Idle,
            buf: [0; CONTROL_BUF_LEN],
            offset: 0,
            remaining: 0,
            zlp: false,
            waiting: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Fresh reply buffer for a request asking for `requested` bytes.
    pub fn reply(&mut self, requested: u16) -> Reply<'_> {
        Reply {
            buf: &mut self.buf,
            len: 0,
            requested,
            notify: false,
        }
    }

    /// Starts the data or status stage of a handled request. `len` bytes of
    /// the last reply are sent.
    pub fn start<R: EndpointRegisters>(
        &mut self,
        len: usize,
        requested: u16,
        max_packet: u8,
        endpoints: &mut Endpoints<R>,
    ) -> Step {
        self.waiting = false;
        if requested == 0 {
            self.stage = Stage::StatusIn;
            return Step::Status;
        }
        self.offset = 0;
        self.remaining = len;
        // a short answer that ends on a packet boundary needs a ZLP
        self.zlp = len > 0 && len < requested as usize;
        self.data_in(max_packet, endpoints)
    }

    /// The host took the last IN packet.
    pub fn in_done<R: EndpointRegisters>(
        &mut self,
        max_packet: u8,
        endpoints: &mut Endpoints<R>,
    ) -> Step {
        match self.stage {
            Stage::DataIn if !self.waiting => self.data_in(max_packet, endpoints),
            Stage::LastDataIn => {
                self.stage = Stage::StatusOut;
                Step::Status
            }
            _ => self.abort(),
        }
    }

    /// The status stage was handed to the peripheral.
    pub fn status_started(&mut self) -> Step {
        match self.stage {
            Stage::StatusIn | Stage::StatusOut => {
                self.stage = Stage::Idle;
                Step::Done
            }
            _ => self.abort(),
        }
    }

    /// Sends a data packet held back by a busy DMA engine. `None` when
    /// nothing was waiting.
    pub fn resume<R: EndpointRegisters>(
        &mut self,
        max_packet: u8,
        endpoints: &mut Endpoints<R>,
    ) -> Option<Step> {
        if !self.waiting || endpoints.is_busy() {
            return None;
        }
        self.waiting = false;
        Some(self.data_in(max_packet, endpoints))
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn abort(&mut self) -> Step {
        self.stage = Stage::Idle;
        self.waiting = false;
        Step::Stall
    }

    fn data_in<R: EndpointRegisters>(
        &mut self,
        max_packet: u8,
        endpoints: &mut Endpoints<R>,
    ) -> Step {
        let max_packet = max_packet as usize;
        let chunk = self.remaining.min(max_packet);
        let data = &self.buf[self.offset..self.offset + chunk];
        match endpoints.write(0, data) {
            Ok(_) => {}
            Err(Error::DmaBusy) => {
                trace!("ep0 waits for the dma engine");
                self.stage = Stage::DataIn;
                self.waiting = true;
                return Step::Sent;
            }
            Err(e) => {
                warn!("ep0 data stage dropped: {:?}", e);
                return self.abort();
            }
        }

        self.offset += chunk;
        self.remaining -= chunk;
        if chunk == max_packet && (self.remaining > 0 || self.zlp) {
            self.stage = Stage::DataIn;
            if self.remaining == 0 {
                self.zlp = false;
            }
        } else {
            self.stage = Stage::LastDataIn;
        }
        Step::Sent
    }
}
