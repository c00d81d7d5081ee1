//! HID mouse class and the vendor requests of the configurator.

use icd::vendor::{GET_BATTERY, GET_BATTERY_TYPE, SET_MOUSESETTINGS, SET_MOUSESETTINGS_TYPE};
use icd::{MousePacket, Status};
use zerocopy::byteorder::little_endian::I16;
use zerocopy::IntoBytes;
use zerocopy_derive::{Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{HID_ENDPOINT, HID_REPORT_LEN};
use crate::link::{PollClock, StartLink};
use crate::mailbox::{Reader, Writer};
use crate::usb::setup::{descriptor_type, request, request_type};
use crate::usb::{Class, Endpoints, Outcome, Registry, Reply, SetupPacket, UsbBus};
use crate::Error;

/// Two buttons, six bits of padding, then X, Y and wheel as signed 16-bit
/// relative values and one byte of padding.
#[rustfmt::skip]
pub const REPORT_DESCRIPTOR: [u8; 62] = [
    0x05, 0x01,         // USAGE_PAGE (Generic Desktop)
    0x09, 0x02,         // USAGE (Mouse)
    0xa1, 0x01,         // COLLECTION (Application)
    0x09, 0x01,         //   USAGE (Pointer)
    0xa1, 0x00,         //   COLLECTION (Physical)
    0x05, 0x09,         //     USAGE_PAGE (Button)
    0x19, 0x01,         //     USAGE_MINIMUM (Button 1)
    0x29, 0x02,         //     USAGE_MAXIMUM (Button 2)
    0x15, 0x00,         //     LOGICAL_MINIMUM (0)
    0x25, 0x01,         //     LOGICAL_MAXIMUM (1)
    0x95, 0x02,         //     REPORT_COUNT (2)
    0x75, 0x01,         //     REPORT_SIZE (1)
    0x81, 0x02,         //     INPUT (Data,Var,Abs)
    0x95, 0x01,         //     REPORT_COUNT (1)
    0x75, 0x06,         //     REPORT_SIZE (6)
    0x81, 0x01,         //     INPUT (Cnst,Ary,Abs)
    0x05, 0x01,         //     USAGE_PAGE (Generic Desktop)
    0x09, 0x30,         //     USAGE (X)
    0x09, 0x31,         //     USAGE (Y)
    0x09, 0x38,         //     USAGE (Wheel)
    0x16, 0x01, 0x80,   //     LOGICAL_MINIMUM (-32767)
    0x26, 0xff, 0x7f,   //     LOGICAL_MAXIMUM (32767)
    0x95, 0x03,         //     REPORT_COUNT (3)
    0x75, 0x10,         //     REPORT_SIZE (16)
    0x81, 0x06,         //     INPUT (Data,Var,Rel)
    0x95, 0x01,         //     REPORT_COUNT (1)
    0x75, 0x08,         //     REPORT_SIZE (8)
    0x81, 0x01,         //     INPUT (Cnst,Ary,Abs)
    0xc0,               //   END_COLLECTION
    0x09, 0x3c,         //   USAGE (Motion Wakeup)
    0xc0,               // END_COLLECTION
];

/// GET_DESCRIPTOR `wValue` of the report descriptor.
const REPORT_DESCRIPTOR_VALUE: u16 = (descriptor_type::HID_REPORT as u16) << 8;
const REPORT_DESCRIPTOR_TYPE: u8 = request_type::IN | request_type::STANDARD | request_type::INTERFACE;

/// EasyDMA wants interrupt transfers in 4-byte multiples.
#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct MouseReport {
    buttons: u8,
    x: I16,
    y: I16,
    wheel: I16,
    padding: u8,
}

/// HID input report for `packet`. Battery bits of the status byte are
/// dropped.
pub fn report(packet: &MousePacket) -> [u8; HID_REPORT_LEN] {
    let report = MouseReport {
        buttons: packet.status.0 & Status::BUTTON_MASK,
        x: I16::new(packet.dx),
        y: I16::new(packet.dy),
        wheel: I16::new(packet.wheel.into()),
        padding: 0,
    };
    let mut out = [0u8; HID_REPORT_LEN];
    out.copy_from_slice(report.as_bytes());
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    ReportDescriptor,
    MouseSettings,
    Battery,
}

pub struct HidMouse<'a, P, L> {
    mouse: Reader<'a, MousePacket>,
    dpi: Writer<'a, u16>,
    clock: P,
    link: L,
    report_pending: bool,
    interval_change: Option<u8>,
}

impl<'a, P: PollClock, L: StartLink> HidMouse<'a, P, L> {
    pub fn new(mouse: Reader<'a, MousePacket>, dpi: Writer<'a, u16>, clock: P, link: L) -> Self {
        Self {
            mouse,
            dpi,
            clock,
            link,
            report_pending: false,
            interval_change: None,
        }
    }

    /// New polling interval requested by the host, to be applied by
    /// re-enumerating.
    pub fn take_interval_change(&mut self) -> Option<u8> {
        self.interval_change.take()
    }

    pub fn clock(&self) -> &P {
        &self.clock
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Arms the HID endpoint with the latest mouse packet. Old packets are
    /// sent again if nothing new arrived.
    fn send_report<B: UsbBus>(&mut self, endpoints: &mut Endpoints<B>) {
        match endpoints.write(HID_ENDPOINT, &report(&self.mouse.latest())) {
            Ok(_) => self.report_pending = false,
            Err(Error::DmaBusy) => self.report_pending = true,
            Err(e) => warn!("hid report: {:?}", e),
        }
    }
}

impl<B, P, L> Class<B> for HidMouse<'_, P, L>
where
    B: UsbBus,
    P: PollClock,
    L: StartLink,
{
    type Handler = Request;

    fn configure(&mut self, registry: &mut Registry<Request>, endpoints: &mut Endpoints<B>) {
        endpoints.regs_mut().enable_in_endpoint(HID_ENDPOINT & 0x7F);
        for (pattern, handler) in [
            (REPORT_DESCRIPTOR_TYPE, Request::ReportDescriptor),
            (SET_MOUSESETTINGS_TYPE, Request::MouseSettings),
            (GET_BATTERY_TYPE, Request::Battery),
        ] {
            if let Err(e) = registry.register(pattern, request_type::ALL, handler) {
                warn!("{:?} handler: {:?}", handler, e);
            }
        }
        self.clock.mark_poll();
        self.send_report(endpoints);
        self.link.start_link();
    }

    fn request(&mut self, handler: Request, req: &SetupPacket, reply: &mut Reply<'_>) -> Outcome {
        match handler {
            Request::ReportDescriptor => {
                if req.request_type != REPORT_DESCRIPTOR_TYPE
                    || req.request != request::GET_DESCRIPTOR
                    || req.value != REPORT_DESCRIPTOR_VALUE
                {
                    return Outcome::Defer;
                }
                reply.send(&REPORT_DESCRIPTOR);
                Outcome::Handled
            }
            Request::MouseSettings => {
                if req.request_type != SET_MOUSESETTINGS_TYPE || req.request != SET_MOUSESETTINGS {
                    return Outcome::Defer;
                }
                if req.value > 0 {
                    debug!("dpi {}", req.value);
                    self.dpi.publish(req.value);
                }
                if req.index > 0 {
                    reply.notify_on_status();
                }
                Outcome::Handled
            }
            Request::Battery => {
                if req.request_type != GET_BATTERY_TYPE || req.request != GET_BATTERY {
                    return Outcome::Defer;
                }
                reply.send(&[self.mouse.latest().status.0]);
                Outcome::Handled
            }
        }
    }

    fn status_stage(&mut self, handler: Request, req: &SetupPacket) {
        if handler == Request::MouseSettings {
            let interval = u8::try_from(req.index).unwrap_or(u8::MAX);
            info!("polling interval change to {}", interval);
            self.interval_change = Some(interval);
        }
    }

    fn endpoint_in(&mut self, addr: u8, endpoints: &mut Endpoints<B>) {
        if addr == HID_ENDPOINT {
            self.clock.mark_poll();
            self.send_report(endpoints);
        }
    }

    fn dma_idle(&mut self, endpoints: &mut Endpoints<B>) {
        if self.report_pending {
            self.send_report(endpoints);
        }
    }
}
