//! Event dispatch for the USB device.

use crate::usb::control::{ControlPipe, Reply, Stage, Step};
use crate::usb::descriptor::{Descriptors, CONFIGURATION_VALUE};
use crate::usb::dma::{EndpointRegisters, Endpoints};
use crate::usb::registry::{Outcome, Registry};
use crate::usb::setup::SetupPacket;
use crate::usb::standard::{self, Standard};

/// Device-level controls of the peripheral. Endpoint data goes through
/// [`Endpoints`].
pub trait UsbBus: EndpointRegisters {
    fn stall_ep0(&mut self);
    /// Lets the peripheral run the status stage of the current transfer. No
    /// event follows; the transfer is over once this returns.
    fn ep0_status(&mut self);
    fn enable_in_endpoint(&mut self, ep: u8);
    /// Leaves only endpoint 0 enabled.
    fn reset_endpoints(&mut self);
    fn set_address(&mut self, address: u8);
}

/// Device class sitting on top of the control pipe.
pub trait Class<B: UsbBus> {
    /// Tag stored in the request registry, handed back on dispatch.
    type Handler: Copy;

    /// The host selected the configuration. The registry is empty.
    fn configure(&mut self, registry: &mut Registry<Self::Handler>, endpoints: &mut Endpoints<B>);

    fn request(
        &mut self,
        handler: Self::Handler,
        req: &SetupPacket,
        reply: &mut Reply<'_>,
    ) -> Outcome;

    /// Status stage of a request whose handler asked to be notified.
    fn status_stage(&mut self, _handler: Self::Handler, _req: &SetupPacket) {}

    /// The host took the data queued on IN endpoint `addr`.
    fn endpoint_in(&mut self, _addr: u8, _endpoints: &mut Endpoints<B>) {}

    /// The DMA engine is free again.
    fn dma_idle(&mut self, _endpoints: &mut Endpoints<B>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbEvent {
    Reset,
    Setup(SetupPacket),
    /// IN data packet on endpoint 0 acknowledged.
    Ep0In,
    /// IN transaction on another endpoint acknowledged.
    EndpointIn(u8),
    /// End of an endpoint DMA transfer.
    DmaEnd,
}

pub struct UsbDevice<B, C>
where
    B: UsbBus,
    C: Class<B>,
{
    endpoints: Endpoints<B>,
    class: C,
    registry: Registry<C::Handler>,
    control: ControlPipe,
    descriptors: Descriptors,
    configured: bool,
    pending_address: Option<u8>,
    notify: Option<(C::Handler, SetupPacket)>,
}

impl<B, C> UsbDevice<B, C>
where
    B: UsbBus,
    C: Class<B>,
{
    pub fn new(bus: B, class: C, descriptors: Descriptors) -> Self {
        Self {
            endpoints: Endpoints::new(bus),
            class,
            registry: Registry::new(),
            control: ControlPipe::new(),
            descriptors,
            configured: false,
            pending_address: None,
            notify: None,
        }
    }

    pub fn handle(&mut self, event: UsbEvent) {
        match event {
            UsbEvent::Reset => {
                debug!("bus reset");
                self.reset();
            }
            UsbEvent::Setup(req) => self.setup(req),
            UsbEvent::Ep0In => {
                let max_packet = self.descriptors.max_packet_size0();
                let step = self.control.in_done(max_packet, &mut self.endpoints);
                self.step(step);
            }
            UsbEvent::EndpointIn(addr) => self.class.endpoint_in(addr, &mut self.endpoints),
            UsbEvent::DmaEnd => {
                self.endpoints.end();
                // ep0 goes first, the class retries on the next end
                let max_packet = self.descriptors.max_packet_size0();
                if let Some(step) = self.control.resume(max_packet, &mut self.endpoints) {
                    self.step(step);
                }
                self.class.dma_idle(&mut self.endpoints);
            }
        }
    }

    /// Re-enumeration with a new HID polling interval. The caller detaches
    /// and re-attaches the peripheral around this.
    pub fn restart(&mut self, interval: u8) {
        info!("restarting with bInterval {}", interval);
        self.descriptors.set_interval(interval);
        self.registry.clear();
        self.reset();
    }

    fn reset(&mut self) {
        self.configured = false;
        self.pending_address = None;
        self.notify = None;
        self.control.abort();
        self.endpoints.end();
        self.endpoints.regs_mut().reset_endpoints();
    }

    fn setup(&mut self, req: SetupPacket) {
        trace!("setup {:?}", req);
        self.notify = None;
        self.pending_address = None;

        if req.length != 0 && !req.is_in() {
            debug!("no OUT data stage on ep0");
            return self.stall();
        }

        let mut reply = self.control.reply(req.length);
        let class = &mut self.class;
        let mut handled_by = None;
        let outcome = self.registry.dispatch(&req, |handler, req| {
            let outcome = class.request(handler, req, &mut reply);
            if outcome == Outcome::Handled {
                handled_by = Some(handler);
            }
            outcome
        });
        let action = match outcome {
            Some(Outcome::Handled) => Standard::Done,
            Some(_) => Standard::Stall,
            None => standard::handle(&req, &self.descriptors, self.configured, &mut reply),
        };
        let (len, requested) = (reply.len(), reply.requested());
        if reply.wants_status_notification() {
            self.notify = handled_by.map(|handler| (handler, req));
        }

        match action {
            Standard::Done => {}
            Standard::SetAddress(address) => self.pending_address = Some(address),
            Standard::Configure(value) => self.configure(value),
            Standard::Stall => return self.stall(),
        }

        let max_packet = self.descriptors.max_packet_size0();
        let step = self.control.start(len, requested, max_packet, &mut self.endpoints);
        self.step(step);
    }

    fn configure(&mut self, value: u8) {
        self.endpoints.regs_mut().reset_endpoints();
        self.registry.clear();
        self.configured = value == CONFIGURATION_VALUE;
        if self.configured {
            info!("configured");
            self.class.configure(&mut self.registry, &mut self.endpoints);
        } else {
            info!("deconfigured");
        }
    }

    fn step(&mut self, step: Step) {
        match step {
            Step::Sent => {}
            Step::Status => {
                self.endpoints.regs_mut().ep0_status();
                if let Some((handler, req)) = self.notify.take() {
                    self.class.status_stage(handler, &req);
                }
                let step = self.control.status_started();
                self.step(step);
            }
            Step::Done => {
                if let Some(address) = self.pending_address.take() {
                    debug!("address {}", address);
                    self.endpoints.regs_mut().set_address(address);
                }
            }
            Step::Stall => self.stall(),
        }
    }

    fn stall(&mut self) {
        debug!("ep0 stall");
        self.control.abort();
        self.notify = None;
        self.pending_address = None;
        self.endpoints.regs_mut().stall_ep0();
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn control_stage(&self) -> Stage {
        self.control.stage()
    }

    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    pub fn registry(&self) -> &Registry<C::Handler> {
        &self.registry
    }

    pub fn class(&self) -> &C {
        &self.class
    }

    pub fn class_mut(&mut self) -> &mut C {
        &mut self.class
    }

    pub fn bus(&self) -> &B {
        self.endpoints.regs()
    }

    pub fn endpoints_mut(&mut self) -> &mut Endpoints<B> {
        &mut self.endpoints
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::usb::setup::request_type::*;
    use crate::usb::setup::{descriptor_type, request};
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BusOp {
        Stall,
        Status,
        Enable(u8),
        ResetEndpoints,
        Address(u8),
        In(u8, Vec<u8>),
        DmaDone,
    }

    #[derive(Default)]
    pub struct FakeBus {
        pub ops: Vec<BusOp>,
    }

    impl FakeBus {
        /// Packets started on endpoint `ep`.
        pub fn packets(&self, ep: u8) -> Vec<Vec<u8>> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    BusOp::In(e, data) if *e == ep => Some(data.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn count(&self, op: &BusOp) -> usize {
            self.ops.iter().filter(|o| *o == op).count()
        }
    }

    impl EndpointRegisters for FakeBus {
        fn start_in(&mut self, ep: u8, data: &[u8]) {
            self.ops.push(BusOp::In(ep, data.to_vec()));
        }

        fn dma_done(&mut self) {
            self.ops.push(BusOp::DmaDone);
        }
    }

    impl UsbBus for FakeBus {
        fn stall_ep0(&mut self) {
            self.ops.push(BusOp::Stall);
        }

        fn ep0_status(&mut self) {
            self.ops.push(BusOp::Status);
        }

        fn enable_in_endpoint(&mut self, ep: u8) {
            self.ops.push(BusOp::Enable(ep));
        }

        fn reset_endpoints(&mut self) {
            self.ops.push(BusOp::ResetEndpoints);
        }

        fn set_address(&mut self, address: u8) {
            self.ops.push(BusOp::Address(address));
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Read,
        Write,
    }

    #[derive(Default)]
    struct TestClass {
        configured: usize,
        status: Vec<(Tag, u16)>,
        endpoint_in: Vec<u8>,
        idle: usize,
    }

    impl Class<FakeBus> for TestClass {
        type Handler = Tag;

        fn configure(&mut self, registry: &mut Registry<Tag>, endpoints: &mut Endpoints<FakeBus>) {
            self.configured += 1;
            registry.register(IN | VENDOR | DEVICE, ALL, Tag::Read).unwrap();
            registry.register(OUT | VENDOR | DEVICE, ALL, Tag::Write).unwrap();
            endpoints.regs_mut().enable_in_endpoint(1);
        }

        fn request(&mut self, handler: Tag, req: &SetupPacket, reply: &mut Reply<'_>) -> Outcome {
            match (handler, req.request) {
                (Tag::Read, 1) => {
                    reply.send(&[0xAB]);
                    Outcome::Handled
                }
                (Tag::Write, 1) => {
                    reply.notify_on_status();
                    Outcome::Handled
                }
                (_, 2) => Outcome::Error,
                _ => Outcome::Defer,
            }
        }

        fn status_stage(&mut self, handler: Tag, req: &SetupPacket) {
            self.status.push((handler, req.value));
        }

        fn endpoint_in(&mut self, addr: u8, _endpoints: &mut Endpoints<FakeBus>) {
            self.endpoint_in.push(addr);
        }

        fn dma_idle(&mut self, _endpoints: &mut Endpoints<FakeBus>) {
            self.idle += 1;
        }
    }

    fn device(max_packet: u8) -> UsbDevice<FakeBus, TestClass> {
        UsbDevice::new(
            FakeBus::default(),
            TestClass::default(),
            Descriptors::new(max_packet, 1),
        )
    }

    fn setup(request_type: u8, request: u8, value: u16, length: u16) -> UsbEvent {
        UsbEvent::Setup(SetupPacket {
            request_type,
            request,
            value,
            index: 0,
            length,
        })
    }

    fn set_configuration(value: u16) -> UsbEvent {
        setup(OUT | STANDARD | DEVICE, request::SET_CONFIGURATION, value, 0)
    }

    #[test]
    fn device_descriptor_in_packets() {
        let mut dev = device(8);
        let get = |length| {
            setup(
                IN | STANDARD | DEVICE,
                request::GET_DESCRIPTOR,
                (descriptor_type::DEVICE as u16) << 8,
                length,
            )
        };

        // the first 64-byte request is answered with a single packet
        dev.handle(get(64));
        assert_eq!(dev.control_stage(), Stage::LastDataIn);
        dev.handle(UsbEvent::DmaEnd);
        dev.handle(UsbEvent::Ep0In);
        assert_eq!(dev.control_stage(), Stage::Idle);
        assert_eq!(dev.bus().packets(0), [dev.descriptors().device()[..8].to_vec()]);
        assert_eq!(dev.bus().count(&BusOp::Status), 1);

        // the full request takes three packets
        dev.handle(get(18));
        for _ in 0..3 {
            dev.handle(UsbEvent::DmaEnd);
            dev.handle(UsbEvent::Ep0In);
        }
        let sizes: Vec<usize> = dev.bus().packets(0).iter().map(Vec::len).collect();
        assert_eq!(sizes, [8, 8, 8, 2]);
        assert_eq!(dev.control_stage(), Stage::Idle);
        assert_eq!(dev.bus().count(&BusOp::Status), 2);
        assert_eq!(dev.bus().count(&BusOp::Stall), 0);
    }

    #[test]
    fn address_applied_after_status() {
        let mut dev = device(64);
        dev.handle(setup(OUT | STANDARD | DEVICE, request::SET_ADDRESS, 9, 0));
        assert_eq!(dev.bus().ops, [BusOp::Status, BusOp::Address(9)]);
        assert_eq!(dev.control_stage(), Stage::Idle);

        // no event follows the status stage; the next request just works
        dev.handle(setup(
            IN | STANDARD | DEVICE,
            request::GET_DESCRIPTOR,
            (descriptor_type::DEVICE as u16) << 8,
            18,
        ));
        assert_eq!(dev.control_stage(), Stage::LastDataIn);
        dev.handle(UsbEvent::DmaEnd);
        dev.handle(UsbEvent::Ep0In);
        assert_eq!(dev.control_stage(), Stage::Idle);
        assert_eq!(dev.bus().count(&BusOp::Status), 2);
        assert_eq!(dev.bus().count(&BusOp::Stall), 0);
    }

    #[test]
    fn set_configuration_enables_class() {
        let mut dev = device(64);
        dev.handle(set_configuration(1));
        assert!(dev.is_configured());
        assert_eq!(dev.class().configured, 1);
        assert_eq!(dev.registry().len(), 2);
        assert_eq!(
            dev.bus().ops,
            [BusOp::ResetEndpoints, BusOp::Enable(1), BusOp::Status]
        );

        // configuring again does not pile up handlers
        dev.handle(set_configuration(1));
        assert_eq!(dev.registry().len(), 2);

        dev.handle(set_configuration(0));
        assert!(!dev.is_configured());
        assert!(dev.registry().is_empty());
        assert_eq!(dev.class().configured, 2);
    }

    #[test]
    fn unknown_configuration_stalls() {
        let mut dev = device(64);
        dev.handle(set_configuration(1));
        dev.handle(set_configuration(3));
        assert!(dev.is_configured());
        assert_eq!(dev.bus().ops.last(), Some(&BusOp::Stall));
        assert_eq!(dev.control_stage(), Stage::Idle);
    }

    #[test]
    fn class_requests_before_standard() {
        let mut dev = device(64);
        // nothing registered yet: vendor request falls through and stalls
        dev.handle(setup(IN | VENDOR | DEVICE, 1, 0, 1));
        assert_eq!(dev.bus().ops, [BusOp::Stall]);

        dev.handle(set_configuration(1));
        dev.handle(UsbEvent::DmaEnd);
        dev.handle(setup(IN | VENDOR | DEVICE, 1, 0, 1));
        assert_eq!(dev.bus().packets(0), [[0xAB].to_vec()]);

        // a handler error stalls without reaching the standard requests
        let stalls = dev.bus().count(&BusOp::Stall);
        dev.handle(setup(IN | VENDOR | DEVICE, 2, 0, 1));
        assert_eq!(dev.bus().count(&BusOp::Stall), stalls + 1);
    }

    #[test]
    fn status_notification_only_for_requesting_handler() {
        let mut dev = device(64);
        dev.handle(set_configuration(1));
        dev.handle(setup(OUT | VENDOR | DEVICE, 1, 1600, 0));
        assert_eq!(dev.class().status, [(Tag::Write, 1600)]);

        dev.handle(setup(IN | VENDOR | DEVICE, 1, 0, 1));
        dev.handle(UsbEvent::DmaEnd);
        dev.handle(UsbEvent::Ep0In);
        assert_eq!(dev.class().status.len(), 1);
    }

    #[test]
    fn out_data_stage_stalls() {
        let mut dev = device(64);
        dev.handle(set_configuration(1));
        dev.handle(setup(OUT | VENDOR | DEVICE, 1, 1600, 4));
        assert_eq!(dev.bus().ops.last(), Some(&BusOp::Stall));
        assert!(dev.class().status.is_empty());
    }

    #[test]
    fn unexpected_ep0_events_stall() {
        let mut dev = device(64);
        dev.handle(UsbEvent::Ep0In);
        assert_eq!(dev.bus().ops, [BusOp::Stall]);

        // the status stage already ended the transfer
        dev.handle(set_configuration(1));
        dev.handle(UsbEvent::Ep0In);
        assert_eq!(dev.bus().count(&BusOp::Stall), 2);
        assert_eq!(dev.control_stage(), Stage::Idle);
    }

    #[test]
    fn ep0_waits_for_busy_dma() {
        let mut dev = device(64);
        dev.handle(set_configuration(1));
        dev.endpoints_mut().write(0x81, &[1, 2, 3, 4]).unwrap();

        dev.handle(setup(IN | VENDOR | DEVICE, 1, 0, 1));
        assert_eq!(dev.bus().count(&BusOp::Stall), 0);
        assert!(dev.bus().packets(0).is_empty());
        assert_eq!(dev.control_stage(), Stage::DataIn);

        dev.handle(UsbEvent::DmaEnd);
        assert_eq!(dev.bus().packets(0), [[0xAB].to_vec()]);
        assert_eq!(dev.class().idle, 1);
        dev.handle(UsbEvent::DmaEnd);
        dev.handle(UsbEvent::Ep0In);
        assert_eq!(dev.control_stage(), Stage::Idle);
        assert_eq!(dev.bus().count(&BusOp::Status), 2);
        assert_eq!(dev.bus().count(&BusOp::Stall), 0);
    }

    #[test]
    fn reset_returns_to_default_state() {
        let mut dev = device(64);
        dev.handle(set_configuration(1));
        dev.handle(setup(
            IN | STANDARD | DEVICE,
            request::GET_DESCRIPTOR,
            (descriptor_type::CONFIGURATION as u16) << 8,
            255,
        ));
        assert!(dev.endpoints_mut().is_busy());

        dev.handle(UsbEvent::Reset);
        assert!(!dev.is_configured());
        assert!(!dev.endpoints_mut().is_busy());
        assert_eq!(dev.control_stage(), Stage::Idle);
        assert_eq!(
            dev.bus().ops[dev.bus().ops.len() - 2..],
            [BusOp::DmaDone, BusOp::ResetEndpoints]
        );
    }

    #[test]
    fn endpoint_events_reach_class() {
        let mut dev = device(64);
        dev.handle(UsbEvent::EndpointIn(0x81));
        dev.handle(UsbEvent::DmaEnd);
        assert_eq!(dev.class().endpoint_in, [0x81]);
        assert_eq!(dev.class().idle, 1);
    }

    #[test]
    fn restart_changes_interval() {
        let mut dev = device(64);
        dev.handle(set_configuration(1));
        dev.restart(8);
        assert!(!dev.is_configured());
        assert!(dev.registry().is_empty());
        assert_eq!(dev.descriptors().interval(), 8);
        assert_eq!(dev.descriptors().configuration()[33], 8);
    }
}
