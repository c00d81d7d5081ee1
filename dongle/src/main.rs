#![no_std]
#![no_main]

mod fmt;

use core::cell::RefCell;
use core::sync::atomic::{compiler_fence, Ordering};

use embassy_executor::Spawner;
use embassy_nrf::config::HfclkSource;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::{bind_interrupts, pac};
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use fmt::{info, unwrap};
use hiiri_dongle::config::{
    DEFAULT_DPI, DEFAULT_POLL_INTERVAL, EP0_MAX_PACKET, LED_PIN, RESTART_SETTLE_MS,
};
use hiiri_dongle::hid::HidMouse;
use hiiri_dongle::icd::{air, MousePacket, Status, FRAME_BUF_LEN};
use hiiri_dongle::link::{DongleLink, PollClock, Radio, StartLink};
use hiiri_dongle::mailbox::Mailbox;
use hiiri_dongle::usb::descriptor::Descriptors;
use hiiri_dongle::usb::dma::MAX_ENDPOINT;
use hiiri_dongle::usb::{EndpointRegisters, SetupPacket, UsbBus, UsbDevice, UsbEvent};
#[cfg(not(feature = "defmt"))]
use panic_halt as _;
use static_cell::ConstStaticCell;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

type Link = DongleLink<'static, NrfRadio, Timer0Clock>;
type Device = UsbDevice<NrfUsbd, HidMouse<'static, Timer0Clock, LinkStarter>>;

static LINK: Mutex<CriticalSectionRawMutex, RefCell<Option<Link>>> =
    Mutex::new(RefCell::new(None));
static USB: Mutex<CriticalSectionRawMutex, RefCell<Option<Device>>> =
    Mutex::new(RefCell::new(None));
/// New bInterval requested by the host.
static RESTART_SIG: Signal<CriticalSectionRawMutex, u8> = Signal::new();

static MOUSE: Mailbox<MousePacket> = Mailbox::new(MousePacket {
    status: Status(0),
    dx: 0,
    dy: 0,
    wheel: 0,
});
static DPI: Mailbox<u16> = Mailbox::new(DEFAULT_DPI);

static TX_FRAME: ConstStaticCell<[u8; FRAME_BUF_LEN]> = ConstStaticCell::new([0; FRAME_BUF_LEN]);
static RX_FRAME: ConstStaticCell<[u8; FRAME_BUF_LEN]> = ConstStaticCell::new([0; FRAME_BUF_LEN]);

bind_interrupts!(struct Irqs {
    RADIO => RadioIrq;
    USBD => UsbdIrq;
});

fn dispatch(event: UsbEvent) {
    USB.lock(|usb| {
        if let Some(device) = usb.borrow_mut().as_mut() {
            device.handle(event);
        }
    });
}

struct RadioIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::RADIO> for RadioIrq {
    unsafe fn on_interrupt() {
        let r = pac::RADIO;
        if r.events_disabled().read() != 0 {
            r.events_disabled().write_value(0);
            LINK.lock(|link| {
                if let Some(link) = link.borrow_mut().as_mut() {
                    link.radio_disabled();
                }
            });
        }
    }
}

struct UsbdIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::USBD> for UsbdIrq {
    unsafe fn on_interrupt() {
        let r = pac::USBD;

        let mut dma_end = false;
        for ep in 0..=MAX_ENDPOINT as usize {
            if r.events_endepin(ep).read() != 0 {
                r.events_endepin(ep).write_value(0);
                dma_end = true;
            }
        }
        if dma_end {
            dispatch(UsbEvent::DmaEnd);
        }

        if r.events_usbreset().read() != 0 {
            r.events_usbreset().write_value(0);
            dispatch(UsbEvent::Reset);
            return;
        }

        // OUT data stages are never started, so this is always an IN packet
        if r.events_ep0datadone().read() != 0 {
            r.events_ep0datadone().write_value(0);
            dispatch(UsbEvent::Ep0In);
        }

        if r.events_epdata().read() != 0 {
            r.events_epdata().write_value(0);
            let status = r.epdatastatus().read().0;
            r.epdatastatus().write(|w| w.0 = status);
            for ep in 1..=MAX_ENDPOINT {
                if status & (1 << ep) != 0 {
                    dispatch(UsbEvent::EndpointIn(0x80 | ep));
                }
            }
        }

        if r.events_ep0setup().read() != 0 {
            r.events_ep0setup().write_value(0);
            let raw = [
                r.bmrequesttype().read().0 as u8,
                r.brequest().read().0 as u8,
                r.wvaluel().read().0 as u8,
                r.wvalueh().read().0 as u8,
                r.windexl().read().0 as u8,
                r.windexh().read().0 as u8,
                r.wlengthl().read().0 as u8,
                r.wlengthh().read().0 as u8,
            ];
            dispatch(UsbEvent::Setup(SetupPacket::parse(&raw)));
        }

        let interval = USB.lock(|usb| {
            usb.borrow_mut()
                .as_mut()
                .and_then(|device| device.class_mut().take_interval_change())
        });
        if let Some(interval) = interval {
            RESTART_SIG.signal(interval);
        }
    }
}

fn led_on() {
    pac::P0.dirset().write(|w| w.set_pin(LED_PIN, true));
}

fn led_off() {
    pac::P0.dirclr().write(|w| w.set_pin(LED_PIN, true));
}

struct NrfRadio {
    tx: &'static mut [u8; FRAME_BUF_LEN],
    rx: &'static mut [u8; FRAME_BUF_LEN],
}

impl Radio for NrfRadio {
    fn transmit(&mut self, frame: &[u8]) {
        let r = pac::RADIO;
        self.tx[..frame.len()].copy_from_slice(frame);
        compiler_fence(Ordering::SeqCst);
        r.packetptr().write_value(self.tx.as_ptr() as u32);
        r.tasks_txen().write_value(1);
        led_on();
    }

    fn receive(&mut self) {
        let r = pac::RADIO;
        r.packetptr().write_value(self.rx.as_mut_ptr() as u32);
        r.tasks_rxen().write_value(1);
        led_off();
    }

    fn crc_ok(&self) -> bool {
        pac::RADIO.crcstatus().read().crcstatus() == pac::radio::vals::Crcstatus::CRCOK
    }

    fn received(&self) -> &[u8] {
        compiler_fence(Ordering::SeqCst);
        &self.rx[..]
    }
}

/// TIMER0 free-running at 1 MHz. CC[0] latches the last poll period, CC[1]
/// is scratch for reading the counter.
struct Timer0Clock;

impl PollClock for Timer0Clock {
    fn mark_poll(&mut self) {
        let t = pac::TIMER0;
        t.tasks_capture(0).write_value(1);
        t.tasks_clear().write_value(1);
    }

    fn poll_period(&self) -> u32 {
        pac::TIMER0.cc(0).read()
    }

    fn since_poll(&mut self) -> u32 {
        let t = pac::TIMER0;
        t.tasks_capture(1).write_value(1);
        t.cc(1).read()
    }
}

struct LinkStarter;

impl StartLink for LinkStarter {
    fn start_link(&mut self) {
        LINK.lock(|link| {
            if let Some(link) = link.borrow_mut().as_mut() {
                link.start();
            }
        });
    }
}

/// Anomaly 199: EasyDMA transfers of USBD need this while they run.
fn dma_workaround(active: bool) {
    let value = if active { 0x82 } else { 0 };
    unsafe { (0x4002_7C1C as *mut u32).write_volatile(value) };
}

struct NrfUsbd;

impl EndpointRegisters for NrfUsbd {
    fn start_in(&mut self, ep: u8, data: &[u8]) {
        let r = pac::USBD;
        let ep = ep as usize;
        compiler_fence(Ordering::SeqCst);
        dma_workaround(true);
        r.epin(ep).ptr().write_value(data.as_ptr() as u32);
        r.epin(ep).maxcnt().write(|w| w.set_maxcnt(data.len() as u8));
        r.tasks_startepin(ep).write_value(1);
    }

    fn dma_done(&mut self) {
        dma_workaround(false);
    }
}

impl UsbBus for NrfUsbd {
    fn stall_ep0(&mut self) {
        pac::USBD.tasks_ep0stall().write_value(1);
    }

    fn ep0_status(&mut self) {
        // the handshake runs in hardware and raises no event
        pac::USBD.tasks_ep0status().write_value(1);
    }

    fn enable_in_endpoint(&mut self, ep: u8) {
        pac::USBD.epinen().modify(|w| w.set_in(ep as usize, true));
    }

    fn reset_endpoints(&mut self) {
        let r = pac::USBD;
        r.epinen().write(|w| w.set_in(0, true));
        r.epouten().write(|w| w.set_out(0, true));
    }

    // the peripheral answers SET_ADDRESS on its own
    fn set_address(&mut self, _address: u8) {}
}

fn clock_setup() {
    let c = pac::CLOCK;
    c.tasks_hfclkstart().write_value(1);
    while c.events_hfclkstarted().read() == 0 {}
    c.events_hfclkstarted().write_value(0);
}

fn timer_setup() {
    let t = pac::TIMER0;
    t.tasks_stop().write_value(1);
    t.tasks_clear().write_value(1);
    t.mode().write(|w| w.set_mode(pac::timer::vals::Mode::TIMER));
    t.bitmode()
        .write(|w| w.set_bitmode(pac::timer::vals::Bitmode::_32BIT));
    // 16 MHz / 2^4 = 1 MHz
    t.prescaler().write(|w| w.set_prescaler(4));
    t.tasks_start().write_value(1);
}

fn led_setup() {
    pac::P0.pin_cnf(LED_PIN).write(|w| {
        w.set_dir(pac::gpio::vals::Dir::INPUT);
        w.set_input(pac::gpio::vals::Input::DISCONNECT);
        w.set_pull(pac::gpio::vals::Pull::DISABLED);
        w.set_drive(pac::gpio::vals::Drive::S0S1);
        w.set_sense(pac::gpio::vals::Sense::DISABLED);
    });
    pac::P0.outclr().write(|w| w.set_pin(LED_PIN, true));
}

fn radio_setup() {
    use pac::radio::vals;

    let r = pac::RADIO;
    r.mode().write(|w| w.set_mode(vals::Mode::NRF_2MBIT));
    r.modecnf0().write(|w| {
        w.set_ru(vals::Ru::FAST);
        w.set_dtx(vals::Dtx::CENTER);
    });
    r.pcnf0().write(|w| {
        w.set_lflen(air::LENGTH_FIELD_BITS);
        w.set_plen(vals::Plen::_8BIT);
    });
    r.pcnf1().write(|w| {
        w.set_maxlen(air::MAX_PAYLOAD);
        w.set_balen(air::BASE_ADDRESS_LEN);
        w.set_endian(vals::Endian::LITTLE);
        w.set_whiteen(true);
    });
    r.datawhiteiv()
        .write(|w| w.set_datawhiteiv(air::WHITENING_IV));
    r.crccnf().write(|w| {
        w.set_len(vals::Len::TWO);
        w.set_skipaddr(vals::Skipaddr::SKIP);
    });
    r.crcpoly().write(|w| w.set_crcpoly(air::CRC_POLY));
    r.crcinit().write(|w| w.set_crcinit(air::CRC_INIT));
    r.frequency().write(|w| w.set_frequency(air::FREQUENCY));
    r.txpower().write(|w| w.set_txpower(vals::Txpower::_0_DBM));
    r.base0().write_value(air::BASE0);
    r.base1().write_value(air::BASE1);
    r.prefix0().write(|w| w.0 = air::PREFIX0);
    r.txaddress()
        .write(|w| w.set_txaddress(air::DONGLE_TO_MOUSE));
    r.rxaddresses()
        .write(|w| w.set_addr(air::MOUSE_TO_DONGLE as usize, true));
    r.shorts().write(|w| {
        w.set_ready_start(true);
        w.set_end_disable(true);
    });
    r.intenset().write(|w| w.set_disabled(true));
}

/// Anomaly 187 wraps the enable of the peripheral.
fn usb_errata_187(active: bool) {
    unsafe {
        (0x4006_EC00 as *mut u32).write_volatile(0x9375);
        (0x4006_ED14 as *mut u32).write_volatile(if active { 3 } else { 0 });
        (0x4006_EC00 as *mut u32).write_volatile(0x9375);
    }
}

fn usb_start() {
    let p = pac::POWER;
    while !p.usbregstatus().read().vbusdetect() {}

    let r = pac::USBD;
    usb_errata_187(true);
    r.enable().write(|w| w.set_enable(true));
    while !r.eventcause().read().ready() {}
    r.eventcause().write(|w| w.set_ready(true));
    usb_errata_187(false);

    while !p.usbregstatus().read().outputrdy() {}

    r.intenset().write(|w| {
        w.set_usbreset(true);
        w.set_ep0datadone(true);
        w.set_ep0setup(true);
        w.set_epdata(true);
        for ep in 0..=MAX_ENDPOINT as usize {
            w.set_endepin(ep, true);
        }
    });
    r.usbpullup().write(|w| w.set_connect(true));
    info!("usb attached");
}

fn usb_stop() {
    let r = pac::USBD;
    r.intenclr().write(|w| w.0 = 0xFFFF_FFFF);
    r.enable().write(|w| w.set_enable(false));
    while r.enable().read().enable() {}
    r.usbpullup().write(|w| w.set_connect(false));
    info!("usb detached");
}

fn enable_interrupts() {
    for irq in [interrupt::RADIO, interrupt::USBD] {
        irq.set_priority(Priority::P1);
        irq.unpend();
        unsafe { irq.enable() };
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let mut c = embassy_nrf::config::Config::default();
    c.hfclk_source = HfclkSource::ExternalXtal;
    let p = embassy_nrf::init(c);
    // driven through raw registers from here on
    #[allow(clippy::drop_non_drop)]
    drop((p.RADIO, p.TIMER0, p.USBD));
    info!(
        "hiiri dongle {:08x}{:08x}",
        pac::FICR.deviceid(1).read(),
        pac::FICR.deviceid(0).read()
    );

    pac::POWER.tasks_constlat().write_value(1);
    clock_setup();
    timer_setup();
    led_setup();
    radio_setup();

    let (mouse_tx, mouse_rx) = unwrap!(MOUSE.split());
    let (dpi_tx, dpi_rx) = unwrap!(DPI.split());

    let radio = NrfRadio {
        tx: TX_FRAME.take(),
        rx: RX_FRAME.take(),
    };
    let link = DongleLink::new(radio, Timer0Clock, mouse_tx, dpi_rx);
    LINK.lock(|cell| cell.borrow_mut().replace(link));

    let class = HidMouse::new(mouse_rx, dpi_tx, Timer0Clock, LinkStarter);
    let device = UsbDevice::new(
        NrfUsbd,
        class,
        Descriptors::new(EP0_MAX_PACKET, DEFAULT_POLL_INTERVAL),
    );
    USB.lock(|cell| cell.borrow_mut().replace(device));

    enable_interrupts();
    usb_start();

    // the radio keeps running while the USB side re-enumerates
    loop {
        let interval = RESTART_SIG.wait().await;
        Timer::after_millis(RESTART_SETTLE_MS).await;
        usb_stop();
        USB.lock(|cell| {
            if let Some(device) = cell.borrow_mut().as_mut() {
                device.restart(interval);
            }
        });
        usb_start();
    }
}
