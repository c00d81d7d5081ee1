#![no_std]
#![no_main]

mod fmt;

use core::cell::RefCell;
use core::sync::atomic::{compiler_fence, Ordering};

use embassy_executor::Spawner;
use embassy_nrf::config::{DcdcConfig, HfclkSource, Reg0Voltage};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::{bind_interrupts, pac};
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use fmt::info;
use hiiri::battery::Comparator;
use hiiri::buttons::{Contact, SpdtSwitch};
use hiiri::config::{pins, REGISTER_GAP_US, SRAD_US};
use hiiri::icd::{air, FRAME_BUF_LEN};
use hiiri::link::{LinkEngine, LinkEvent, LinkTimer, MouseInputs, Radio, Sleep};
use hiiri::paw3395::{self, Registers, BURST_LEN};
use hiiri::sensor::{BurstBus, BusEvent};
#[cfg(not(feature = "defmt"))]
use panic_halt as _;
use static_cell::ConstStaticCell;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

const CH_L_NO: usize = 0;
const CH_L_NC: usize = 1;
const CH_R_NO: usize = 2;
const CH_R_NC: usize = 3;

/// Core clock cycles per microsecond, for the blocking register delays.
const CYCLES_PER_US: u32 = 64;

type Link = LinkEngine<NrfRadio, LinkTimer1, SensorBus, NrfComparator, Inputs, Power>;

static LINK: Mutex<CriticalSectionRawMutex, RefCell<Option<Link>>> =
    Mutex::new(RefCell::new(None));
static WAKE_SIG: Signal<CriticalSectionRawMutex, ()> = Signal::new();

static TX_FRAME: ConstStaticCell<[u8; FRAME_BUF_LEN]> = ConstStaticCell::new([0; FRAME_BUF_LEN]);
static RX_FRAME: ConstStaticCell<[u8; FRAME_BUF_LEN]> = ConstStaticCell::new([0; FRAME_BUF_LEN]);
static SENSOR_COMMAND: ConstStaticCell<[u8; 2]> = ConstStaticCell::new([0; 2]);
static BURST_DATA: ConstStaticCell<[u8; BURST_LEN]> = ConstStaticCell::new([0; BURST_LEN]);

bind_interrupts!(struct Irqs {
    RADIO => RadioIrq;
    TIMER0 => SradIrq;
    TIMER1 => LinkTimerIrq;
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => SpimIrq;
    COMP_LPCOMP => CompIrq;
    GPIOTE => GpioteIrq;
});

fn dispatch(event: LinkEvent) {
    LINK.lock(|link| {
        if let Some(engine) = link.borrow_mut().as_mut() {
            engine.handle(event);
        }
    });
}

struct RadioIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::RADIO> for RadioIrq {
    unsafe fn on_interrupt() {
        let r = pac::RADIO;
        if r.events_txready().read() != 0 {
            r.events_txready().write_value(0);
            dispatch(LinkEvent::TxReady);
        }
        if r.events_disabled().read() != 0 {
            r.events_disabled().write_value(0);
            dispatch(LinkEvent::Disabled);
        }
    }
}

struct LinkTimerIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::TIMER1> for LinkTimerIrq {
    unsafe fn on_interrupt() {
        let t = pac::TIMER1;
        if t.events_compare(0).read() != 0 {
            t.events_compare(0).write_value(0);
            dispatch(LinkEvent::TxSlot);
        }
        if t.events_compare(1).read() != 0 {
            t.events_compare(1).write_value(0);
            dispatch(LinkEvent::RxTimeout);
        }
    }
}

struct SradIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::TIMER0> for SradIrq {
    unsafe fn on_interrupt() {
        let t = pac::TIMER0;
        if t.events_compare(0).read() != 0 {
            t.events_compare(0).write_value(0);
            t.intenclr().write(|w| w.set_compare(0, true));
            dispatch(LinkEvent::Sensor(BusEvent::DelayElapsed));
        }
    }
}

struct SpimIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0>
    for SpimIrq
{
    unsafe fn on_interrupt() {
        let r = pac::SPIM0;
        if r.events_end().read() != 0 {
            r.events_end().write_value(0);
            dispatch(LinkEvent::Sensor(BusEvent::TransferEnd));
        }
    }
}

struct CompIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::COMP_LPCOMP> for CompIrq {
    unsafe fn on_interrupt() {
        let c = pac::COMP;
        if c.events_ready().read() != 0 {
            c.events_ready().write_value(0);
            let above = c.result().read().result() == pac::comp::vals::Result::ABOVE;
            dispatch(LinkEvent::Comparator { above });
        }
    }
}

struct GpioteIrq;

impl interrupt::typelevel::Handler<interrupt::typelevel::GPIOTE> for GpioteIrq {
    unsafe fn on_interrupt() {
        let g = pac::GPIOTE;
        for (ch, button, contact) in [
            (CH_L_NO, 0, Contact::NormallyOpen),
            (CH_L_NC, 0, Contact::NormallyClosed),
            (CH_R_NO, 1, Contact::NormallyOpen),
            (CH_R_NC, 1, Contact::NormallyClosed),
        ] {
            if g.events_in(ch).read() == 0 {
                continue;
            }
            g.events_in(ch).write_value(0);
            LINK.lock(|link| {
                if let Some(engine) = link.borrow_mut().as_mut() {
                    if let Some(next) = engine.inputs_mut().switches[button].edge(contact) {
                        arm_switch(button, next);
                    }
                }
            });
        }

        if g.events_port().read() != 0 {
            g.events_port().write_value(0);
            dispatch(LinkEvent::MotionWake);
        }
    }
}

struct NrfRadio {
    tx: &'static mut [u8; FRAME_BUF_LEN],
    rx: &'static mut [u8; FRAME_BUF_LEN],
}

impl Radio for NrfRadio {
    fn tx_enable(&mut self) {
        let r = pac::RADIO;
        r.packetptr().write_value(self.tx.as_ptr() as u32);
        r.tasks_txen().write_value(1);
    }

    fn load(&mut self, frame: &[u8]) {
        self.tx[..frame.len()].copy_from_slice(frame);
        compiler_fence(Ordering::SeqCst);
    }

    fn start(&mut self) {
        pac::RADIO.tasks_start().write_value(1);
    }

    fn rx_enable(&mut self) {
        let r = pac::RADIO;
        r.packetptr().write_value(self.rx.as_mut_ptr() as u32);
        r.tasks_rxen().write_value(1);
    }

    fn disable(&mut self) {
        pac::RADIO.tasks_disable().write_value(1);
    }

    fn crc_ok(&self) -> bool {
        pac::RADIO.crcstatus().read().crcstatus() == pac::radio::vals::Crcstatus::CRCOK
    }

    fn received(&self) -> &[u8] {
        compiler_fence(Ordering::SeqCst);
        &self.rx[..]
    }
}

struct LinkTimer1;

impl LinkTimer for LinkTimer1 {
    fn set_period(&mut self, us: u32) {
        pac::TIMER1.cc(0).write_value(us);
    }

    fn set_rx_timeout(&mut self, us: u32) {
        let t = pac::TIMER1;
        t.events_compare(1).write_value(0);
        t.cc(1).write_value(us);
    }

    fn start(&mut self) {
        pac::TIMER1.tasks_start().write_value(1);
    }

    fn stop_and_clear(&mut self) {
        let t = pac::TIMER1;
        t.tasks_stop().write_value(1);
        t.tasks_clear().write_value(1);
    }
}

struct SensorBus {
    /// Address byte, or address and value of a write.
    command: &'static mut [u8; 2],
    data: &'static mut [u8; BURST_LEN],
}

fn select() {
    pac::P0.outclr().write(|w| w.set_pin(pins::NCS, true));
}

fn deselect() {
    pac::P0.outset().write(|w| w.set_pin(pins::NCS, true));
}

fn delay_us(us: u32) {
    cortex_m::asm::delay(us * CYCLES_PER_US);
}

fn spim_start(tx: &[u8], rx: &mut [u8]) {
    let r = pac::SPIM0;
    compiler_fence(Ordering::SeqCst);
    r.events_end().write_value(0);
    r.txd().ptr().write_value(tx.as_ptr() as u32);
    r.txd().maxcnt().write(|w| w.set_maxcnt(tx.len() as _));
    r.rxd().ptr().write_value(rx.as_mut_ptr() as u32);
    r.rxd().maxcnt().write(|w| w.set_maxcnt(rx.len() as _));
    r.tasks_start().write_value(1);
}

fn spim_blocking(tx: &[u8], rx: &mut [u8]) {
    let r = pac::SPIM0;
    r.intenclr().write(|w| w.set_end(true));
    spim_start(tx, rx);
    while r.events_end().read() == 0 {}
    r.events_end().write_value(0);
    compiler_fence(Ordering::SeqCst);
}

impl Registers for SensorBus {
    fn read(&mut self, addr: u8) -> u8 {
        // t_SRR / t_SRW
        delay_us(2);
        select();
        spim_blocking(&[addr & !paw3395::WRITE], &mut []);
        delay_us(SRAD_US);
        let mut data = [0u8];
        spim_blocking(&[0], &mut data);
        deselect();
        data[0]
    }

    fn write(&mut self, addr: u8, value: u8) {
        delay_us(REGISTER_GAP_US);
        select();
        spim_blocking(&[addr | paw3395::WRITE, value], &mut []);
        deselect();
    }
}

impl BurstBus for SensorBus {
    fn send_address(&mut self, addr: u8) {
        self.command[0] = addr;
        select();
        pac::SPIM0.intenset().write(|w| w.set_end(true));
        spim_start(&self.command[..1], &mut []);
    }

    fn send_write(&mut self, addr: u8, value: u8) {
        *self.command = [addr | paw3395::WRITE, value];
        select();
        pac::SPIM0.intenset().write(|w| w.set_end(true));
        spim_start(&self.command[..], &mut []);
    }

    fn start_delay(&mut self, us: u32) {
        let t = pac::TIMER0;
        t.cc(0).write_value(us);
        t.intenset().write(|w| w.set_compare(0, true));
        t.tasks_start().write_value(1);
    }

    fn receive(&mut self, len: usize) {
        spim_start(&[], &mut self.data[..len]);
    }

    fn deselect(&mut self) {
        pac::SPIM0.intenclr().write(|w| w.set_end(true));
        deselect();
    }

    fn received(&self) -> [u8; BURST_LEN] {
        compiler_fence(Ordering::SeqCst);
        *self.data
    }
}

struct NrfComparator;

impl Comparator for NrfComparator {
    fn enable(&mut self) {
        pac::COMP
            .enable()
            .write(|w| w.set_enable(pac::comp::vals::Enable::ENABLED));
    }

    fn sample(&mut self, threshold: u8) {
        let c = pac::COMP;
        c.th().write(|w| {
            w.set_thup(threshold);
            w.set_thdown(threshold);
        });
        c.events_ready().write_value(0);
        c.tasks_start().write_value(1);
    }

    fn disable(&mut self) {
        pac::COMP
            .enable()
            .write(|w| w.set_enable(pac::comp::vals::Enable::DISABLED));
    }
}

#[derive(Default)]
struct Inputs {
    switches: [SpdtSwitch; 2],
}

impl MouseInputs for Inputs {
    fn buttons(&self) -> (bool, bool) {
        (self.switches[0].is_pressed(), self.switches[1].is_pressed())
    }

    fn take_wheel(&mut self) -> i8 {
        let q = pac::QDEC;
        q.tasks_rdclracc().write_value(1);
        q.accread().read() as i8
    }
}

struct Power;

impl Sleep for Power {
    fn sleep(&mut self) {
        enter_sleep();
    }

    fn wake(&mut self) {
        exit_sleep();
        WAKE_SIG.signal(());
    }
}

fn psel(pin: usize) -> pac::shared::regs::Psel {
    // port 0, connected
    pac::shared::regs::Psel(pin as u32)
}

fn pin_input(pin: usize, pull: pac::gpio::vals::Pull, sense: pac::gpio::vals::Sense) {
    pac::P0.pin_cnf(pin).write(|w| {
        w.set_dir(pac::gpio::vals::Dir::INPUT);
        w.set_input(pac::gpio::vals::Input::CONNECT);
        w.set_pull(pull);
        w.set_drive(pac::gpio::vals::Drive::S0S1);
        w.set_sense(sense);
    });
}

fn pin_output(pin: usize) {
    pac::P0.pin_cnf(pin).write(|w| {
        w.set_dir(pac::gpio::vals::Dir::OUTPUT);
        w.set_input(pac::gpio::vals::Input::DISCONNECT);
        w.set_pull(pac::gpio::vals::Pull::DISABLED);
        w.set_drive(pac::gpio::vals::Drive::S0S1);
        w.set_sense(pac::gpio::vals::Sense::DISABLED);
    });
}

fn pin_reset(pin: usize, pull: pac::gpio::vals::Pull) {
    pac::P0.pin_cnf(pin).write(|w| {
        w.set_dir(pac::gpio::vals::Dir::INPUT);
        w.set_input(pac::gpio::vals::Input::DISCONNECT);
        w.set_pull(pull);
        w.set_sense(pac::gpio::vals::Sense::DISABLED);
    });
}

fn gpiote_event(ch: usize, pin: usize) {
    pac::GPIOTE.config(ch).write(|w| {
        w.set_mode(pac::gpiote::vals::Mode::EVENT);
        w.set_polarity(pac::gpiote::vals::Polarity::HI_TO_LO);
        w.set_psel(pin as u8);
    });
}

fn gpiote_off(ch: usize) {
    pac::GPIOTE
        .config(ch)
        .write(|w| w.set_mode(pac::gpiote::vals::Mode::DISABLED));
}

/// Watches only the contact the switch expects next.
fn arm_switch(button: usize, next: Contact) {
    let (armed, disarmed, pin) = match (button, next) {
        (0, Contact::NormallyOpen) => (CH_L_NO, CH_L_NC, pins::L_NO),
        (0, Contact::NormallyClosed) => (CH_L_NC, CH_L_NO, pins::L_NC),
        (_, Contact::NormallyOpen) => (CH_R_NO, CH_R_NC, pins::R_NO),
        (_, Contact::NormallyClosed) => (CH_R_NC, CH_R_NO, pins::R_NC),
    };
    gpiote_off(disarmed);
    gpiote_event(armed, pin);
    pac::GPIOTE.events_in(armed).write_value(0);
}

fn clock_setup() {
    let c = pac::CLOCK;
    c.tasks_hfclkstart().write_value(1);
    while c.events_hfclkstarted().read() == 0 {}
    c.events_hfclkstarted().write_value(0);
}

fn timer_setup() {
    for t in [pac::TIMER0, pac::TIMER1] {
        t.tasks_stop().write_value(1);
        t.tasks_clear().write_value(1);
        t.mode().write(|w| w.set_mode(pac::timer::vals::Mode::TIMER));
        t.bitmode()
            .write(|w| w.set_bitmode(pac::timer::vals::Bitmode::_32BIT));
        // 16 MHz / 2^4 = 1 MHz
        t.prescaler().write(|w| w.set_prescaler(4));
        t.shorts().write(|w| {
            w.set_compare_stop(0, true);
            w.set_compare_clear(0, true);
        });
    }

    let t = pac::TIMER1;
    t.intenset().write(|w| {
        w.set_compare(0, true);
        w.set_compare(1, true);
    });
}

fn gpio_setup() {
    for pin in [pins::L_NO, pins::L_NC, pins::R_NO, pins::R_NC, pins::ENC_A, pins::ENC_B] {
        pin_input(pin, pac::gpio::vals::Pull::PULLUP, pac::gpio::vals::Sense::DISABLED);
    }
}

fn gpiote_setup() {
    let g = pac::GPIOTE;
    gpiote_event(CH_L_NO, pins::L_NO);
    gpiote_off(CH_L_NC);
    gpiote_event(CH_R_NO, pins::R_NO);
    gpiote_off(CH_R_NC);
    for ch in [CH_L_NO, CH_L_NC, CH_R_NO, CH_R_NC] {
        g.events_in(ch).write_value(0);
    }
    g.intenset().write(|w| {
        for ch in [CH_L_NO, CH_L_NC, CH_R_NO, CH_R_NC] {
            w.set_in(ch, true);
        }
    });
}

fn qdec_setup() {
    let q = pac::QDEC;
    q.sampleper()
        .write(|w| w.set_sampleper(pac::qdec::vals::Sampleper::_128US));
    q.dbfen().write(|w| w.set_dbfen(false));
    q.psel().a().write_value(psel(pins::ENC_A));
    q.psel().b().write_value(psel(pins::ENC_B));
    q.enable().write(|w| w.set_enable(true));
    q.tasks_start().write_value(1);
}

fn spi_setup() {
    for pin in [pins::NCS, pins::MOSI, pins::SCK] {
        pin_output(pin);
    }
    pin_input(pins::MISO, pac::gpio::vals::Pull::DISABLED, pac::gpio::vals::Sense::DISABLED);
    pac::P0.outset().write(|w| {
        w.set_pin(pins::NCS, true);
        w.set_pin(pins::SCK, true);
    });
    pac::P0.outclr().write(|w| w.set_pin(pins::MOSI, true));

    let r = pac::SPIM0;
    r.psel().miso().write_value(psel(pins::MISO));
    r.psel().mosi().write_value(psel(pins::MOSI));
    r.psel().sck().write_value(psel(pins::SCK));
    // mode 3
    r.config().write(|w| {
        w.set_order(pac::spim::vals::Order::MSB_FIRST);
        w.set_cpha(pac::spim::vals::Cpha::TRAILING);
        w.set_cpol(pac::spim::vals::Cpol::ACTIVE_LOW);
    });
    r.frequency()
        .write(|w| w.set_frequency(pac::spim::vals::Frequency::M4));
    r.enable()
        .write(|w| w.set_enable(pac::spim::vals::Enable::ENABLED));
}

fn comp_setup() {
    let c = pac::COMP;
    // VDDH/5 against fractions of the 1.2 V reference
    c.mode().write(|w| {
        w.set_main(pac::comp::vals::Main::SE);
        w.set_sp(pac::comp::vals::Sp::NORMAL);
    });
    c.psel()
        .write(|w| w.set_psel(pac::comp::vals::Psel::VDDH_DIV5));
    c.refsel()
        .write(|w| w.set_refsel(pac::comp::vals::Refsel::INT1V2));
    c.shorts().write(|w| {
        w.set_ready_sample(true);
        w.set_ready_stop(true);
    });
    c.intenset().write(|w| w.set_ready(true));
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
        .write(|w| w.set_txaddress(air::MOUSE_TO_DONGLE));
    r.rxaddresses()
        .write(|w| w.set_addr(air::DONGLE_TO_MOUSE as usize, true));
    r.shorts().write(|w| {
        w.set_end_disable(true);
        w.set_rxready_start(true);
    });
    r.intenset().write(|w| {
        w.set_txready(true);
        w.set_disabled(true);
    });
}

fn peripherals_setup() {
    pac::POWER.tasks_constlat().write_value(1);
    clock_setup();
    timer_setup();
    gpio_setup();
    gpiote_setup();
    qdec_setup();
    spi_setup();
    comp_setup();
    radio_setup();
}

const LINK_IRQS: [interrupt::Interrupt; 5] = [
    interrupt::RADIO,
    interrupt::TIMER0,
    interrupt::TIMER1,
    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0,
    interrupt::COMP_LPCOMP,
];

fn enable_interrupts() {
    for irq in LINK_IRQS.into_iter().chain([interrupt::GPIOTE]) {
        irq.set_priority(Priority::P1);
        irq.unpend();
        unsafe { irq.enable() };
    }
}

fn enter_sleep() {
    for irq in LINK_IRQS {
        irq.disable();
    }
    pac::TIMER0.intenclr().write(|w| w.0 = 0xFFFF_FFFF);
    pac::TIMER1.intenclr().write(|w| w.0 = 0xFFFF_FFFF);
    pac::GPIOTE.intenclr().write(|w| w.0 = 0xFFFF_FFFF);
    pac::SPIM0.intenclr().write(|w| w.0 = 0xFFFF_FFFF);
    pac::COMP.intenclr().write(|w| w.0 = 0xFFFF_FFFF);
    pac::RADIO.intenclr().write(|w| w.0 = 0xFFFF_FFFF);

    pac::POWER.tasks_lowpwr().write_value(1);

    // radio and comparator are already idle
    for t in [pac::TIMER0, pac::TIMER1] {
        t.tasks_shutdown().write_value(1);
        t.tasks_clear().write_value(1);
    }
    let q = pac::QDEC;
    q.tasks_stop().write_value(1);
    while q.events_stopped().read() == 0 {}
    q.events_stopped().write_value(0);
    q.enable().write(|w| w.set_enable(false));
    pac::SPIM0
        .enable()
        .write(|w| w.set_enable(pac::spim::vals::Enable::DISABLED));
    pac::CLOCK.tasks_hfclkstop().write_value(1);

    for pin in [
        pins::L_NO,
        pins::L_NC,
        pins::R_NO,
        pins::R_NC,
        pins::MISO,
        pins::MOSI,
        pins::SCK,
        pins::ENC_A,
        pins::ENC_B,
    ] {
        pin_reset(pin, pac::gpio::vals::Pull::DISABLED);
    }
    // keep the sensor deselected
    pin_reset(pins::NCS, pac::gpio::vals::Pull::PULLUP);

    let g = pac::GPIOTE;
    for ch in 0..8 {
        gpiote_off(ch);
        g.events_in(ch).write_value(0);
    }
    pin_input(pins::MOTION, pac::gpio::vals::Pull::DISABLED, pac::gpio::vals::Sense::LOW);
    g.events_port().write_value(0);
    g.intenset().write(|w| w.set_port(true));
}

fn exit_sleep() {
    let g = pac::GPIOTE;
    g.intenclr().write(|w| w.0 = 0xFFFF_FFFF);
    pin_reset(pins::MOTION, pac::gpio::vals::Pull::DISABLED);
    g.events_port().write_value(0);

    peripherals_setup();
    enable_interrupts();
}

/// Datasheet power-up sequence. Runs once before the link starts.
async fn sensor_power_up(bus: &mut SensorBus) {
    Timer::after_millis(50).await;

    // reset the sensor's serial port
    select();
    Timer::after_millis(1).await;
    deselect();
    Timer::after_millis(1).await;
    select();

    bus.write(paw3395::POWER_UP_RESET, 0x5A);
    Timer::after_millis(10).await;

    for &(addr, value) in paw3395::POWER_UP_SEQUENCE {
        bus.write(addr, value);
    }
    Timer::after_millis(1).await;

    let mut ready = false;
    for _ in 0..paw3395::POWER_UP_POLLS {
        if bus.read(paw3395::POWER_UP_STATUS) == paw3395::POWER_UP_READY {
            ready = true;
            break;
        }
        Timer::after_millis(1).await;
    }
    if !ready {
        info!("sensor power-up status timeout");
        for &(addr, value) in paw3395::POWER_UP_FALLBACK {
            bus.write(addr, value);
        }
    }
    for &(addr, value) in paw3395::POWER_UP_FINISH {
        bus.write(addr, value);
    }

    for addr in paw3395::MOTION_REGISTERS {
        bus.read(addr);
    }
    paw3395::configure_downshift(bus);

    info!("sensor product id {:02x}", bus.read(paw3395::PRODUCT_ID));
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let mut c = embassy_nrf::config::Config::default();
    c.hfclk_source = HfclkSource::ExternalXtal;
    c.dcdc = DcdcConfig {
        reg0: false,
        reg0_voltage: Some(Reg0Voltage::_3V0),
        reg1: true,
    };
    let p = embassy_nrf::init(c);
    // driven through raw registers from here on
    #[allow(clippy::drop_non_drop)]
    drop((p.RADIO, p.TIMER0, p.TIMER1, p.TWISPI0, p.QDEC));
    info!(
        "hiiri {:08x}{:08x}",
        pac::FICR.deviceid(1).read(),
        pac::FICR.deviceid(0).read()
    );

    peripherals_setup();

    let mut bus = SensorBus {
        command: SENSOR_COMMAND.take(),
        data: BURST_DATA.take(),
    };
    sensor_power_up(&mut bus).await;

    let radio = NrfRadio {
        tx: TX_FRAME.take(),
        rx: RX_FRAME.take(),
    };
    let engine = LinkEngine::new(radio, LinkTimer1, bus, NrfComparator, Inputs::default(), Power);
    LINK.lock(|link| link.borrow_mut().insert(engine).start());
    enable_interrupts();
    info!("link started");

    // blink on wake-up to show there is still power
    loop {
        WAKE_SIG.wait().await;
        pac::P0.dirset().write(|w| w.set_pin(pins::LED, true));
        Timer::after_millis(100).await;
        pac::P0.dirclr().write(|w| w.set_pin(pins::LED, true));
    }
}
