//! Mouse side of the radio link.
//!
//! The mouse owns the schedule. Compare channel 0 of the link timer marks the
//! TX slot (the timer stops and clears itself there), compare channel 1 is the
//! RX timeout. Every dongle packet carries the time until the dongle wants the
//! next mouse packet, which becomes the new TX slot.
//!
//! ```text
//! Disabled --TxSlot--> TxRampUp --TxReady--> Tx --Disabled--> Rx
//!    ^                                                        |
//!    +------------------------ Disabled (CRC ok/bad) ---------+
//!    +--- Disabled --- RxTimeoutDisabling <--- RxTimeout -----+
//! ```

use icd::{DonglePacket, MousePacket, Status};

use crate::battery::{BatterySampler, Comparator};
use crate::config::{
    BATTERY_INTERVAL_US, DEFAULT_CYCLE_US, MIN_CYCLE_US, RX_TIMEOUT_DISARMED, RX_TIMEOUT_US,
};
use crate::paw3395::OpMode;
use crate::sensor::{BurstBus, BurstReader, BusEvent};

pub trait Radio {
    /// Enables the transmitter. The frame is loaded on `TxReady`.
    fn tx_enable(&mut self);
    /// Copies `frame` into the TX buffer.
    fn load(&mut self, frame: &[u8]);
    /// Starts the transfer after ramp-up.
    fn start(&mut self);
    /// Enables the receiver; it starts on its own once ramped up.
    fn rx_enable(&mut self);
    fn disable(&mut self);
    fn crc_ok(&self) -> bool;
    /// Frame captured by the last reception.
    fn received(&self) -> &[u8];
}

pub trait LinkTimer {
    /// Compare channel 0, the TX slot.
    fn set_period(&mut self, us: u32);
    /// Compare channel 1, the RX timeout.
    fn set_rx_timeout(&mut self, us: u32);
    fn start(&mut self);
    fn stop_and_clear(&mut self);
}

/// Buttons and scroll wheel.
pub trait MouseInputs {
    fn buttons(&self) -> (bool, bool);
    /// Wheel ticks accumulated since the last call.
    fn take_wheel(&mut self) -> i8;
}

pub trait Sleep {
    /// Powers down everything but the motion wake-up line.
    fn sleep(&mut self);
    /// Re-runs peripheral setup after a motion wake-up.
    fn wake(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioState {
    Disabled,
    TxRampUp,
    Tx,
    Rx,
    RxTimeoutDisabling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Timer compare 0.
    TxSlot,
    /// Timer compare 1.
    RxTimeout,
    /// Radio READY while transmitting.
    TxReady,
    /// Radio DISABLED.
    Disabled,
    /// Sensor bus or t_SRAD timer.
    Sensor(BusEvent),
    /// Comparator READY, `above` is the comparison result.
    Comparator { above: bool },
    /// Motion line edge while asleep.
    MotionWake,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    pub received: u32,
    pub crc_errors: u32,
    pub timeouts: u32,
}

pub struct LinkEngine<R, T, B, C, I, S> {
    radio: R,
    timer: T,
    sensor: BurstReader<B>,
    battery: BatterySampler<C>,
    inputs: I,
    power: S,
    state: RadioState,
    period_us: u32,
    since_battery_us: u32,
    op_mode: OpMode,
    asleep: bool,
    last_sent: MousePacket,
    stats: LinkStats,
}

impl<R, T, B, C, I, S> LinkEngine<R, T, B, C, I, S>
where
    R: Radio,
    T: LinkTimer,
    B: BurstBus,
    C: Comparator,
    I: MouseInputs,
    S: Sleep,
{
    pub fn new(radio: R, timer: T, bus: B, comparator: C, inputs: I, power: S) -> Self {
        Self {
            radio,
            timer,
            sensor: BurstReader::new(bus),
            battery: BatterySampler::new(comparator),
            inputs,
            power,
            state: RadioState::Disabled,
            period_us: DEFAULT_CYCLE_US,
            // first sample goes out with the first dongle packet
            since_battery_us: BATTERY_INTERVAL_US,
            op_mode: OpMode::Run,
            asleep: false,
            last_sent: MousePacket::default(),
            stats: LinkStats::default(),
        }
    }

    /// Programs the default schedule and starts the timer.
    pub fn start(&mut self) {
        self.period_us = DEFAULT_CYCLE_US;
        self.state = RadioState::Disabled;
        self.timer.set_period(self.period_us);
        self.timer.set_rx_timeout(RX_TIMEOUT_DISARMED);
        self.timer.start();
    }

    pub fn handle(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::TxSlot => self.on_tx_slot(),
            LinkEvent::RxTimeout => self.on_rx_timeout(),
            LinkEvent::TxReady => self.on_tx_ready(),
            LinkEvent::Disabled => self.on_disabled(),
            LinkEvent::Sensor(event) => self.sensor.handle(event),
            LinkEvent::Comparator { above } => {
                self.battery.handle(above);
            }
            LinkEvent::MotionWake => self.on_wake(),
        }
    }

    fn on_tx_slot(&mut self) {
        if self.asleep || self.state != RadioState::Disabled {
            trace!("tx slot in {:?}", self.state);
            return;
        }
        self.radio.tx_enable();
        // the burst runs while the radio ramps up
        self.sensor.start();
        self.state = RadioState::TxRampUp;
    }

    fn on_rx_timeout(&mut self) {
        if self.state != RadioState::Rx {
            return;
        }
        self.timer.stop_and_clear();
        self.timer.set_rx_timeout(RX_TIMEOUT_DISARMED);
        self.radio.disable();
        self.state = RadioState::RxTimeoutDisabling;
    }

    fn on_tx_ready(&mut self) {
        if self.state != RadioState::TxRampUp {
            return;
        }
        let packet = self.snapshot();
        self.radio.load(&packet.encode());
        self.radio.start();
        self.last_sent = packet;
        self.state = RadioState::Tx;
    }

    fn snapshot(&mut self) -> MousePacket {
        let (left, right) = self.inputs.buttons();
        let (dx, dy) = match self.sensor.take() {
            Some(burst) => {
                self.op_mode = burst.op_mode;
                (burst.dx, burst.dy)
            }
            // burst still in flight or the bus busy with register writes;
            // that motion goes out with the next slot
            None => (0, 0),
        };

        MousePacket {
            status: Status::new(left, right, self.battery.step()),
            dx,
            dy,
            wheel: self.inputs.take_wheel(),
        }
    }

    fn on_disabled(&mut self) {
        match self.state {
            RadioState::Tx => {
                if self.op_mode == OpMode::Rest3 {
                    self.enter_sleep();
                    return;
                }
                self.radio.rx_enable();
                self.timer.set_rx_timeout(RX_TIMEOUT_US);
                self.timer.start();
                self.state = RadioState::Rx;
            }
            RadioState::RxTimeoutDisabling => {
                self.stats.timeouts = self.stats.timeouts.wrapping_add(1);
                self.timer.start();
                self.state = RadioState::Disabled;
            }
            RadioState::Rx => {
                self.timer.stop_and_clear();
                self.timer.set_rx_timeout(RX_TIMEOUT_DISARMED);
                self.state = RadioState::Disabled;
                self.on_received();
            }
            state => trace!("radio disabled in {:?}", state),
        }
    }

    fn on_received(&mut self) {
        let packet = if self.radio.crc_ok() {
            DonglePacket::decode(self.radio.received()).ok()
        } else {
            None
        };

        let Some(packet) = packet else {
            // keep the last period and retry next slot
            self.stats.crc_errors = self.stats.crc_errors.wrapping_add(1);
            trace!("dongle packet lost, keeping {} us", self.period_us);
            self.timer.start();
            return;
        };

        self.stats.received = self.stats.received.wrapping_add(1);
        self.period_us = u32::from(packet.cycle_us).max(MIN_CYCLE_US);
        self.timer.set_period(self.period_us);
        self.timer.start();

        // applied once the sensor reports the writes done
        if packet.dpi != 0 && packet.dpi != self.sensor.resolution() {
            if self.sensor.set_resolution(packet.dpi) {
                debug!("dpi {} requested", packet.dpi);
            } else {
                trace!("sensor busy, dpi change deferred");
            }
        }

        self.since_battery_us = self.since_battery_us.saturating_add(self.period_us);
        if self.since_battery_us > BATTERY_INTERVAL_US && self.battery.start() {
            self.since_battery_us = 0;
        }
    }

    fn enter_sleep(&mut self) {
        info!("sensor in rest3, sleeping");
        self.timer.stop_and_clear();
        self.timer.set_rx_timeout(RX_TIMEOUT_DISARMED);
        self.power.sleep();
        self.asleep = true;
        self.state = RadioState::Disabled;
    }

    fn on_wake(&mut self) {
        if !self.asleep {
            return;
        }
        info!("motion wake-up");
        self.power.wake();
        self.asleep = false;
        self.op_mode = OpMode::Run;
        self.start();
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    pub fn period_us(&self) -> u32 {
        self.period_us
    }

    pub fn dpi(&self) -> u16 {
        self.sensor.resolution()
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    pub fn last_sent(&self) -> &MousePacket {
        &self.last_sent
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn sensor(&self) -> &BurstReader<B> {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut BurstReader<B> {
        &mut self.sensor
    }

    pub fn battery(&self) -> &BatterySampler<C> {
        &self.battery
    }

    pub fn inputs_mut(&mut self) -> &mut I {
        &mut self.inputs
    }

    pub fn power(&self) -> &S {
        &self.power
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::paw3395::{MOTION_BURST, RES_X_LOW, RIPPLE_CONTROL};
    use crate::sensor::tests::{complete, BusOp, FakeBus};
    use crate::sensor::Phase;
    use icd::FRAME_BUF_LEN;
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq)]
    pub enum RadioOp {
        TxEnable,
        Load(Vec<u8>),
        Start,
        RxEnable,
        Disable,
    }

    #[derive(Default)]
    pub struct FakeRadio {
        pub ops: Vec<RadioOp>,
        pub rx: Vec<u8>,
        pub crc_ok: bool,
    }

    impl FakeRadio {
        pub fn deliver(&mut self, frame: &[u8], crc_ok: bool) {
            self.rx = frame.to_vec();
            self.crc_ok = crc_ok;
        }

        pub fn last_frame(&self) -> Option<&[u8]> {
            self.ops.iter().rev().find_map(|op| match op {
                RadioOp::Load(frame) => Some(frame.as_slice()),
                _ => None,
            })
        }
    }

    impl Radio for FakeRadio {
        fn tx_enable(&mut self) {
            self.ops.push(RadioOp::TxEnable);
        }

        fn load(&mut self, frame: &[u8]) {
            assert!(frame.len() <= FRAME_BUF_LEN);
            self.ops.push(RadioOp::Load(frame.to_vec()));
        }

        fn start(&mut self) {
            self.ops.push(RadioOp::Start);
        }

        fn rx_enable(&mut self) {
            self.ops.push(RadioOp::RxEnable);
        }

        fn disable(&mut self) {
            self.ops.push(RadioOp::Disable);
        }

        fn crc_ok(&self) -> bool {
            self.crc_ok
        }

        fn received(&self) -> &[u8] {
            &self.rx
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum TimerOp {
        Period(u32),
        RxTimeout(u32),
        Start,
        StopClear,
    }

    #[derive(Default)]
    pub struct FakeTimer {
        pub ops: Vec<TimerOp>,
        pub period: u32,
    }

    impl LinkTimer for FakeTimer {
        fn set_period(&mut self, us: u32) {
            self.period = us;
            self.ops.push(TimerOp::Period(us));
        }

        fn set_rx_timeout(&mut self, us: u32) {
            self.ops.push(TimerOp::RxTimeout(us));
        }

        fn start(&mut self) {
            self.ops.push(TimerOp::Start);
        }

        fn stop_and_clear(&mut self) {
            self.ops.push(TimerOp::StopClear);
        }
    }

    #[derive(Default)]
    pub struct FakeComparator {
        pub samples: Vec<u8>,
        pub enabled: bool,
    }

    impl Comparator for FakeComparator {
        fn enable(&mut self) {
            self.enabled = true;
        }

        fn sample(&mut self, threshold: u8) {
            self.samples.push(threshold);
        }

        fn disable(&mut self) {
            self.enabled = false;
        }
    }

    #[derive(Default)]
    pub struct FakeInputs {
        pub left: bool,
        pub right: bool,
        pub wheel: i8,
    }

    impl MouseInputs for FakeInputs {
        fn buttons(&self) -> (bool, bool) {
            (self.left, self.right)
        }

        fn take_wheel(&mut self) -> i8 {
            core::mem::take(&mut self.wheel)
        }
    }

    #[derive(Default)]
    pub struct FakePower {
        pub sleeps: u32,
        pub wakes: u32,
    }

    impl Sleep for FakePower {
        fn sleep(&mut self) {
            self.sleeps += 1;
        }

        fn wake(&mut self) {
            self.wakes += 1;
        }
    }

    pub type TestEngine =
        LinkEngine<FakeRadio, FakeTimer, FakeBus, FakeComparator, FakeInputs, FakePower>;

    pub fn engine() -> TestEngine {
        let mut engine = LinkEngine::new(
            FakeRadio::default(),
            FakeTimer::default(),
            FakeBus::default(),
            FakeComparator::default(),
            FakeInputs::default(),
            FakePower::default(),
        );
        engine.start();
        engine
    }

    /// TX slot through to the radio listening, with the burst finishing
    /// during ramp-up.
    pub fn transmit(engine: &mut TestEngine) {
        engine.handle(LinkEvent::TxSlot);
        complete(engine.sensor_mut());
        engine.handle(LinkEvent::TxReady);
        engine.handle(LinkEvent::Disabled);
    }

    /// One full cycle, including any register writes the reply started.
    fn exchange(engine: &mut TestEngine, reply: &[u8], crc_ok: bool) {
        transmit(engine);
        engine.radio_mut().deliver(reply, crc_ok);
        engine.handle(LinkEvent::Disabled);
        complete(engine.sensor_mut());
    }

    fn reply(cycle_us: u16, dpi: u16) -> [u8; icd::DONGLE_FRAME_LEN] {
        DonglePacket { cycle_us, dpi }.encode()
    }

    fn resolution_writes(engine: &TestEngine) -> usize {
        engine
            .sensor()
            .bus()
            .ops
            .iter()
            .filter(|op| matches!(op, BusOp::Write(RES_X_LOW, _)))
            .count()
    }

    #[test]
    fn transmit_sequence() {
        let mut engine = engine();
        engine.sensor_mut().bus_mut().motion = [0, 0, 3, 0, 0xFE, 0xFF];
        engine.inputs_mut().left = true;
        engine.inputs_mut().wheel = -1;

        engine.handle(LinkEvent::TxSlot);
        assert_eq!(engine.state(), RadioState::TxRampUp);
        assert!(engine.sensor().is_busy());
        complete(engine.sensor_mut());
        engine.handle(LinkEvent::TxReady);
        assert_eq!(engine.state(), RadioState::Tx);
        engine.handle(LinkEvent::Disabled);
        assert_eq!(engine.state(), RadioState::Rx);

        let sent = MousePacket {
            status: Status::new(true, false, 0),
            dx: 3,
            dy: -2,
            wheel: -1,
        };
        assert_eq!(*engine.last_sent(), sent);
        assert_eq!(
            engine.radio().ops,
            [
                RadioOp::TxEnable,
                RadioOp::Load(sent.encode().to_vec()),
                RadioOp::Start,
                RadioOp::RxEnable
            ]
        );
        assert_eq!(
            &engine.timer().ops[engine.timer().ops.len() - 2..],
            [TimerOp::RxTimeout(RX_TIMEOUT_US), TimerOp::Start]
        );
    }

    #[test]
    fn stale_burst_not_resent() {
        let mut engine = engine();
        engine.sensor_mut().bus_mut().motion = [0, 0, 10, 0, 10, 0];
        exchange(&mut engine, &reply(900, 800), true);
        assert_eq!(engine.last_sent().dx, 10);

        // the next burst does not finish before ramp-up
        engine.handle(LinkEvent::TxSlot);
        engine.handle(LinkEvent::TxReady);
        assert_eq!(engine.last_sent().dx, 0);
        assert_eq!(engine.last_sent().dy, 0);
    }

    #[test]
    fn cycle_count_floor() {
        for cycle in [0u16, 1, 100, 200, 249] {
            let mut engine = engine();
            exchange(&mut engine, &reply(cycle, 800), true);
            assert_eq!(engine.period_us(), MIN_CYCLE_US);
            assert_eq!(engine.timer().period, MIN_CYCLE_US);
        }

        let mut engine = engine();
        exchange(&mut engine, &reply(250, 800), true);
        assert_eq!(engine.timer().period, 250);
        exchange(&mut engine, &reply(937, 800), true);
        assert_eq!(engine.timer().period, 937);
    }

    #[test]
    fn crc_failures_keep_schedule() {
        let mut engine = engine();
        exchange(&mut engine, &reply(900, 800), true);
        let periods = |engine: &TestEngine| {
            engine
                .timer()
                .ops
                .iter()
                .filter(|op| matches!(op, TimerOp::Period(_)))
                .count()
        };
        let programmed = periods(&engine);

        for _ in 0..20 {
            exchange(&mut engine, &reply(300, 3200), false);
            assert_eq!(engine.state(), RadioState::Disabled);
            assert_eq!(engine.timer().ops.last(), Some(&TimerOp::Start));
        }

        assert_eq!(periods(&engine), programmed);
        assert_eq!(engine.timer().period, 900);
        assert_eq!(engine.dpi(), 800);
        assert_eq!(engine.stats().crc_errors, 20);
    }

    #[test]
    fn malformed_reply_counts_as_crc_error() {
        let mut engine = engine();
        exchange(&mut engine, &[9, 1, 2, 3, 4], true);
        assert_eq!(engine.stats().crc_errors, 1);
        assert_eq!(engine.timer().period, DEFAULT_CYCLE_US);
    }

    #[test]
    fn rx_timeout_resumes_schedule() {
        let mut engine = engine();
        transmit(&mut engine);
        engine.handle(LinkEvent::RxTimeout);
        assert_eq!(engine.state(), RadioState::RxTimeoutDisabling);
        assert_eq!(engine.radio().ops.last(), Some(&RadioOp::Disable));

        engine.handle(LinkEvent::Disabled);
        assert_eq!(engine.state(), RadioState::Disabled);
        assert_eq!(
            &engine.timer().ops[engine.timer().ops.len() - 3..],
            [
                TimerOp::StopClear,
                TimerOp::RxTimeout(RX_TIMEOUT_DISARMED),
                TimerOp::Start
            ]
        );
        assert_eq!(engine.stats().timeouts, 1);

        engine.handle(LinkEvent::TxSlot);
        assert_eq!(engine.state(), RadioState::TxRampUp);
    }

    #[test]
    fn late_timeout_ignored() {
        let mut engine = engine();
        exchange(&mut engine, &reply(900, 800), true);
        let ops = engine.radio().ops.len();
        engine.handle(LinkEvent::RxTimeout);
        assert_eq!(engine.state(), RadioState::Disabled);
        assert_eq!(engine.radio().ops.len(), ops);
    }

    #[test]
    fn dpi_applied_once() {
        let mut engine = engine();
        for _ in 0..5 {
            exchange(&mut engine, &reply(900, 1600), true);
        }
        assert_eq!(engine.dpi(), 1600);
        assert_eq!(resolution_writes(&engine), 1);

        exchange(&mut engine, &reply(900, 9600), true);
        assert_eq!(resolution_writes(&engine), 2);
        assert!(engine
            .sensor()
            .bus()
            .ops
            .iter()
            .any(|op| matches!(op, BusOp::Write(RIPPLE_CONTROL, _))));
    }

    #[test]
    fn dpi_deferred_while_burst_in_flight() {
        let mut engine = engine();
        engine.handle(LinkEvent::TxSlot);
        // burst stays in flight through the whole exchange
        engine.handle(LinkEvent::TxReady);
        engine.handle(LinkEvent::Disabled);
        engine.radio_mut().deliver(&reply(900, 1600), true);
        engine.handle(LinkEvent::Disabled);
        assert_eq!(engine.dpi(), 0);
        assert_eq!(resolution_writes(&engine), 0);

        complete(engine.sensor_mut());
        exchange(&mut engine, &reply(900, 1600), true);
        exchange(&mut engine, &reply(900, 1600), true);
        assert_eq!(engine.dpi(), 1600);
        assert_eq!(resolution_writes(&engine), 1);
    }

    #[test]
    fn dpi_takes_effect_after_the_writes() {
        let mut engine = engine();
        transmit(&mut engine);
        engine.radio_mut().deliver(&reply(900, 1600), true);
        engine.handle(LinkEvent::Disabled);
        assert_eq!(engine.sensor().phase(), Phase::RegWrite);
        assert_eq!(engine.dpi(), 0);
        assert_eq!(
            engine.sensor().bus().ops.last(),
            Some(&BusOp::Write(RES_X_LOW, 32))
        );

        // the next slot finds the bus taken and sends no motion
        engine.sensor_mut().bus_mut().motion = [0, 0, 7, 0, 0, 0];
        let bursts = |engine: &TestEngine| {
            engine
                .sensor()
                .bus()
                .ops
                .iter()
                .filter(|op| **op == BusOp::Address(MOTION_BURST))
                .count()
        };
        let started = bursts(&engine);
        engine.handle(LinkEvent::TxSlot);
        assert_eq!(bursts(&engine), started);

        engine.handle(LinkEvent::Sensor(BusEvent::TransferEnd));
        assert_eq!(engine.sensor().phase(), Phase::RegGap);
        engine.handle(LinkEvent::Sensor(BusEvent::DelayElapsed));
        assert_eq!(engine.sensor().phase(), Phase::RegWrite);
        assert_eq!(engine.dpi(), 0);

        complete(engine.sensor_mut());
        assert_eq!(engine.dpi(), 1600);
        engine.handle(LinkEvent::TxReady);
        assert_eq!(engine.last_sent().dx, 0);

        engine.handle(LinkEvent::Disabled);
        engine.radio_mut().deliver(&reply(900, 1600), true);
        engine.handle(LinkEvent::Disabled);
        assert_eq!(engine.sensor().phase(), Phase::Idle);
        transmit(&mut engine);
        assert_eq!(engine.last_sent().dx, 7);
    }

    #[test]
    fn battery_sampled_on_interval() {
        let mut engine = engine();
        // first valid packet starts a sample
        exchange(&mut engine, &reply(1000, 800), true);
        assert!(engine.battery().is_active());
        assert_eq!(engine.battery().comparator().samples, [44]);

        engine.handle(LinkEvent::Comparator { above: false });
        engine.handle(LinkEvent::Comparator { above: true });
        assert!(!engine.battery().is_active());
        assert_eq!(engine.battery().step(), 43);

        exchange(&mut engine, &reply(1000, 800), true);
        assert_eq!(engine.last_sent().status.battery_step(), 43);

        // no new sample until another interval has accumulated
        for _ in 0..(BATTERY_INTERVAL_US / 1000) - 1 {
            exchange(&mut engine, &reply(1000, 800), true);
        }
        assert!(!engine.battery().is_active());
        exchange(&mut engine, &reply(1000, 800), true);
        assert!(engine.battery().is_active());
    }

    #[test]
    fn battery_sample_not_restarted_while_active() {
        let mut engine = engine();
        exchange(&mut engine, &reply(1000, 800), true);
        let mut rounds = 0;
        while rounds <= BATTERY_INTERVAL_US / 1000 + 1 {
            exchange(&mut engine, &reply(1000, 800), true);
            rounds += 1;
        }
        // comparator never answered, so the first sample is still pending
        assert_eq!(engine.battery().comparator().samples, [44]);
    }

    #[test]
    fn sleeps_in_rest3_and_wakes_on_motion() {
        let mut engine = engine();
        engine.sensor_mut().bus_mut().motion = [0b11, 0, 0, 0, 0, 0];
        transmit(&mut engine);
        assert!(engine.is_asleep());
        assert_eq!(engine.power().sleeps, 1);
        assert_eq!(engine.state(), RadioState::Disabled);
        assert_ne!(engine.radio().ops.last(), Some(&RadioOp::RxEnable));

        let ops = engine.radio().ops.len();
        engine.handle(LinkEvent::TxSlot);
        assert_eq!(engine.radio().ops.len(), ops);

        engine.sensor_mut().bus_mut().motion = [0, 0, 1, 0, 0, 0];
        engine.handle(LinkEvent::MotionWake);
        assert!(!engine.is_asleep());
        assert_eq!(engine.power().wakes, 1);
        assert_eq!(engine.timer().period, DEFAULT_CYCLE_US);
        assert_eq!(engine.timer().ops.last(), Some(&TimerOp::Start));

        transmit(&mut engine);
        assert_eq!(engine.state(), RadioState::Rx);
    }
}
