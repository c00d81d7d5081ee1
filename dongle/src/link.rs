//! Dongle side of the radio link.
//!
//! The dongle only listens. Every mouse packet is answered right away with
//! the time left until the host's next HID poll, so the mouse can place its
//! next transmission just ahead of it.
//!
//! ```text
//! Idle --start--> Rx --Disabled (reply sent)--> Tx --Disabled--> Rx
//! ```

use icd::{DonglePacket, MousePacket};

use crate::config::CYCLE_LEEWAY_US;
use crate::mailbox::{Reader, Writer};

pub trait Radio {
    /// Sends `frame`. The transfer starts on its own after ramp-up and the
    /// radio disables itself when it ends.
    fn transmit(&mut self, frame: &[u8]);
    /// Enables the receiver, same shortcuts as `transmit`.
    fn receive(&mut self);
    fn crc_ok(&self) -> bool;
    /// Frame captured by the last reception.
    fn received(&self) -> &[u8];
}

/// Microsecond timer restarted at every HID poll.
pub trait PollClock {
    /// The host took a report: latch the poll period and restart counting.
    fn mark_poll(&mut self);
    /// Length of the last poll period.
    fn poll_period(&self) -> u32;
    /// Time elapsed since the last poll.
    fn since_poll(&mut self) -> u32;
}

/// Lets the USB side start the radio once the host has configured the device.
pub trait StartLink {
    fn start_link(&mut self);
}

/// Time the mouse should wait before its next packet.
pub fn cycle_count(poll_period_us: u32, since_poll_us: u32) -> u16 {
    let cycle = poll_period_us
        .saturating_sub(since_poll_us)
        .saturating_sub(CYCLE_LEEWAY_US);
    cycle.min(u16::MAX as u32) as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Idle,
    Rx,
    Tx,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    pub received: u32,
    pub crc_errors: u32,
}

pub struct DongleLink<'a, R, P> {
    radio: R,
    clock: P,
    mouse: Writer<'a, MousePacket>,
    dpi: Reader<'a, u16>,
    state: LinkState,
    stats: LinkStats,
}

impl<'a, R: Radio, P: PollClock> DongleLink<'a, R, P> {
    pub fn new(radio: R, clock: P, mouse: Writer<'a, MousePacket>, dpi: Reader<'a, u16>) -> Self {
        Self {
            radio,
            clock,
            mouse,
            dpi,
            state: LinkState::Idle,
            stats: LinkStats::default(),
        }
    }

    /// Starts listening for the mouse. No-op once running.
    pub fn start(&mut self) {
        if self.state == LinkState::Idle {
            info!("listening for the mouse");
            self.radio.receive();
            self.state = LinkState::Rx;
        }
    }

    /// Radio DISABLED event.
    pub fn radio_disabled(&mut self) {
        match self.state {
            LinkState::Rx => {
                let since = self.clock.since_poll();
                let reply = DonglePacket {
                    cycle_us: cycle_count(self.clock.poll_period(), since),
                    dpi: self.dpi.latest(),
                };
                self.radio.transmit(&reply.encode());
                self.state = LinkState::Tx;

                match MousePacket::decode(self.radio.received()) {
                    Ok(packet) if self.radio.crc_ok() => {
                        self.mouse.publish(packet);
                        self.stats.received = self.stats.received.wrapping_add(1);
                    }
                    result => {
                        trace!("bad mouse packet: {:?}", result.err());
                        self.stats.crc_errors = self.stats.crc_errors.wrapping_add(1);
                    }
                }
            }
            LinkState::Tx => {
                self.radio.receive();
                self.state = LinkState::Rx;
            }
            LinkState::Idle => trace!("radio disabled while idle"),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
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
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mailbox::Mailbox;
    use icd::Status;
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RadioOp {
        Transmit(Vec<u8>),
        Receive,
    }

    #[derive(Default)]
    pub struct FakeRadio {
        pub ops: Vec<RadioOp>,
        pub frame: Vec<u8>,
        pub crc: bool,
    }

    impl Radio for FakeRadio {
        fn transmit(&mut self, frame: &[u8]) {
            self.ops.push(RadioOp::Transmit(frame.to_vec()));
        }

        fn receive(&mut self) {
            self.ops.push(RadioOp::Receive);
        }

        fn crc_ok(&self) -> bool {
            self.crc
        }

        fn received(&self) -> &[u8] {
            &self.frame
        }
    }

    #[derive(Default, Clone, Copy)]
    pub struct FakeClock {
        pub period: u32,
        pub since: u32,
        pub polls: u32,
    }

    impl PollClock for FakeClock {
        fn mark_poll(&mut self) {
            self.polls += 1;
        }

        fn poll_period(&self) -> u32 {
            self.period
        }

        fn since_poll(&mut self) -> u32 {
            self.since
        }
    }

    #[test]
    fn cycle_count_bounds() {
        assert_eq!(cycle_count(1000, 300), 600);
        assert_eq!(cycle_count(1000, 950), 0);
        assert_eq!(cycle_count(1000, 2000), 0);
        assert_eq!(cycle_count(200_000, 0), u16::MAX);
    }

    #[test]
    fn replies_to_every_packet() {
        let mouse = Mailbox::new(MousePacket::default());
        let dpi = Mailbox::new(1600u16);
        let (mouse_tx, mouse_rx) = mouse.split().unwrap();
        let (_, dpi_rx) = dpi.split().unwrap();
        let clock = FakeClock {
            period: 1000,
            since: 300,
            polls: 0,
        };
        let mut link = DongleLink::new(FakeRadio::default(), clock, mouse_tx, dpi_rx);

        link.radio_disabled();
        assert_eq!(link.state(), LinkState::Idle);
        link.start();
        link.start();
        assert_eq!(link.radio().ops, [RadioOp::Receive]);

        let packet = MousePacket {
            status: Status::new(true, false, 40),
            dx: -5,
            dy: 300,
            wheel: 1,
        };
        link.radio_mut().frame = packet.encode().to_vec();
        link.radio_mut().crc = true;
        link.radio_disabled();
        assert_eq!(link.state(), LinkState::Tx);
        assert_eq!(mouse_rx.latest(), packet);
        let reply = DonglePacket {
            cycle_us: 600,
            dpi: 1600,
        };
        assert_eq!(
            link.radio().ops[1],
            RadioOp::Transmit(reply.encode().to_vec())
        );

        link.radio_disabled();
        assert_eq!(link.state(), LinkState::Rx);
        assert_eq!(link.radio().ops[2], RadioOp::Receive);
        assert_eq!(link.stats().received, 1);
    }

    #[test]
    fn bad_packets_are_answered_but_not_published() {
        let mouse = Mailbox::new(MousePacket::default());
        let dpi = Mailbox::new(800u16);
        let (mouse_tx, mouse_rx) = mouse.split().unwrap();
        let (_, dpi_rx) = dpi.split().unwrap();
        let mut link = DongleLink::new(FakeRadio::default(), FakeClock::default(), mouse_tx, dpi_rx);
        link.start();

        let packet = MousePacket {
            dx: 7,
            ..MousePacket::default()
        };
        link.radio_mut().frame = packet.encode().to_vec();
        link.radio_mut().crc = false;
        link.radio_disabled();
        assert_eq!(mouse_rx.latest(), MousePacket::default());

        link.radio_disabled();
        link.radio_mut().frame = [4, 0, 0, 0, 0, 0, 0].to_vec();
        link.radio_mut().crc = true;
        link.radio_disabled();
        assert_eq!(mouse_rx.latest(), MousePacket::default());

        assert_eq!(link.stats().crc_errors, 2);
        let replies = link
            .radio()
            .ops
            .iter()
            .filter(|op| matches!(op, RadioOp::Transmit(_)))
            .count();
        assert_eq!(replies, 2);
    }
}
