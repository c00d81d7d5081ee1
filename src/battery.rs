//! Battery voltage estimation by walking the comparator threshold down.
//!
//! The comparator looks at VDDH/5 against a 64-step reference ladder. Starting
//! at [`LADDER_START`] the threshold is lowered one step per comparison until
//! the input reads above it, or the ladder drops under [`LADDER_FLOOR`]. The
//! step where the walk stopped is the battery level carried in the status byte.

use crate::config::{LADDER_FLOOR, LADDER_START};

/// Low-power comparator, one comparison per `sample`.
pub trait Comparator {
    fn enable(&mut self);
    /// Sets the threshold step and starts a comparison. Completion comes back
    /// through [`BatterySampler::handle`].
    fn sample(&mut self, threshold: u8);
    fn disable(&mut self);
}

pub struct BatterySampler<C> {
    comp: C,
    active: bool,
    ladder: u8,
    step: u8,
}

impl<C: Comparator> BatterySampler<C> {
    pub const fn new(comp: C) -> Self {
        Self {
            comp,
            active: false,
            ladder: LADDER_START,
            step: 0,
        }
    }

    /// Begins a measurement. Returns `false` if one is already running.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.ladder = LADDER_START;
        self.comp.enable();
        self.comp.sample(self.ladder);
        true
    }

    /// Comparison result, `above` when the input is over the threshold.
    /// Returns the new step once the walk finishes.
    pub fn handle(&mut self, above: bool) -> Option<u8> {
        if !self.active {
            trace!("comparator result while idle");
            return None;
        }

        if above || self.ladder < LADDER_FLOOR {
            self.comp.disable();
            self.active = false;
            self.step = self.ladder;
            debug!("battery step {}", self.step);
            return Some(self.step);
        }

        self.ladder -= 1;
        self.comp.sample(self.ladder);
        None
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last finished measurement, 0 until one completes.
    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn comparator(&self) -> &C {
        &self.comp
    }

    pub fn comparator_mut(&mut self) -> &mut C {
        &mut self.comp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Debug, PartialEq)]
    enum Op {
        Enable,
        Sample(u8),
        Disable,
    }

    #[derive(Default)]
    struct Recorder(Vec<Op>);

    impl Comparator for Recorder {
        fn enable(&mut self) {
            self.0.push(Op::Enable);
        }

        fn sample(&mut self, threshold: u8) {
            self.0.push(Op::Sample(threshold));
        }

        fn disable(&mut self) {
            self.0.push(Op::Disable);
        }
    }

    #[test]
    fn walk_stops_when_above() {
        let mut bat = BatterySampler::new(Recorder::default());
        assert!(bat.start());
        assert_eq!(bat.handle(false), None);
        assert_eq!(bat.handle(false), None);
        assert_eq!(bat.handle(true), Some(42));
        assert_eq!(bat.step(), 42);
        assert!(!bat.is_active());
        assert_eq!(
            bat.comparator().0,
            [
                Op::Enable,
                Op::Sample(44),
                Op::Sample(43),
                Op::Sample(42),
                Op::Disable
            ]
        );
    }

    #[test]
    fn walk_stops_at_floor() {
        let mut bat = BatterySampler::new(Recorder::default());
        bat.start();
        let mut result = None;
        for _ in 0..64 {
            result = bat.handle(false);
            if result.is_some() {
                break;
            }
        }
        assert_eq!(result, Some(LADDER_FLOOR - 1));
        assert_eq!(bat.comparator().0.last(), Some(&Op::Disable));
    }

    #[test]
    fn single_outstanding_measurement() {
        let mut bat = BatterySampler::new(Recorder::default());
        assert!(bat.start());
        assert!(!bat.start());
        assert_eq!(bat.comparator().0, [Op::Enable, Op::Sample(44)]);
    }

    #[test]
    fn stray_result_ignored() {
        let mut bat = BatterySampler::new(Recorder::default());
        assert_eq!(bat.handle(true), None);
        assert_eq!(bat.step(), 0);
        assert!(bat.comparator().0.is_empty());
    }
}
