//! Simulated resistor-ladder knob.
//!
//! Models the physical switch: each contact combination pulls the shared
//! analog line to a nominal level, the ADC adds a little noise, and every
//! change of contacts bounces between the old and new level for a few
//! conversions before settling.

use std::collections::VecDeque;
use std::time::Duration;

use knob_traits::SampleSource;

use crate::error::HwError;

/// Mechanical contact combination of the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contact {
    /// Detent rest position, both rotary contacts open.
    Open,
    /// First rotary contact closed.
    A,
    /// Second rotary contact closed.
    B,
    /// Both rotary contacts closed (mid-detent).
    Both,
    /// Push button pressed; shorts the line to ground.
    Button,
}

/// Nominal 10-bit conversion result for each contact combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    pub open: u16,
    pub a: u16,
    pub b: u16,
    pub both: u16,
    pub button: u16,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            open: 1015,
            a: 760,
            b: 520,
            both: 300,
            button: 4,
        }
    }
}

impl Levels {
    pub fn level(&self, contact: Contact) -> u16 {
        match contact {
            Contact::Open => self.open,
            Contact::A => self.a,
            Contact::B => self.b,
            Contact::Both => self.both,
            Contact::Button => self.button,
        }
    }
}

/// A sequence of contact states, each held for a number of conversions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<(Contact, u32)>,
}

/// Conversions per held position in the canned gestures.
pub const HOLD: u32 = 40;

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(mut self, contact: Contact, samples: u32) -> Self {
        self.steps.push((contact, samples));
        self
    }

    pub fn then(mut self, other: Plan) -> Self {
        self.steps.extend(other.steps);
        self
    }

    pub fn steps(&self) -> &[(Contact, u32)] {
        &self.steps
    }

    pub fn total_samples(&self) -> u64 {
        self.steps.iter().map(|&(_, n)| u64::from(n)).sum()
    }

    /// Settle at rest.
    pub fn rest(samples: u32) -> Self {
        Self::new().hold(Contact::Open, samples)
    }

    /// One detent clockwise: Open → A → Both → B → Open.
    pub fn forward() -> Self {
        Self::new()
            .hold(Contact::A, HOLD)
            .hold(Contact::Both, HOLD)
            .hold(Contact::B, HOLD)
            .hold(Contact::Open, HOLD)
    }

    /// One detent counter-clockwise: Open → B → Both → A → Open.
    pub fn backward() -> Self {
        Self::new()
            .hold(Contact::B, HOLD)
            .hold(Contact::Both, HOLD)
            .hold(Contact::A, HOLD)
            .hold(Contact::Open, HOLD)
    }

    /// Press and release, then stay at rest long enough for the single
    /// click to be confirmed.
    pub fn click() -> Self {
        Self::new()
            .hold(Contact::Button, HOLD)
            .hold(Contact::Open, 8_100)
    }

    /// Two quick presses followed by a rest period.
    pub fn double_click() -> Self {
        Self::new()
            .hold(Contact::Button, HOLD)
            .hold(Contact::Open, HOLD * 2)
            .hold(Contact::Button, HOLD)
            .hold(Contact::Open, 8_100)
    }

    /// Hold the button past the long-press threshold, then release.
    pub fn long_press() -> Self {
        Self::new()
            .hold(Contact::Button, 65_600)
            .hold(Contact::Open, HOLD)
    }

    /// Slowly turn through every intermediate position, `rounds` times.
    /// Feeds the calibration histogram with all three middle levels.
    pub fn sweep(rounds: u32) -> Self {
        let mut plan = Self::new();
        for _ in 0..rounds {
            plan = plan
                .hold(Contact::Open, 25)
                .hold(Contact::A, 100)
                .hold(Contact::Both, 100)
                .hold(Contact::B, 100);
        }
        plan.hold(Contact::Open, HOLD)
    }
}

/// Xorshift32 PRNG; deterministic for a given seed.
#[derive(Debug, Clone)]
struct XorShift(u32);

impl XorShift {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Triangular noise in `[-amp, amp]`, peaking at zero.
    fn noise(&mut self, amp: u16) -> i32 {
        if amp == 0 {
            return 0;
        }
        let span = u32::from(amp) + 1;
        let a = (self.next_u32() % span) as i32;
        let b = (self.next_u32() % span) as i32;
        a - b
    }
}

/// Simulated ADC attached to the ladder, replaying a [`Plan`].
#[derive(Debug, Clone)]
pub struct SimulatedLadder {
    levels: Levels,
    noise_amp: u16,
    bounce: u32,
    rng: XorShift,
    steps: VecDeque<(Contact, u32)>,
    current: Option<Contact>,
    remaining: u32,
    bouncing_from: Option<Contact>,
    bounce_left: u32,
    delivered: u64,
}

impl SimulatedLadder {
    pub fn new(plan: Plan) -> Self {
        Self {
            levels: Levels::default(),
            noise_amp: 2,
            bounce: 3,
            rng: XorShift(0x2545_F491),
            steps: plan.steps.into_iter().collect(),
            current: None,
            remaining: 0,
            bouncing_from: None,
            bounce_left: 0,
            delivered: 0,
        }
    }

    pub fn with_levels(mut self, levels: Levels) -> Self {
        self.levels = levels;
        self
    }

    /// Peak noise in ADC counts added to every conversion.
    pub fn with_noise(mut self, amp: u16) -> Self {
        self.noise_amp = amp;
        self
    }

    /// Conversions of contact bounce after each position change.
    pub fn with_bounce(mut self, samples: u32) -> Self {
        self.bounce = samples;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.rng = XorShift(seed.max(1));
        self
    }

    /// Conversions delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn advance(&mut self) -> Option<Contact> {
        while self.remaining == 0 {
            let (next, hold) = self.steps.pop_front()?;
            if self.current.is_some_and(|c| c != next) {
                self.bouncing_from = self.current;
                self.bounce_left = self.bounce.min(hold);
            }
            self.current = Some(next);
            self.remaining = hold;
        }
        self.remaining -= 1;
        self.current
    }

    fn next_sample(&mut self) -> Option<u16> {
        let contact = self.advance()?;
        // Bounce alternates between the previous and new level.
        let shown = match self.bouncing_from {
            Some(prev) if self.bounce_left > 0 => {
                self.bounce_left -= 1;
                if self.bounce_left % 2 == 1 { prev } else { contact }
            }
            _ => {
                self.bouncing_from = None;
                contact
            }
        };
        let nominal = i32::from(self.levels.level(shown));
        let noisy = (nominal + self.rng.noise(self.noise_amp)).clamp(0, 1023);
        self.delivered += 1;
        u16::try_from(noisy).ok()
    }
}

impl Iterator for SimulatedLadder {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        self.next_sample()
    }
}

impl SampleSource for SimulatedLadder {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        self.next_sample()
            .ok_or_else(|| Box::new(HwError::Exhausted) as Box<dyn std::error::Error + Send + Sync>)
    }
}

/// Replays a fixed list of raw conversions, then reports exhaustion.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    samples: VecDeque<u16>,
}

impl ScriptedSource {
    pub fn new(samples: impl IntoIterator<Item = u16>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl SampleSource for ScriptedSource {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        self.samples
            .pop_front()
            .ok_or_else(|| Box::new(HwError::Exhausted) as Box<dyn std::error::Error + Send + Sync>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn plan_lengths_add_up() {
        let plan = Plan::rest(10).then(Plan::forward());
        assert_eq!(plan.total_samples(), 10 + 4 * u64::from(HOLD));
        let delivered = SimulatedLadder::new(plan).count();
        assert_eq!(delivered as u64, 10 + 4 * u64::from(HOLD));
    }

    #[test]
    fn noiseless_source_emits_nominal_levels() {
        let plan = Plan::new().hold(Contact::A, 3).hold(Contact::Both, 3);
        let samples: Vec<u16> = SimulatedLadder::new(plan)
            .with_noise(0)
            .with_bounce(0)
            .collect();
        assert_eq!(samples, vec![760, 760, 760, 300, 300, 300]);
    }

    #[test]
    fn bounce_alternates_before_settling() {
        let plan = Plan::new().hold(Contact::Open, 2).hold(Contact::Button, 6);
        let samples: Vec<u16> = SimulatedLadder::new(plan)
            .with_noise(0)
            .with_bounce(3)
            .collect();
        assert_eq!(samples, vec![1015, 1015, 4, 1015, 4, 4, 4, 4]);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(3, 7)]
    #[case(3, 0xDEAD_BEEF)]
    #[case(20, 42)]
    fn noise_stays_within_amplitude(#[case] noise: u16, #[case] seed: u32) {
        let plan = Plan::new().hold(Contact::B, 2_000);
        let ladder = SimulatedLadder::new(plan).with_noise(noise).with_seed(seed);
        let range = 520 - noise..=520 + noise;
        assert!(ladder.into_iter().all(|v| range.contains(&v)));
    }

    #[test]
    fn scripted_source_reports_exhaustion() {
        let mut src = ScriptedSource::new([1, 2]);
        assert_eq!(src.read(Duration::ZERO).unwrap(), 1);
        assert_eq!(src.read(Duration::ZERO).unwrap(), 2);
        let err = src.read(Duration::ZERO).unwrap_err();
        assert!(err.downcast_ref::<HwError>().is_some());
    }
}
