//! Logical switch states and the detent shift register.

use std::fmt;

/// One of the five states the analog line can encode.
///
/// The discriminant doubles as the band index, and for the four rotary
/// states also as the 2-bit code shifted into [`DetentRegister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Symbol {
    Idle = 0,
    S1 = 1,
    S2 = 2,
    S1S2 = 3,
    ButtonDown = 4,
}

impl Symbol {
    /// All symbols in band order.
    pub const ALL: [Symbol; 5] = [
        Symbol::Idle,
        Symbol::S1,
        Symbol::S2,
        Symbol::S1S2,
        Symbol::ButtonDown,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(Symbol::Idle),
            1 => Some(Symbol::S1),
            2 => Some(Symbol::S2),
            3 => Some(Symbol::S1S2),
            4 => Some(Symbol::ButtonDown),
            _ => None,
        }
    }

    /// 2-bit rotary code; `None` for the button, which never enters the
    /// detent register.
    #[inline]
    pub const fn code(self) -> Option<u8> {
        match self {
            Symbol::ButtonDown => None,
            other => Some(other as u8),
        }
    }

    const fn from_code(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Symbol::Idle,
            1 => Symbol::S1,
            2 => Symbol::S2,
            _ => Symbol::S1S2,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Symbol::Idle => "idle",
            Symbol::S1 => "s1",
            Symbol::S2 => "s2",
            Symbol::S1S2 => "s1s2",
            Symbol::ButtonDown => "button",
        };
        f.write_str(s)
    }
}

/// Direction of a completed detent cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Pack four rotary symbols, oldest first, into one byte (newest in the low bits).
const fn pack(seq: [Symbol; 4]) -> u8 {
    let mut bits = 0u8;
    let mut i = 0;
    while i < 4 {
        bits = (bits << 2) | (seq[i] as u8 & 0b11);
        i += 1;
    }
    bits
}

/// Rolling window of the last four confirmed rotary symbols, 2 bits each.
///
/// A full detent ends back at `Idle`, so matching the whole window against a
/// cycle pattern fires exactly once per completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetentRegister(u8);

impl DetentRegister {
    /// `Idle → S1 → S1S2 → S2 → Idle`
    pub const FORWARD: [Symbol; 4] = [Symbol::S1, Symbol::S1S2, Symbol::S2, Symbol::Idle];
    /// `Idle → S2 → S1S2 → S1 → Idle`
    pub const BACKWARD: [Symbol; 4] = [Symbol::S2, Symbol::S1S2, Symbol::S1, Symbol::Idle];

    const FORWARD_BITS: u8 = pack(Self::FORWARD);
    const BACKWARD_BITS: u8 = pack(Self::BACKWARD);

    /// Empty history (four `Idle`s).
    pub const fn new() -> Self {
        Self(0)
    }

    /// Shift in a newly confirmed symbol and report a completed cycle.
    ///
    /// `ButtonDown` carries no rotary code and leaves the register untouched.
    pub fn push(&mut self, symbol: Symbol) -> Option<Direction> {
        let code = symbol.code()?;
        self.0 = (self.0 << 2) | code;
        match self.0 {
            Self::FORWARD_BITS => Some(Direction::Forward),
            Self::BACKWARD_BITS => Some(Direction::Backward),
            _ => None,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The window contents, oldest first.
    pub fn history(self) -> [Symbol; 4] {
        [
            Symbol::from_code(self.0 >> 6),
            Symbol::from_code(self.0 >> 4),
            Symbol::from_code(self.0 >> 2),
            Symbol::from_code(self.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(reg: &mut DetentRegister, seq: &[Symbol]) -> Vec<Direction> {
        seq.iter().filter_map(|&s| reg.push(s)).collect()
    }

    #[test]
    fn codes_are_two_bits_and_button_has_none() {
        for s in Symbol::ALL {
            match s {
                Symbol::ButtonDown => assert_eq!(s.code(), None),
                _ => assert!(s.code().is_some_and(|c| c < 4)),
            }
            assert_eq!(Symbol::from_index(s.index()), Some(s));
        }
        assert_eq!(Symbol::from_index(5), None);
    }

    #[test]
    fn patterns_pack_newest_low() {
        assert_eq!(DetentRegister::FORWARD_BITS, 0b01_11_10_00);
        assert_eq!(DetentRegister::BACKWARD_BITS, 0b10_11_01_00);
    }

    #[test]
    fn forward_cycle_fires_once() {
        let mut reg = DetentRegister::new();
        let seq = [Symbol::S1, Symbol::S1S2, Symbol::S2, Symbol::Idle];
        assert_eq!(feed(&mut reg, &seq), vec![Direction::Forward]);
        assert_eq!(reg.history(), DetentRegister::FORWARD);
    }

    #[test]
    fn backward_cycle_fires_once() {
        let mut reg = DetentRegister::new();
        let seq = [Symbol::S2, Symbol::S1S2, Symbol::S1, Symbol::Idle];
        assert_eq!(feed(&mut reg, &seq), vec![Direction::Backward]);
    }

    #[test]
    fn partial_and_reversed_halfway_cycles_do_not_fire() {
        let mut reg = DetentRegister::new();
        assert!(feed(&mut reg, &[Symbol::S1, Symbol::S1S2, Symbol::Idle]).is_empty());
        // Turn halfway, come back.
        assert!(feed(&mut reg, &[Symbol::S1, Symbol::S1S2, Symbol::S1, Symbol::Idle]).is_empty());
    }

    #[test]
    fn button_does_not_disturb_history() {
        let mut reg = DetentRegister::new();
        feed(&mut reg, &[Symbol::S1, Symbol::S1S2]);
        let before = reg.bits();
        assert_eq!(reg.push(Symbol::ButtonDown), None);
        assert_eq!(reg.bits(), before);
        assert_eq!(
            feed(&mut reg, &[Symbol::S2, Symbol::Idle]),
            vec![Direction::Forward]
        );
    }

    #[test]
    fn consecutive_cycles_each_fire() {
        let mut reg = DetentRegister::new();
        let mut seq = Vec::new();
        for _ in 0..3 {
            seq.extend_from_slice(&DetentRegister::FORWARD);
        }
        assert_eq!(feed(&mut reg, &seq).len(), 3);
    }
}
