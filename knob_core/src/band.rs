//! Voltage bands, the band table, and its persisted layout.

use std::fmt;

use knob_traits::{ERASED_WORD, WordStore};

use crate::error::{KnobError, Result};
use crate::hw_error::map_hw_error;
use crate::symbol::Symbol;

/// Number of bands; one per [`Symbol`].
pub const BAND_COUNT: usize = Symbol::ALL.len();

/// Bytes occupied by one persisted band (two words).
pub const SLOT_BYTES: u16 = 4;

/// Inclusive range of raw conversion values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Band {
    pub low: u16,
    pub high: u16,
}

impl Band {
    /// Both words never written.
    pub const ERASED: Band = Band {
        low: ERASED_WORD,
        high: ERASED_WORD,
    };

    pub const fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    /// Smallest band covering both values, whichever order they come in.
    pub const fn spanning(a: u16, b: u16) -> Self {
        if a <= b { Self::new(a, b) } else { Self::new(b, a) }
    }

    #[inline]
    pub const fn contains(&self, raw: u16) -> bool {
        self.low <= raw && raw <= self.high
    }

    /// Either word still holds the erased value.
    #[inline]
    pub const fn has_erased_word(&self) -> bool {
        self.low == ERASED_WORD || self.high == ERASED_WORD
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} - {}]", self.low, self.high)
    }
}

/// The five bands, indexed by [`Symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BandTable([Band; BAND_COUNT]);

impl Default for BandTable {
    fn default() -> Self {
        Self::ERASED
    }
}

impl BandTable {
    pub const ERASED: BandTable = BandTable([Band::ERASED; BAND_COUNT]);

    pub const fn new(bands: [Band; BAND_COUNT]) -> Self {
        Self(bands)
    }

    #[inline]
    pub fn band(&self, symbol: Symbol) -> Band {
        self.0[symbol.index()]
    }

    pub fn bands(&self) -> &[Band; BAND_COUNT] {
        &self.0
    }

    /// Map a raw conversion to its symbol; the first matching band in index
    /// order wins. `None` marks an outlier.
    pub fn classify(&self, raw: u16) -> Option<Symbol> {
        self.0
            .iter()
            .position(|b| b.contains(raw))
            .and_then(Symbol::from_index)
    }

    /// Every word of every slot is erased (storage never written).
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|b| *b == Band::ERASED)
    }

    /// At least one word anywhere still holds the erased value.
    pub fn has_erased_slot(&self) -> bool {
        self.0.iter().any(Band::has_erased_word)
    }

    /// Read all slots starting at byte address `base`.
    ///
    /// Slot `i` lives at `base + 4i` (low) and `base + 4i + 2` (high).
    pub fn load<W: WordStore + ?Sized>(store: &mut W, base: u16) -> Result<Self> {
        let mut bands = [Band::ERASED; BAND_COUNT];
        for (i, band) in bands.iter_mut().enumerate() {
            let (lo_addr, hi_addr) = slot_addrs(base, i)?;
            band.low = store
                .read_word(lo_addr)
                .map_err(|e| storage_error(&*e))?;
            band.high = store
                .read_word(hi_addr)
                .map_err(|e| storage_error(&*e))?;
        }
        Ok(Self(bands))
    }

    /// Write all slots starting at byte address `base`.
    pub fn persist<W: WordStore + ?Sized>(&self, store: &mut W, base: u16) -> Result<()> {
        for (i, band) in self.0.iter().enumerate() {
            let (lo_addr, hi_addr) = slot_addrs(base, i)?;
            store
                .write_word(lo_addr, band.low)
                .map_err(|e| storage_error(&*e))?;
            store
                .write_word(hi_addr, band.high)
                .map_err(|e| storage_error(&*e))?;
        }
        Ok(())
    }
}

/// Byte addresses of the low and high word of slot `index`.
fn slot_addrs(base: u16, index: usize) -> Result<(u16, u16)> {
    let index = u16::try_from(index)
        .map_err(|_| KnobError::Config(format!("slot index {index} out of range")))?;
    let lo = index
        .checked_mul(SLOT_BYTES)
        .and_then(|off| base.checked_add(off))
        .ok_or_else(|| KnobError::Config(format!("slot {index} beyond address space")))?;
    let hi = lo
        .checked_add(2)
        .ok_or_else(|| KnobError::Config(format!("slot {index} beyond address space")))?;
    Ok((lo, hi))
}

fn storage_error(e: &(dyn std::error::Error + 'static)) -> eyre::Report {
    match map_hw_error(e) {
        err @ KnobError::Storage(_) => eyre::Report::new(err),
        other => eyre::Report::new(KnobError::Storage(other.to_string())),
    }
}

impl fmt::Display for BandTable {
    /// One `Bin #i: [low - high]` line per band.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, band) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "Bin #{i}: {band}")?;
        }
        Ok(())
    }
}
