//! Hardware boundary for the knob firmware.
//!
//! The pipeline never touches registers directly; it only sees raw ADC
//! samples through [`SampleSource`] and word-addressed non-volatile memory
//! through [`WordStore`].
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Value of a storage word that has never been written (erased EEPROM cell).
pub const ERASED_WORD: u16 = 0xFFFF;

/// One analog channel delivering a raw conversion result per call.
pub trait SampleSource {
    /// Block until the next conversion completes or `timeout` expires.
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>>;
}

/// Word-addressed non-volatile storage (EEPROM-like).
///
/// Addresses are byte offsets; words are 16 bits. Cells that were never
/// written read back as [`ERASED_WORD`].
pub trait WordStore {
    fn read_word(&mut self, addr: u16) -> Result<u16, Box<dyn std::error::Error + Send + Sync>>;
    fn write_word(
        &mut self,
        addr: u16,
        value: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn read(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(timeout)
    }
}

impl<T: WordStore + ?Sized> WordStore for Box<T> {
    fn read_word(&mut self, addr: u16) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_word(addr)
    }

    fn write_word(
        &mut self,
        addr: u16,
        value: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_word(addr, value)
    }
}
