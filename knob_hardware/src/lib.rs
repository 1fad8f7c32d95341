//! Hardware backends for the knob firmware: simulated ladder, EEPROM images,
//! and (behind the `hardware` feature) a Linux IIO ADC.
pub mod atomic;
pub mod error;
#[cfg(feature = "hardware")]
pub mod iio;
pub mod sim;
pub mod store;

pub use error::HwError;
#[cfg(feature = "hardware")]
pub use iio::IioAdc;
pub use sim::{Contact, Levels, Plan, ScriptedSource, SimulatedLadder};
pub use store::{FileStore, MemoryStore};
