#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core knob logic (hardware-agnostic).
//!
//! One analog line encodes a two-contact rotary switch and a push button as
//! five voltage bands. This crate turns raw conversions into events. All
//! hardware access goes through `knob_traits::SampleSource` and
//! `knob_traits::WordStore`.
//!
//! ## Architecture
//!
//! - **Classification**: raw value → [`Symbol`] via the [`BandTable`] (`band`)
//! - **Gestures**: run-length debounce, detent register, click and
//!   long-press timers (`gesture`)
//! - **Calibration**: fixed-capacity histogram → learned bands (`calibration`)
//! - **Pipeline**: per-conversion entry point tying the above to the store
//!   (`pipeline`, built via `builder`)
//! - **Sampling**: conversion thread and run orchestration (`sampler`, `runner`)
//!
//! Tick counts are conversions, not wall-clock time.

pub mod band;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod event;
pub mod gesture;
pub mod hw_error;
pub mod pipeline;
pub mod runner;
pub mod sampler;
pub mod status;
pub mod symbol;
pub mod util;

pub use band::{Band, BandTable};
pub use builder::PipelineBuilder;
pub use calibration::{CalibrationEngine, CalibrationProgress};
pub use config::{BucketOrder, CalibrationCfg, GestureCfg, SamplerCfg};
pub use error::{BuildError, KnobError, Result};
pub use event::{ChannelSink, DiscardSink, Event, EventSink};
pub use gesture::GestureEngine;
pub use pipeline::{Pipeline, PipelineStats};
pub use runner::{EventCounts, RunOptions, RunSummary, SamplingMode};
pub use sampler::{Sampler, SamplerExit, StopReason};
pub use status::Step;
pub use symbol::{DetentRegister, Direction, Symbol};
