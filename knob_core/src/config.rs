//! Runtime configuration for the pipeline engines.
//!
//! These are separate from the TOML-deserialized config in `knob_config`;
//! see `conversions` for the bridge.

use std::time::Duration;

use crate::band::Band;

/// Debounce and gesture timing. All windows are counted in conversions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureCfg {
    /// Candidate is confirmed once its run length exceeds this.
    pub confirm_samples: u16,
    /// Second release at or within this many ticks is a double click.
    pub double_click_ticks: u32,
    /// A pending click is reported once its timer exceeds this.
    pub single_click_ticks: u32,
    /// Confirmed button-down longer than this is a long press.
    pub long_press_ticks: u32,
}

impl Default for GestureCfg {
    fn default() -> Self {
        Self {
            confirm_samples: 5,
            double_click_ticks: 3_000,
            single_click_ticks: 8_000,
            long_press_ticks: 65_534,
        }
    }
}

/// Order in which the most frequent calibration values are bucketed.
///
/// With `Descending`, bucket 1 is the highest voltage below idle, so on a
/// ladder where S1 sits closest to idle the bins line up with [`crate::Symbol`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketOrder {
    #[default]
    Descending,
    Ascending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationCfg {
    /// Samples below this are discarded.
    pub min_raw: u16,
    /// Samples above this are discarded.
    pub max_raw: u16,
    /// A pass finishes once any count exceeds this.
    pub trigger_count: u16,
    /// Neighbouring keys further apart than this open a new bucket.
    pub bucket_gap: u16,
    /// Ranked keys fed into bucketing.
    pub bucket_keys: usize,
    pub order: BucketOrder,
    pub idle_band: Band,
    pub button_band: Band,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            min_raw: 10,
            max_raw: 1_000,
            trigger_count: 2_000,
            bucket_gap: 50,
            bucket_keys: 12,
            order: BucketOrder::Descending,
            idle_band: Band::new(1_000, 1_023),
            button_band: Band::new(0, 10),
        }
    }
}

/// Sampler thread and event delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerCfg {
    /// 0 = unpaced; the source's own blocking sets the cadence.
    pub sample_rate_hz: u32,
    pub read_timeout: Duration,
    /// Bounded event queue between the pipeline and the reporter.
    pub event_queue: usize,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 0,
            read_timeout: Duration::from_millis(5),
            event_queue: 64,
        }
    }
}
