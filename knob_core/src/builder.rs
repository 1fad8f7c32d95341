//! Type-state builder for `Pipeline`.
//!
//! `boot()` is only available once a word store has been provided;
//! `try_boot()` is always available and reports what is missing.

use std::marker::PhantomData;

use knob_traits::WordStore;

use crate::band::{BAND_COUNT, Band, SLOT_BYTES};
use crate::calibration::{CalibrationEngine, RANKED_KEYS};
use crate::config::{CalibrationCfg, GestureCfg};
use crate::error::{BuildError, Result};
use crate::event::EventSink;
use crate::gesture::GestureEngine;
use crate::pipeline::{Pipeline, PipelineStats};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct PipelineBuilder<W, S> {
    store: Option<W>,
    gesture: Option<GestureCfg>,
    calibration: Option<CalibrationCfg>,
    base_addr: u16,
    _s: PhantomData<S>,
}

impl<W> Default for PipelineBuilder<W, Missing> {
    fn default() -> Self {
        Self {
            store: None,
            gesture: None,
            calibration: None,
            base_addr: 0,
            _s: PhantomData,
        }
    }
}

impl<W> PipelineBuilder<W, Missing> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(self, store: W) -> PipelineBuilder<W, Set> {
        PipelineBuilder {
            store: Some(store),
            gesture: self.gesture,
            calibration: self.calibration,
            base_addr: self.base_addr,
            _s: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<W, S> PipelineBuilder<W, S> {
    pub fn with_gesture(mut self, gesture: GestureCfg) -> Self {
        self.gesture = Some(gesture);
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Byte address of slot 0 in the store.
    pub fn with_base_addr(mut self, base_addr: u16) -> Self {
        self.base_addr = base_addr;
        self
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(gesture: &GestureCfg, calibration: &CalibrationCfg, base_addr: u16) -> Result<()> {
    if gesture.confirm_samples == 0 {
        return Err(invalid("confirm_samples must be >= 1"));
    }
    if gesture.double_click_ticks >= gesture.single_click_ticks {
        return Err(invalid("double_click_ticks must be < single_click_ticks"));
    }
    if calibration.min_raw >= calibration.max_raw {
        return Err(invalid("min_raw must be < max_raw"));
    }
    // Counts saturate at u16::MAX, so that trigger could never fire.
    if calibration.trigger_count == 0 || calibration.trigger_count == u16::MAX {
        return Err(invalid("trigger_count must be in [1, 65534]"));
    }
    if calibration.bucket_gap == 0 {
        return Err(invalid("bucket_gap must be >= 1"));
    }
    if !(3..=RANKED_KEYS).contains(&calibration.bucket_keys) {
        return Err(invalid("bucket_keys must be in [3, 16]"));
    }
    for band in [calibration.idle_band, calibration.button_band] {
        if band.has_erased_word() || band.low > band.high {
            return Err(invalid("fixed bands must be ordered and not erased"));
        }
    }
    let table_bytes = SLOT_BYTES * BAND_COUNT as u16;
    // Last byte of the table must still be addressable.
    if base_addr.checked_add(table_bytes - 1).is_none() {
        return Err(invalid("base_addr leaves no room for the band table"));
    }
    Ok(())
}

impl<W: WordStore, S> PipelineBuilder<W, S> {
    /// Validate, load the band table, and return a running pipeline.
    /// Fails with [`BuildError::MissingStore`] if no store was given.
    pub fn try_boot<K: EventSink + ?Sized>(self, sink: &mut K) -> Result<Pipeline<W>> {
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let gesture = self.gesture.unwrap_or_default();
        let calibration = self.calibration.unwrap_or_default();
        validate(&gesture, &calibration, self.base_addr)?;

        let mut pipeline = Pipeline {
            store,
            base_addr: self.base_addr,
            bands: crate::band::BandTable::ERASED,
            gestures: GestureEngine::new(gesture),
            calibration: CalibrationEngine::new(calibration),
            calibrating: false,
            stats: PipelineStats::default(),
        };
        pipeline.reload(sink)?;
        Ok(pipeline)
    }
}

impl<W: WordStore> PipelineBuilder<W, Set> {
    /// Validate and boot. Only available once a store is set.
    pub fn boot<K: EventSink + ?Sized>(self, sink: &mut K) -> Result<Pipeline<W>> {
        self.try_boot(sink)
    }
}
