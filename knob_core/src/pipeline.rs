//! The per-conversion pipeline (`Pipeline`).
//!
//! Owns the band table, the gesture and calibration engines, and the word
//! store. Each raw conversion goes either to calibration or through the
//! classifier into the gesture engine; nothing on this path allocates.

use knob_traits::WordStore;

use crate::band::BandTable;
use crate::builder::{Missing, PipelineBuilder};
use crate::calibration::{CalibrationEngine, CalibrationProgress};
use crate::error::{KnobError, Result};
use crate::event::{Event, EventSink};
use crate::gesture::GestureEngine;
use crate::status::Step;

/// Running totals since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub samples: u64,
    pub outliers: u64,
    /// Completed calibration passes, accepted or not.
    pub calibration_passes: u32,
    pub retries: u32,
    pub aborts: u32,
}

pub struct Pipeline<W: WordStore> {
    pub(crate) store: W,
    pub(crate) base_addr: u16,
    pub(crate) bands: BandTable,
    pub(crate) gestures: GestureEngine,
    pub(crate) calibration: CalibrationEngine,
    pub(crate) calibrating: bool,
    pub(crate) stats: PipelineStats,
}

impl<W: WordStore> core::fmt::Debug for Pipeline<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("base_addr", &self.base_addr)
            .field("bands", &self.bands)
            .field("calibrating", &self.calibrating)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<W: WordStore> Pipeline<W> {
    /// Start building a pipeline.
    pub fn builder() -> PipelineBuilder<W, Missing> {
        PipelineBuilder::new()
    }

    /// Live band table.
    pub fn bands(&self) -> &BandTable {
        &self.bands
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    pub fn gestures(&self) -> &GestureEngine {
        &self.gestures
    }

    pub fn calibration(&self) -> &CalibrationEngine {
        &self.calibration
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn base_addr(&self) -> u16 {
        self.base_addr
    }

    pub fn store(&self) -> &W {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut W {
        &mut self.store
    }

    pub fn into_store(self) -> W {
        self.store
    }

    /// Process one raw conversion.
    pub fn on_sample<S: EventSink + ?Sized>(&mut self, raw: u16, sink: &mut S) -> Step {
        self.stats.samples = self.stats.samples.saturating_add(1);

        if self.calibrating {
            return match self.calibration.feed(raw) {
                CalibrationProgress::Discarded | CalibrationProgress::Collecting => {
                    Step::Calibrating
                }
                CalibrationProgress::Finished(table) => self.commit(table, sink),
            };
        }

        let Some(symbol) = self.bands.classify(raw) else {
            self.stats.outliers = self.stats.outliers.saturating_add(1);
            return Step::Outlier;
        };
        if self.gestures.on_symbol(symbol, sink).calibrate {
            tracing::info!("long press, entering calibration");
            self.enter_calibration();
        }
        Step::Classified(symbol)
    }

    /// Enter calibration on demand. No-op while already calibrating.
    pub fn request_calibration<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        if self.calibrating {
            return;
        }
        tracing::info!("calibration requested");
        self.enter_calibration();
        sink.emit(Event::CalibrationStarted);
    }

    /// Re-read the table from the store, as at boot.
    ///
    /// Any calibration in progress is dropped. A completely erased store
    /// starts a fresh one.
    pub fn reload<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<BandTable> {
        let table = BandTable::load(&mut self.store, self.base_addr)?;
        self.bands = table;
        self.calibrating = false;
        self.calibration.reset();
        sink.emit(Event::BandsLoaded(table));
        if table.is_blank() {
            tracing::info!(base = self.base_addr, "store is blank, calibrating");
            self.request_calibration(sink);
        } else {
            tracing::info!(base = self.base_addr, "bands loaded");
            tracing::debug!(bands = %table, "band table");
        }
        Ok(table)
    }

    fn enter_calibration(&mut self) {
        self.calibrating = true;
        self.calibration.reset();
        // Gestures in flight would otherwise resolve against stale state
        // once classification resumes.
        self.gestures.reset();
    }

    fn commit<S: EventSink + ?Sized>(&mut self, table: BandTable, sink: &mut S) -> Step {
        self.stats.calibration_passes = self.stats.calibration_passes.saturating_add(1);

        if table.has_erased_slot() {
            return self.retry(sink, "malformed clustering");
        }

        let verified = table
            .persist(&mut self.store, self.base_addr)
            .and_then(|()| BandTable::load(&mut self.store, self.base_addr));
        match verified {
            Ok(readback) if readback == table => {
                self.bands = table;
                self.calibrating = false;
                self.gestures.reset();
                tracing::info!(passes = self.stats.calibration_passes, "calibration stored");
                tracing::debug!(bands = %table, "band table");
                sink.emit(Event::Calibrated(table));
                Step::Calibrated
            }
            Ok(_) => self.retry(sink, "read-back mismatch"),
            // Nothing to fall back to: keep calibrating rather than go deaf.
            Err(_) if self.bands.is_blank() => {
                self.retry(sink, "storage failure with no stored bands")
            }
            Err(report) => {
                let err = report
                    .downcast_ref::<KnobError>()
                    .cloned()
                    .unwrap_or_else(|| KnobError::Storage(report.to_string()));
                self.stats.aborts = self.stats.aborts.saturating_add(1);
                self.calibrating = false;
                self.calibration.reset();
                tracing::error!(error = %err, "calibration aborted, keeping previous bands");
                sink.emit(Event::CalibrationAborted);
                Step::CalibrationAborted(err)
            }
        }
    }

    fn retry<S: EventSink + ?Sized>(&mut self, sink: &mut S, reason: &'static str) -> Step {
        self.stats.retries = self.stats.retries.saturating_add(1);
        self.calibration.reset();
        tracing::warn!(reason, retries = self.stats.retries, "calibration rejected, retrying");
        sink.emit(Event::CalibrationRetry);
        Step::Calibrating
    }
}
