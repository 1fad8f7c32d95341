//! Boot-and-run orchestration used by the CLI and the end-to-end tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use knob_traits::clock::MonotonicClock;
use knob_traits::{SampleSource, WordStore};

use crate::band::BandTable;
use crate::builder::{PipelineBuilder, Set};
use crate::config::SamplerCfg;
use crate::error::Result;
use crate::event::{Event, EventSink};
use crate::pipeline::Pipeline;
use crate::sampler::{Sampler, StopReason, read_next};
use crate::status::Step;

/// How conversions are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Read and process inline on the calling thread.
    Direct,
    /// Conversion thread; the source's blocking read sets the cadence.
    Event,
    /// Conversion thread paced at the given rate.
    Paced(u32),
}

impl SamplingMode {
    /// Pick the mode a config asks for.
    pub fn from_config(mode: knob_config::RunMode, sample_rate_hz: u32) -> Self {
        match (mode, sample_rate_hz) {
            (knob_config::RunMode::Direct, _) => Self::Direct,
            (knob_config::RunMode::Sampler, 0) => Self::Event,
            (knob_config::RunMode::Sampler, hz) => Self::Paced(hz),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: SamplingMode,
    /// Stop after this many conversions.
    pub max_samples: Option<u64>,
    /// Enter calibration right after boot even if bands were loaded.
    pub force_calibration: bool,
    /// Stop once a calibration pass is committed or aborted.
    pub stop_after_calibration: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Direct,
            max_samples: None,
            force_calibration: false,
            stop_after_calibration: false,
        }
    }
}

/// Per-kind tally of delivered events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub forward: u64,
    pub backward: u64,
    pub single_click: u64,
    pub double_click: u64,
    pub long_press: u64,
    pub calibrated: u64,
    pub calibration_retry: u64,
    pub calibration_aborted: u64,
}

impl EventCounts {
    pub fn record(&mut self, event: &Event) {
        let slot = match event {
            Event::RotateForward => &mut self.forward,
            Event::RotateBackward => &mut self.backward,
            Event::SingleClick => &mut self.single_click,
            Event::DoubleClick => &mut self.double_click,
            Event::LongPress => &mut self.long_press,
            Event::Calibrated(_) => &mut self.calibrated,
            Event::CalibrationRetry => &mut self.calibration_retry,
            Event::CalibrationAborted => &mut self.calibration_aborted,
            Event::BandsLoaded(_) | Event::CalibrationStarted => return,
        };
        *slot = slot.saturating_add(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub samples: u64,
    pub outliers: u64,
    pub calibration_passes: u32,
    pub retries: u32,
    pub aborts: u32,
    pub dropped_events: u64,
    pub events: EventCounts,
    /// Live table when the run ended.
    pub bands: BandTable,
    pub calibrating: bool,
    pub stop: StopReason,
}

impl RunSummary {
    fn new<W: WordStore>(p: &Pipeline<W>, events: EventCounts, dropped: u64, stop: StopReason) -> Self {
        let stats = p.stats();
        Self {
            samples: stats.samples,
            outliers: stats.outliers,
            calibration_passes: stats.calibration_passes,
            retries: stats.retries,
            aborts: stats.aborts,
            dropped_events: dropped,
            events,
            bands: *p.bands(),
            calibrating: p.is_calibrating(),
            stop,
        }
    }
}

/// Hands events to the reporting callback and tallies them.
struct Report<'a, F: FnMut(&Event)> {
    on_event: &'a mut F,
    counts: EventCounts,
    calibration_done: bool,
}

impl<F: FnMut(&Event)> EventSink for Report<'_, F> {
    fn emit(&mut self, event: Event) {
        self.counts.record(&event);
        if matches!(event, Event::Calibrated(_) | Event::CalibrationAborted) {
            self.calibration_done = true;
        }
        (self.on_event)(&event);
    }
}

/// Boot a pipeline and run it until the source ends, a limit is hit, or
/// `shutdown` is raised. Every event goes to `on_event` in order.
pub fn run<S, W, F>(
    source: S,
    builder: PipelineBuilder<W, Set>,
    sampler: &SamplerCfg,
    opts: RunOptions,
    shutdown: Arc<AtomicBool>,
    mut on_event: F,
) -> Result<RunSummary>
where
    S: SampleSource + Send + 'static,
    W: WordStore + Send + 'static,
    F: FnMut(&Event),
{
    let mut report = Report {
        on_event: &mut on_event,
        counts: EventCounts::default(),
        calibration_done: false,
    };
    let mut pipeline = builder.boot(&mut report)?;
    if opts.force_calibration {
        pipeline.request_calibration(&mut report);
    }

    tracing::info!(mode = ?opts.mode, calibrating = pipeline.is_calibrating(), "run start");
    let summary = match opts.mode {
        SamplingMode::Direct => run_direct(source, pipeline, sampler, opts, &shutdown, report),
        SamplingMode::Event | SamplingMode::Paced(_) => {
            run_with_sampler(source, pipeline, sampler, opts, &shutdown, report)?
        }
    };
    tracing::info!(
        samples = summary.samples,
        stop = ?summary.stop,
        passes = summary.calibration_passes,
        "run end"
    );
    Ok(summary)
}

fn run_direct<S, W, F>(
    mut source: S,
    mut pipeline: Pipeline<W>,
    sampler: &SamplerCfg,
    opts: RunOptions,
    shutdown: &AtomicBool,
    mut report: Report<'_, F>,
) -> RunSummary
where
    S: SampleSource,
    W: WordStore,
    F: FnMut(&Event),
{
    let mut taken: u64 = 0;
    let stop = loop {
        if shutdown.load(Ordering::Relaxed) {
            break StopReason::Shutdown;
        }
        if opts.max_samples.is_some_and(|max| taken >= max) {
            break StopReason::SampleLimit;
        }
        match read_next(&mut source, sampler.read_timeout) {
            Ok(Some(raw)) => {
                taken += 1;
                let step = pipeline.on_sample(raw, &mut report);
                if opts.stop_after_calibration
                    && matches!(step, Step::Calibrated | Step::CalibrationAborted(_))
                {
                    break StopReason::Shutdown;
                }
            }
            Ok(None) => {}
            Err(reason) => break reason,
        }
    };
    RunSummary::new(&pipeline, report.counts, 0, stop)
}

fn run_with_sampler<S, W, F>(
    source: S,
    pipeline: Pipeline<W>,
    sampler_cfg: &SamplerCfg,
    opts: RunOptions,
    shutdown: &AtomicBool,
    mut report: Report<'_, F>,
) -> Result<RunSummary>
where
    S: SampleSource + Send + 'static,
    W: WordStore + Send + 'static,
    F: FnMut(&Event),
{
    let mut cfg = sampler_cfg.clone();
    cfg.sample_rate_hz = match opts.mode {
        SamplingMode::Paced(hz) => hz,
        SamplingMode::Event | SamplingMode::Direct => 0,
    };
    let sampler = Sampler::spawn(source, pipeline, &cfg, opts.max_samples, MonotonicClock::new());

    loop {
        if shutdown.load(Ordering::Relaxed) {
            sampler.request_stop();
        }
        match sampler.events().recv_timeout(Duration::from_millis(20)) {
            Ok(event) => {
                report.emit(event);
                if opts.stop_after_calibration && report.calibration_done {
                    sampler.request_stop();
                }
            }
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => break,
        }
    }

    let dropped = sampler.dropped();
    let exit = sampler.finish()?;
    Ok(RunSummary::new(&exit.pipeline, report.counts, dropped, exit.reason))
}
