//! Session assembly: config mapping, store and source setup, event reporting.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use knob_core::builder::{PipelineBuilder, Set};
use knob_core::error::Result as CoreResult;
use knob_core::runner::{RunOptions, RunSummary, SamplingMode};
use knob_core::{BandTable, Event, KnobError, StopReason};
use knob_hardware::store::DEFAULT_CAPACITY;
use knob_hardware::{FileStore, Levels, Plan, SimulatedLadder};
use knob_traits::SampleSource;
use serde_json::{Value, json};

use crate::cli::Gesture;

/// Conversions of rest before and after the played gestures.
const SETTLE_SAMPLES: u32 = 200;

pub fn stop_reason_name(r: &StopReason) -> &'static str {
    match r {
        StopReason::EndOfStream => "EndOfStream",
        StopReason::Shutdown => "Shutdown",
        StopReason::SampleLimit => "SampleLimit",
        StopReason::Fault(_) => "Fault",
    }
}

/// Where the EEPROM image lives: `--store` wins over `store.path`.
pub fn store_path(cfg: &knob_config::Config, cli_store: Option<&Path>) -> PathBuf {
    cli_store.map_or_else(|| PathBuf::from(&cfg.store.path), Path::to_path_buf)
}

/// Open the image, sized so the band table at `store.base_addr` fits.
pub fn open_store(cfg: &knob_config::Config, path: &Path) -> eyre::Result<FileStore> {
    let needed = usize::from(cfg.store.base_addr) + knob_core::band::BAND_COUNT * 4;
    FileStore::open_with_capacity(path, DEFAULT_CAPACITY.max(needed))
        .wrap_err_with(|| format!("open eeprom image {}", path.display()))
}

fn builder(cfg: &knob_config::Config, store: FileStore) -> PipelineBuilder<FileStore, Set> {
    PipelineBuilder::new()
        .with_store(store)
        .with_gesture((&cfg.gesture).into())
        .with_calibration((&cfg.calibration).into())
        .with_base_addr(cfg.store.base_addr)
}

pub fn sim_source(sim: &knob_config::SimCfg, plan: Plan) -> SimulatedLadder {
    let [open, a, b, both, button] = sim.levels;
    SimulatedLadder::new(plan)
        .with_levels(Levels {
            open,
            a,
            b,
            both,
            button,
        })
        .with_noise(sim.noise)
        .with_bounce(sim.bounce)
        .with_seed(sim.seed)
}

/// Rest, the requested gestures in order, rest.
pub fn plan_for(gestures: &[Gesture], rounds: u32) -> Plan {
    gestures
        .iter()
        .fold(Plan::rest(SETTLE_SAMPLES), |plan, g| {
            plan.then(match g {
                Gesture::Forward => Plan::forward(),
                Gesture::Backward => Plan::backward(),
                Gesture::Click => Plan::click(),
                Gesture::DoubleClick => Plan::double_click(),
                Gesture::LongPress => Plan::long_press(),
                Gesture::Sweep => Plan::sweep(rounds),
            })
        })
        .then(Plan::rest(SETTLE_SAMPLES))
}

/// JSON form of a band table: one object per bin.
pub fn bands_json(t: &BandTable) -> Value {
    Value::Array(
        t.bands()
            .iter()
            .enumerate()
            .map(|(bin, b)| json!({ "bin": bin, "low": b.low, "high": b.high }))
            .collect(),
    )
}

pub fn event_json(event: &Event) -> Value {
    let mut obj = json!({ "event": event.name() });
    if let Some(c) = event.code() {
        obj["code"] = json!(c.to_string());
    }
    if let Some(t) = event.table() {
        obj["bands"] = bands_json(t);
    }
    obj
}

fn print_event(event: &Event, json: bool) {
    if json {
        println!("{}", event_json(event));
    } else {
        println!("{event}");
    }
}

fn print_summary(s: &RunSummary, json: bool) {
    if json {
        let obj = json!({
            "summary": {
                "samples": s.samples,
                "outliers": s.outliers,
                "calibration_passes": s.calibration_passes,
                "retries": s.retries,
                "aborts": s.aborts,
                "dropped_events": s.dropped_events,
                "calibrating": s.calibrating,
                "stop": stop_reason_name(&s.stop),
                "events": {
                    "forward": s.events.forward,
                    "backward": s.events.backward,
                    "single_click": s.events.single_click,
                    "double_click": s.events.double_click,
                    "long_press": s.events.long_press,
                    "calibrated": s.events.calibrated,
                },
                "bands": bands_json(&s.bands),
            }
        });
        println!("{obj}");
        return;
    }
    eprintln!("\n--- Knob Summary ---");
    eprintln!("Samples: {} ({} outliers)", s.samples, s.outliers);
    eprintln!(
        "Rotations F/B: {} / {}",
        s.events.forward, s.events.backward
    );
    eprintln!(
        "Clicks single/double/long: {} / {} / {}",
        s.events.single_click, s.events.double_click, s.events.long_press
    );
    eprintln!(
        "Calibration passes/retries/aborts: {} / {} / {}",
        s.calibration_passes, s.retries, s.aborts
    );
    if s.dropped_events > 0 {
        eprintln!("Dropped events: {}", s.dropped_events);
    }
    eprintln!("Stopped: {}", stop_reason_name(&s.stop));
    eprintln!("--------------------\n");
}

/// What drives the session.
pub enum Input {
    /// Simulated ladder replaying a plan.
    Sim(Plan),
    /// The configured IIO channel.
    #[cfg(feature = "hardware")]
    Adc,
}

impl Input {
    /// Sim when gestures were requested or no ADC backend is compiled in.
    pub fn choose(gestures: &[Gesture], rounds: u32, calibrate: bool) -> Self {
        #[cfg(feature = "hardware")]
        {
            if gestures.is_empty() {
                return Input::Adc;
            }
        }
        if calibrate && gestures.is_empty() {
            Input::Sim(plan_for(&[Gesture::Sweep], rounds))
        } else {
            Input::Sim(plan_for(gestures, rounds))
        }
    }
}

pub struct Session<'a> {
    pub cfg: &'a knob_config::Config,
    pub store: PathBuf,
    pub json: bool,
    pub shutdown: Arc<AtomicBool>,
}

impl Session<'_> {
    fn options(&self, direct: bool, max_samples: Option<u64>) -> RunOptions {
        let mode = if direct {
            SamplingMode::Direct
        } else {
            SamplingMode::from_config(self.cfg.sampler.mode, self.cfg.sampler.sample_rate_hz)
        };
        RunOptions {
            mode,
            max_samples,
            ..RunOptions::default()
        }
    }

    fn drive<S>(&self, source: S, opts: RunOptions) -> CoreResult<RunSummary>
    where
        S: SampleSource + Send + 'static,
    {
        let store = open_store(self.cfg, &self.store)?;
        let sampler: knob_core::SamplerCfg = (&self.cfg.sampler).into();
        let json = self.json;
        let summary = knob_core::runner::run(
            source,
            builder(self.cfg, store),
            &sampler,
            opts,
            Arc::clone(&self.shutdown),
            |e| print_event(e, json),
        )?;
        print_summary(&summary, json);
        if let StopReason::Fault(e) = &summary.stop {
            return Err(e.clone().into());
        }
        Ok(summary)
    }

    fn drive_input(&self, input: Input, opts: RunOptions) -> CoreResult<RunSummary> {
        match input {
            Input::Sim(plan) => self.drive(sim_source(&self.cfg.sim, plan), opts),
            #[cfg(feature = "hardware")]
            Input::Adc => {
                let hw = &self.cfg.hardware;
                let adc = knob_hardware::IioAdc::open(&hw.iio_device, hw.channel, hw.resolution_bits)
                    .wrap_err("open iio adc")?;
                self.drive(adc, opts)
            }
        }
    }

    /// Boot and report events until the input ends, the limit is hit, or Ctrl-C.
    pub fn run(
        &self,
        gestures: &[Gesture],
        rounds: u32,
        max_samples: Option<u64>,
        direct: bool,
    ) -> CoreResult<RunSummary> {
        let opts = self.options(direct, max_samples);
        tracing::info!(?gestures, mode = ?opts.mode, store = %self.store.display(), "run");
        self.drive_input(Input::choose(gestures, rounds, false), opts)
    }

    /// One forced calibration pass; fails unless a table was committed.
    pub fn calibrate(&self, rounds: u32, direct: bool) -> CoreResult<BandTable> {
        let opts = RunOptions {
            force_calibration: true,
            stop_after_calibration: true,
            ..self.options(direct, None)
        };
        tracing::info!(rounds, mode = ?opts.mode, "calibrate");
        let summary = self.drive_input(Input::choose(&[], rounds, true), opts)?;
        if summary.events.calibration_aborted > 0 {
            return Err(KnobError::Storage("calibrated bands could not be stored".into()).into());
        }
        if summary.events.calibrated == 0 {
            eyre::bail!(
                "calibration did not finish before the input ended ({} samples, {} retries)",
                summary.samples,
                summary.retries
            );
        }
        Ok(summary.bands)
    }
}
