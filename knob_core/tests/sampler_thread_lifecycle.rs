//! Sampler thread lifecycle: natural end, limits, pacing, faults, and
//! cleanup on drop.

use std::time::Duration;

use knob_core::sampler::{Sampler, StopReason};
use knob_core::{Band, BandTable, Event, KnobError, Pipeline, SamplerCfg};
use knob_hardware::{HwError, MemoryStore, Plan, ScriptedSource, SimulatedLadder};
use knob_traits::SampleSource;
use knob_traits::clock::{ManualClock, MonotonicClock};

fn booted() -> Pipeline<MemoryStore> {
    let mut store = MemoryStore::default();
    BandTable::new([
        Band::new(1000, 1023),
        Band::new(740, 780),
        Band::new(500, 540),
        Band::new(280, 320),
        Band::new(0, 10),
    ])
    .persist(&mut store, 0)
    .unwrap();
    Pipeline::builder()
        .with_store(store)
        .boot(&mut Vec::new())
        .unwrap()
}

/// Never produces a conversion.
struct Silent;

impl SampleSource for Silent {
    fn read(&mut self, timeout: Duration) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        std::thread::sleep(timeout);
        Err(Box::new(HwError::Timeout))
    }
}

/// Fails with an error nobody recognizes.
struct Broken;

impl SampleSource for Broken {
    fn read(&mut self, _timeout: Duration) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Err("line shorted".into())
    }
}

#[test]
fn runs_plan_to_end_of_stream() {
    let plan = Plan::rest(50).then(Plan::forward());
    let total = plan.total_samples();
    let sampler = Sampler::spawn(
        SimulatedLadder::new(plan),
        booted(),
        &SamplerCfg::default(),
        None,
        MonotonicClock::new(),
    );
    let events: Vec<Event> = sampler.events().iter().collect();
    assert_eq!(events, vec![Event::RotateForward]);
    assert_eq!(sampler.samples(), total);
    assert_eq!(sampler.dropped(), 0);

    let exit = sampler.finish().unwrap();
    assert_eq!(exit.reason, StopReason::EndOfStream);
    assert_eq!(exit.pipeline.stats().samples, total);
}

#[test]
fn sample_limit_stops_thread() {
    let sampler = Sampler::spawn(
        SimulatedLadder::new(Plan::rest(10_000)),
        booted(),
        &SamplerCfg::default(),
        Some(100),
        MonotonicClock::new(),
    );
    let exit = sampler.finish().unwrap();
    assert_eq!(exit.reason, StopReason::SampleLimit);
    assert_eq!(exit.pipeline.stats().samples, 100);
}

#[test]
fn paced_sampler_sleeps_one_period_per_conversion() {
    let clock = ManualClock::new();
    let cfg = SamplerCfg {
        sample_rate_hz: 1_000,
        ..SamplerCfg::default()
    };
    let sampler = Sampler::spawn(
        ScriptedSource::new(std::iter::repeat_n(1010, 100)),
        booted(),
        &cfg,
        None,
        clock.clone(),
    );
    sampler.finish().unwrap();
    assert_eq!(clock.elapsed(), Duration::from_millis(100));
}

#[test]
fn unknown_source_error_ends_with_fault() {
    let sampler = Sampler::spawn(
        Broken,
        booted(),
        &SamplerCfg::default(),
        None,
        MonotonicClock::new(),
    );
    let exit = sampler.finish().unwrap();
    assert_eq!(
        exit.reason,
        StopReason::Fault(KnobError::Hardware("line shorted".into()))
    );
}

#[test]
fn timeouts_are_counted_and_drop_joins() {
    let sampler = Sampler::spawn(
        Silent,
        booted(),
        &SamplerCfg {
            read_timeout: Duration::from_millis(1),
            ..SamplerCfg::default()
        },
        None,
        MonotonicClock::new(),
    );
    std::thread::sleep(Duration::from_millis(30));
    assert!(sampler.timeouts() > 0);
    assert!(!sampler.is_finished());
    // Drop must signal and join without hanging.
    drop(sampler);
}

#[test]
fn stop_returns_pipeline() {
    let sampler = Sampler::spawn(
        Silent,
        booted(),
        &SamplerCfg::default(),
        None,
        MonotonicClock::new(),
    );
    let exit = sampler.stop().unwrap();
    assert_eq!(exit.reason, StopReason::Shutdown);
    assert_eq!(exit.pipeline.stats().samples, 0);
}

#[test]
fn multiple_samplers_dont_leak_threads() {
    for _ in 0..10 {
        let sampler = Sampler::spawn(
            Silent,
            booted(),
            &SamplerCfg::default(),
            None,
            MonotonicClock::new(),
        );
        std::thread::sleep(Duration::from_millis(2));
        drop(sampler);
    }
}

#[test]
fn full_queue_counts_drops() {
    // 30 forward detents with room for only 4 events and nobody reading.
    let mut plan = Plan::rest(50);
    for _ in 0..30 {
        plan = plan.then(Plan::forward());
    }
    let sampler = Sampler::spawn(
        SimulatedLadder::new(plan),
        booted(),
        &SamplerCfg {
            event_queue: 4,
            ..SamplerCfg::default()
        },
        None,
        MonotonicClock::new(),
    );
    while !sampler.is_finished() {
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(sampler.dropped(), 26);
    assert_eq!(sampler.events().try_iter().count(), 4);
}
