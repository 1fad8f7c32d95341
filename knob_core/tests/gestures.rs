//! Debounce and gesture behavior through the full pipeline, fed raw values.

use knob_core::{Band, BandTable, Event, Pipeline, Step, Symbol};
use knob_hardware::MemoryStore;
use rstest::rstest;

const IDLE: u16 = 1010;
const S1: u16 = 760;
const S2: u16 = 520;
const S1S2: u16 = 300;
const BTN: u16 = 5;
const GAP: u16 = 650;

fn reference() -> BandTable {
    BandTable::new([
        Band::new(1000, 1023),
        Band::new(740, 780),
        Band::new(500, 540),
        Band::new(280, 320),
        Band::new(0, 10),
    ])
}

fn booted() -> (Pipeline<MemoryStore>, Vec<Event>) {
    let mut store = MemoryStore::default();
    reference().persist(&mut store, 0).unwrap();
    let mut events = Vec::new();
    let p = Pipeline::builder().with_store(store).boot(&mut events).unwrap();
    assert_eq!(events, vec![Event::BandsLoaded(reference())]);
    events.clear();
    (p, events)
}

fn feed(p: &mut Pipeline<MemoryStore>, raw: u16, n: usize, events: &mut Vec<Event>) {
    for _ in 0..n {
        p.on_sample(raw, events);
    }
}

#[test]
fn confirms_on_sixth_matching_sample() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 5, &mut ev);
    assert_eq!(p.gestures().confirmed(), None);
    feed(&mut p, IDLE, 1, &mut ev);
    assert_eq!(p.gestures().confirmed(), Some(Symbol::Idle));
}

#[test]
fn single_dissenting_sample_restarts_count() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 6, &mut ev);
    feed(&mut p, S1, 5, &mut ev);
    feed(&mut p, IDLE, 1, &mut ev);
    feed(&mut p, S1, 5, &mut ev);
    assert_eq!(p.gestures().confirmed(), Some(Symbol::Idle));
    feed(&mut p, S1, 1, &mut ev);
    assert_eq!(p.gestures().confirmed(), Some(Symbol::S1));
}

#[test]
fn outliers_leave_the_run_alone() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 6, &mut ev);
    feed(&mut p, S1, 3, &mut ev);
    assert_eq!(p.on_sample(GAP, &mut ev), Step::Outlier);
    feed(&mut p, S1, 3, &mut ev);
    assert_eq!(p.gestures().confirmed(), Some(Symbol::S1));
    assert_eq!(p.stats().outliers, 1);
    assert_eq!(p.stats().samples, 13);
}

#[rstest]
#[case::forward(&[IDLE, S1, S1S2, S2, IDLE], Event::RotateForward)]
#[case::backward(&[IDLE, S2, S1S2, S1, IDLE], Event::RotateBackward)]
fn full_cycle_emits_one_rotation(#[case] seq: &[u16], #[case] expected: Event) {
    let (mut p, mut ev) = booted();
    for &raw in seq {
        feed(&mut p, raw, 12, &mut ev);
    }
    assert_eq!(ev, vec![expected]);
}

#[rstest]
#[case::stops_short(&[IDLE, S1, S1S2])]
#[case::turns_back(&[IDLE, S1, S1S2, S1, IDLE])]
#[case::flickers(&[IDLE, S1, IDLE, S2, IDLE])]
fn partial_cycles_emit_nothing(#[case] seq: &[u16]) {
    let (mut p, mut ev) = booted();
    for &raw in seq {
        feed(&mut p, raw, 12, &mut ev);
    }
    assert!(ev.is_empty(), "{ev:?}");
}

#[test]
fn repeated_detents_count_individually() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 10, &mut ev);
    for _ in 0..4 {
        for raw in [S1, S1S2, S2, IDLE] {
            feed(&mut p, raw, 10, &mut ev);
        }
    }
    assert_eq!(ev, vec![Event::RotateForward; 4]);
}

#[test]
fn short_samples_between_positions_do_not_confirm() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 10, &mut ev);
    // Each position held for only five samples: never confirmed.
    for raw in [S1, S1S2, S2, IDLE, S1, S1S2, S2] {
        feed(&mut p, raw, 5, &mut ev);
    }
    assert!(ev.is_empty());
}

#[test]
fn double_click_within_window() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 10, &mut ev);
    feed(&mut p, BTN, 10, &mut ev);
    feed(&mut p, IDLE, 10, &mut ev);
    feed(&mut p, BTN, 10, &mut ev);
    feed(&mut p, IDLE, 9_000, &mut ev);
    assert_eq!(ev, vec![Event::DoubleClick]);
}

#[test]
fn single_click_fires_after_window() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 10, &mut ev);
    feed(&mut p, BTN, 10, &mut ev);
    // Release is confirmed on the sixth idle sample; the timer then needs
    // 8001 more ticks to exceed the window.
    feed(&mut p, IDLE, 6 + 8_000, &mut ev);
    assert!(ev.is_empty());
    assert_eq!(p.gestures().click_pending(), Some(8_000));
    feed(&mut p, IDLE, 1, &mut ev);
    assert_eq!(ev, vec![Event::SingleClick]);
    feed(&mut p, IDLE, 20_000, &mut ev);
    assert_eq!(ev, vec![Event::SingleClick]);
}

#[test]
fn outliers_do_not_tick_click_timer() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 10, &mut ev);
    feed(&mut p, BTN, 10, &mut ev);
    feed(&mut p, IDLE, 6, &mut ev);
    assert_eq!(p.gestures().click_pending(), Some(0));
    feed(&mut p, GAP, 10_000, &mut ev);
    assert_eq!(p.gestures().click_pending(), Some(0));
    assert!(ev.is_empty());
}

#[test]
fn long_press_enters_calibration_once() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 10, &mut ev);
    feed(&mut p, BTN, 6 + 65_534, &mut ev);
    assert!(ev.is_empty());
    assert!(!p.is_calibrating());
    feed(&mut p, BTN, 1, &mut ev);
    assert_eq!(ev, vec![Event::LongPress]);
    assert!(p.is_calibrating());

    // Still held: samples now belong to calibration and are out of range.
    assert_eq!(p.on_sample(BTN, &mut ev), Step::Calibrating);
    feed(&mut p, BTN, 70_000, &mut ev);
    assert_eq!(ev, vec![Event::LongPress]);
}

#[test]
fn button_shorter_than_long_press_is_just_a_click() {
    let (mut p, mut ev) = booted();
    feed(&mut p, IDLE, 10, &mut ev);
    feed(&mut p, BTN, 60_000, &mut ev);
    feed(&mut p, IDLE, 9_000, &mut ev);
    assert_eq!(ev, vec![Event::SingleClick]);
    assert!(!p.is_calibrating());
}

#[test]
fn manual_request_reports_start() {
    let (mut p, mut ev) = booted();
    p.request_calibration(&mut ev);
    p.request_calibration(&mut ev);
    assert_eq!(ev, vec![Event::CalibrationStarted]);
    assert_eq!(p.on_sample(IDLE, &mut ev), Step::Calibrating);
}
