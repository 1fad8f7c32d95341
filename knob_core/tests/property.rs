use knob_core::{Band, BandTable, Event, Pipeline, Step, Symbol};
use knob_hardware::MemoryStore;
use proptest::prelude::*;

// Raw value per symbol index; index 5 is an outlier between bands.
const RAW: [u16; 6] = [1010, 760, 520, 300, 5, 650];
const CONFIRM: usize = 5;

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

prop_compose! {
    // Runs of (symbol index, length) so sequences contain both short
    // glitches and long holds.
    fn runs(symbols: usize)(
        runs in prop::collection::vec((0..symbols, 1usize..12), 1..60)
    ) -> Vec<u16> {
        runs.into_iter()
            .flat_map(|(i, n)| std::iter::repeat_n(RAW[i], n))
            .collect()
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn confirmation_needs_consensus(raws in runs(6)) {
        let mut p = booted();
        let mut events = Vec::new();
        let mut seen: Vec<Symbol> = Vec::new();
        for raw in raws {
            let before = p.gestures().confirmed();
            if let Step::Classified(s) = p.on_sample(raw, &mut events) {
                seen.push(s);
            }
            let after = p.gestures().confirmed();
            if after != before {
                let new = after.unwrap();
                prop_assert!(seen.len() > CONFIRM);
                prop_assert!(seen[seen.len() - (CONFIRM + 1)..].iter().all(|&s| s == new));
            }
        }
    }

    #[test]
    fn rotary_only_streams_never_click(raws in runs(4)) {
        let mut p = booted();
        let mut events = Vec::new();
        for raw in raws {
            p.on_sample(raw, &mut events);
        }
        prop_assert!(events.iter().all(|e| matches!(e, Event::RotateForward | Event::RotateBackward)));
        prop_assert!(!p.is_calibrating());
    }

    #[test]
    fn outliers_change_nothing_but_the_counter(raws in runs(6), at in 0usize..400) {
        let mut a = booted();
        let mut b = booted();
        let mut ea = Vec::new();
        let mut eb = Vec::new();
        for (i, &raw) in raws.iter().enumerate() {
            if i == at {
                b.on_sample(RAW[5], &mut eb);
            }
            a.on_sample(raw, &mut ea);
            b.on_sample(raw, &mut eb);
        }
        prop_assert_eq!(ea, eb);
        prop_assert_eq!(a.gestures().confirmed(), b.gestures().confirmed());
        prop_assert_eq!(a.gestures().candidate(), b.gestures().candidate());
    }
}
