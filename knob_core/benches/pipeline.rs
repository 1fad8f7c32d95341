use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use knob_core::calibration::CalibrationEngine;
use knob_core::{Band, BandTable, CalibrationCfg, DiscardSink, Pipeline};
use knob_hardware::MemoryStore;

const LEVELS: [u16; 5] = [1015, 760, 520, 300, 4];

fn table() -> BandTable {
    BandTable::new([
        Band::new(1000, 1023),
        Band::new(740, 780),
        Band::new(500, 540),
        Band::new(280, 320),
        Band::new(0, 10),
    ])
}

// Knob turned slowly through every position, with a little noise.
fn synth_trace(n: usize, seed: u32) -> Vec<u16> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    let order = [0usize, 1, 3, 2, 0, 4, 0];
    (0..n)
        .map(|i| {
            let level = LEVELS[order[(i / 50) % order.len()]];
            let noise = (next() % 5) as i32 - 2;
            (i32::from(level) + noise).clamp(0, 1023) as u16
        })
        .collect()
}

fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::default();
    table().persist(&mut store, 0).unwrap();
    store
}

pub fn bench_pipeline(c: &mut Criterion) {
    let mut g = c.benchmark_group("pipeline");
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(1));
    } else {
        g.sample_size(50);
    }

    let trace = synth_trace(20_000, 0xC0FFEE);
    let store = seeded_store();

    g.bench_function("classify_and_gesture", |b| {
        b.iter_batched(
            || {
                Pipeline::builder()
                    .with_store(store.clone())
                    .boot(&mut DiscardSink)
                    .unwrap()
            },
            |mut p| {
                let mut sink = DiscardSink;
                for &raw in &trace {
                    black_box(p.on_sample(black_box(raw), &mut sink));
                }
            },
            BatchSize::SmallInput,
        )
    });

    g.bench_function("calibration_feed", |b| {
        b.iter_batched(
            || CalibrationEngine::new(CalibrationCfg::default()),
            |mut e| {
                for &raw in &trace {
                    black_box(e.feed(black_box(raw)));
                }
            },
            BatchSize::SmallInput,
        )
    });

    g.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
