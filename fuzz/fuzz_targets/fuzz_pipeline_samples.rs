#![no_main]
use knob_core::Pipeline;
use knob_core::event::DiscardSink;
use knob_hardware::MemoryStore;
use libfuzzer_sys::fuzz_target;

// Arbitrary conversions, blank store: boots straight into calibration, so
// both the histogram and (after a commit) the gesture path get exercised.
fuzz_target!(|raws: Vec<u16>| {
    let Ok(mut pipeline) = Pipeline::builder()
        .with_store(MemoryStore::default())
        .boot(&mut DiscardSink)
    else {
        return;
    };
    for raw in raws {
        pipeline.on_sample(raw & 0x03FF, &mut DiscardSink);
    }
});
