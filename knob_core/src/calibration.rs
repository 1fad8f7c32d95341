//! Histogram-based band calibration.
//!
//! While calibrating, every raw conversion in the plausible range lands in
//! a small fixed-capacity histogram. Once one value has been seen often
//! enough, the most frequent values are grouped into the three middle bands
//! and combined with the fixed idle and button bands.
//!
//! All working storage is inline; nothing here allocates.

use crate::band::{BAND_COUNT, Band, BandTable};
use crate::config::{BucketOrder, CalibrationCfg};

/// Distinct raw values tracked per pass.
pub const HISTOGRAM_CAPACITY: usize = 32;
/// Most frequent keys kept after ranking.
pub const RANKED_KEYS: usize = 16;
/// Bands learned from the histogram (S1, S2, S1S2).
pub const MIDDLE_BINS: usize = BAND_COUNT - 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Entry {
    key: u16,
    count: u16,
}

/// Fixed-capacity value → count table.
#[derive(Debug, Clone)]
pub struct Histogram {
    entries: [Entry; HISTOGRAM_CAPACITY],
    len: usize,
    dropped: u32,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            entries: [Entry::default(); HISTOGRAM_CAPACITY],
            len: 0,
            dropped: 0,
        }
    }
}

impl Histogram {
    /// Count one occurrence of `key` and return its new count.
    ///
    /// A novel key arriving when the table is full is dropped (`None`);
    /// keys already present keep counting.
    pub fn record(&mut self, key: u16) -> Option<u16> {
        let used = &mut self.entries[..self.len];
        if let Some(e) = used.iter_mut().find(|e| e.key == key) {
            e.count = e.count.saturating_add(1);
            return Some(e.count);
        }
        if self.len == HISTOGRAM_CAPACITY {
            self.dropped = self.dropped.saturating_add(1);
            return None;
        }
        self.entries[self.len] = Entry { key, count: 1 };
        self.len += 1;
        Some(1)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count(&self, key: u16) -> u16 {
        self.entries[..self.len]
            .iter()
            .find(|e| e.key == key)
            .map_or(0, |e| e.count)
    }

    /// Novel values rejected because the table was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Keys of the highest counts, most frequent first; equal counts rank the
    /// smaller key first. Returns how many slots of `out` were filled.
    pub fn ranked_keys(&self, out: &mut [u16; RANKED_KEYS]) -> usize {
        let mut ranked = self.entries;
        let ranked = &mut ranked[..self.len];
        ranked.sort_unstable_by(|a, b| b.count.cmp(&a.count).then(a.key.cmp(&b.key)));
        let n = ranked.len().min(RANKED_KEYS);
        for (slot, e) in out.iter_mut().zip(ranked.iter()) {
            *slot = e.key;
        }
        n
    }
}

/// Group sorted keys into middle bands, opening a new bucket whenever two
/// neighbours are more than `gap` apart.
///
/// Returns the bands and the number of buckets found. Exactly
/// [`MIDDLE_BINS`] buckets are expected; with fewer, the missing slots stay
/// erased, and with more, every slot is erased since the grouping is
/// ambiguous.
pub fn bucketize(keys: &[u16], gap: u16) -> ([Band; MIDDLE_BINS], usize) {
    let mut bands = [Band::ERASED; MIDDLE_BINS];
    let Some((&first, rest)) = keys.split_first() else {
        return (bands, 0);
    };
    let mut buckets = 0usize;
    let mut open = first;
    let mut prev = first;
    for &key in rest {
        if key.abs_diff(prev) > gap {
            if let Some(slot) = bands.get_mut(buckets) {
                *slot = Band::spanning(open, prev);
            }
            buckets += 1;
            open = key;
        }
        prev = key;
    }
    if let Some(slot) = bands.get_mut(buckets) {
        *slot = Band::spanning(open, prev);
    }
    buckets += 1;

    if buckets > MIDDLE_BINS {
        bands = [Band::ERASED; MIDDLE_BINS];
    }
    (bands, buckets)
}

/// Result of feeding one raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationProgress {
    /// Outside the plausible range; ignored.
    Discarded,
    Collecting,
    /// A pass completed. The table may still contain erased slots when the
    /// clustering was malformed; callers validate before committing.
    Finished(BandTable),
}

#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    cfg: CalibrationCfg,
    histogram: Histogram,
}

impl CalibrationEngine {
    pub fn new(cfg: CalibrationCfg) -> Self {
        Self {
            cfg,
            histogram: Histogram::default(),
        }
    }

    pub fn config(&self) -> &CalibrationCfg {
        &self.cfg
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Drop the working state of the current pass.
    pub fn reset(&mut self) {
        self.histogram.clear();
    }

    pub fn feed(&mut self, raw: u16) -> CalibrationProgress {
        if raw < self.cfg.min_raw || raw > self.cfg.max_raw {
            return CalibrationProgress::Discarded;
        }
        match self.histogram.record(raw) {
            Some(count) if count > self.cfg.trigger_count => {
                tracing::debug!(key = raw, count, distinct = self.histogram.len(), "calibration triggered");
                CalibrationProgress::Finished(self.finish())
            }
            _ => CalibrationProgress::Collecting,
        }
    }

    fn finish(&mut self) -> BandTable {
        let mut ranked = [0u16; RANKED_KEYS];
        let n = self.histogram.ranked_keys(&mut ranked);
        self.histogram.clear();

        let keys = &mut ranked[..n.min(self.cfg.bucket_keys)];
        match self.cfg.order {
            BucketOrder::Descending => keys.sort_unstable_by(|a, b| b.cmp(a)),
            BucketOrder::Ascending => keys.sort_unstable(),
        }
        let (middle, buckets) = bucketize(keys, self.cfg.bucket_gap);
        if buckets != MIDDLE_BINS {
            tracing::debug!(buckets, "unexpected bucket count");
        }
        BandTable::new([
            self.cfg.idle_band,
            middle[0],
            middle[1],
            middle[2],
            self.cfg.button_band,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbol;

    fn cfg(trigger: u16) -> CalibrationCfg {
        CalibrationCfg {
            trigger_count: trigger,
            ..CalibrationCfg::default()
        }
    }

    #[test]
    fn full_histogram_drops_novel_but_counts_known() {
        let mut h = Histogram::default();
        for k in 0..HISTOGRAM_CAPACITY as u16 {
            h.record(100 + k);
        }
        assert_eq!(h.record(999), None);
        assert_eq!(h.dropped(), 1);
        assert_eq!(h.record(100), Some(2));
        assert_eq!(h.len(), HISTOGRAM_CAPACITY);
    }

    #[test]
    fn ranking_breaks_ties_by_smaller_key() {
        let mut h = Histogram::default();
        for (key, n) in [(100, 3), (50, 3), (200, 5), (75, 1)] {
            for _ in 0..n {
                h.record(key);
            }
        }
        let mut out = [0; RANKED_KEYS];
        let n = h.ranked_keys(&mut out);
        assert_eq!(&out[..n], &[200, 50, 100, 75]);
    }

    #[test]
    fn bucketize_splits_on_gap() {
        let (bands, n) = bucketize(&[770, 760, 530, 520, 300, 290], 50);
        assert_eq!(n, 3);
        assert_eq!(
            bands,
            [Band::new(760, 770), Band::new(520, 530), Band::new(290, 300)]
        );
    }

    #[test]
    fn too_few_buckets_leave_erased_slots() {
        let (bands, n) = bucketize(&[760, 755, 300], 50);
        assert_eq!(n, 2);
        assert_eq!(bands[2], Band::ERASED);
        let (bands, n) = bucketize(&[], 50);
        assert_eq!(n, 0);
        assert_eq!(bands, [Band::ERASED; MIDDLE_BINS]);
    }

    #[test]
    fn too_many_buckets_erase_everything() {
        let (bands, n) = bucketize(&[900, 700, 500, 300], 50);
        assert_eq!(n, 4);
        assert_eq!(bands, [Band::ERASED; MIDDLE_BINS]);
    }

    #[test]
    fn out_of_range_samples_are_discarded() {
        let mut e = CalibrationEngine::new(cfg(5));
        assert_eq!(e.feed(9), CalibrationProgress::Discarded);
        assert_eq!(e.feed(1001), CalibrationProgress::Discarded);
        assert!(e.histogram().is_empty());
    }

    fn run_to_finish(e: &mut CalibrationEngine, clusters: &[u16]) -> BandTable {
        loop {
            for &c in clusters {
                for raw in [c, c, c + 1] {
                    if let CalibrationProgress::Finished(t) = e.feed(raw) {
                        return t;
                    }
                }
            }
        }
    }

    #[test]
    fn descending_order_lines_bins_up_with_ladder() {
        let mut e = CalibrationEngine::new(cfg(20));
        let table = run_to_finish(&mut e, &[760, 520, 300]);
        assert_eq!(table.band(Symbol::S1), Band::new(760, 761));
        assert_eq!(table.band(Symbol::S2), Band::new(520, 521));
        assert_eq!(table.band(Symbol::S1S2), Band::new(300, 301));
        assert_eq!(table.band(Symbol::Idle), Band::new(1000, 1023));
        assert_eq!(table.band(Symbol::ButtonDown), Band::new(0, 10));
        assert!(e.histogram().is_empty());
    }

    #[test]
    fn ascending_order_reverses_middle_bins() {
        let mut e = CalibrationEngine::new(CalibrationCfg {
            order: BucketOrder::Ascending,
            ..cfg(20)
        });
        let table = run_to_finish(&mut e, &[760, 520, 300]);
        assert_eq!(table.band(Symbol::S1), Band::new(300, 301));
        assert_eq!(table.band(Symbol::S1S2), Band::new(760, 761));
    }

    #[test]
    fn two_clusters_produce_erased_slot() {
        let mut e = CalibrationEngine::new(cfg(20));
        let table = run_to_finish(&mut e, &[760, 300]);
        assert!(table.has_erased_slot());
        assert_eq!(table.band(Symbol::S1S2), Band::ERASED);
    }
}
