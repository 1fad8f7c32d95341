//! `From` implementations bridging `knob_config` types to `knob_core` types.

use std::time::Duration;

use crate::band::{BAND_COUNT, Band, BandTable};
use crate::config::{BucketOrder, CalibrationCfg, GestureCfg, SamplerCfg};
use crate::error::KnobError;

// ── GestureCfg ───────────────────────────────────────────────────────────────

impl From<&knob_config::GestureCfg> for GestureCfg {
    fn from(c: &knob_config::GestureCfg) -> Self {
        Self {
            confirm_samples: c.confirm_samples,
            double_click_ticks: c.double_click_ticks,
            single_click_ticks: c.single_click_ticks,
            long_press_ticks: c.long_press_ticks,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<knob_config::BucketOrder> for BucketOrder {
    fn from(o: knob_config::BucketOrder) -> Self {
        match o {
            knob_config::BucketOrder::Descending => Self::Descending,
            knob_config::BucketOrder::Ascending => Self::Ascending,
        }
    }
}

impl From<&knob_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &knob_config::CalibrationCfg) -> Self {
        Self {
            min_raw: c.min_raw,
            max_raw: c.max_raw,
            trigger_count: c.trigger_count,
            bucket_gap: c.bucket_gap,
            bucket_keys: c.bucket_keys,
            order: c.order.into(),
            idle_band: Band::new(c.idle_band[0], c.idle_band[1]),
            button_band: Band::new(c.button_band[0], c.button_band[1]),
        }
    }
}

// ── SamplerCfg ───────────────────────────────────────────────────────────────

impl From<&knob_config::SamplerCfg> for SamplerCfg {
    fn from(c: &knob_config::SamplerCfg) -> Self {
        Self {
            sample_rate_hz: c.sample_rate_hz,
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            event_queue: c.event_queue,
        }
    }
}

// ── BandTable ────────────────────────────────────────────────────────────────

impl TryFrom<&[knob_config::BandRow]> for BandTable {
    type Error = KnobError;

    /// Rows must cover every bin exactly once; order does not matter.
    fn try_from(rows: &[knob_config::BandRow]) -> Result<Self, Self::Error> {
        if rows.len() != BAND_COUNT {
            return Err(KnobError::Config(format!(
                "expected {BAND_COUNT} band rows, got {}",
                rows.len()
            )));
        }
        let mut bands = [None; BAND_COUNT];
        for row in rows {
            let slot = bands
                .get_mut(usize::from(row.bin))
                .ok_or_else(|| KnobError::Config(format!("bin {} out of range", row.bin)))?;
            if slot.replace(Band::new(row.low, row.high)).is_some() {
                return Err(KnobError::Config(format!("bin {} listed twice", row.bin)));
            }
        }
        let mut out = [Band::ERASED; BAND_COUNT];
        for (i, (dst, src)) in out.iter_mut().zip(bands).enumerate() {
            *dst = src.ok_or_else(|| KnobError::Config(format!("bin {i} missing")))?;
        }
        Ok(BandTable::new(out))
    }
}

impl From<&BandTable> for Vec<knob_config::BandRow> {
    fn from(t: &BandTable) -> Self {
        t.bands()
            .iter()
            .zip(0u8..)
            .map(|(b, bin)| knob_config::BandRow {
                bin,
                low: b.low,
                high: b.high,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knob_config::BandRow;

    #[test]
    fn defaults_agree_with_config_defaults() {
        let cfg = knob_config::Config::default();
        assert_eq!(GestureCfg::from(&cfg.gesture), GestureCfg::default());
        assert_eq!(CalibrationCfg::from(&cfg.calibration), CalibrationCfg::default());
        assert_eq!(SamplerCfg::from(&cfg.sampler), SamplerCfg::default());
    }

    #[test]
    fn rows_convert_in_any_order() {
        let rows = [
            BandRow { bin: 4, low: 0, high: 10 },
            BandRow { bin: 3, low: 280, high: 320 },
            BandRow { bin: 2, low: 500, high: 540 },
            BandRow { bin: 1, low: 740, high: 780 },
            BandRow { bin: 0, low: 1000, high: 1023 },
        ];
        let table = BandTable::try_from(&rows[..]).unwrap();
        assert_eq!(table.bands()[0], Band::new(1000, 1023));
        let back: Vec<BandRow> = (&table).into();
        assert_eq!(back[3], BandRow { bin: 3, low: 280, high: 320 });
    }

    #[test]
    fn duplicate_bin_is_rejected() {
        let rows = [BandRow { bin: 1, low: 1, high: 2 }; 5];
        let err = BandTable::try_from(&rows[..]).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }
}
