#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and band-table files for the knob firmware tooling.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Band tables can be imported/exported as CSV with a strict header.
use serde::{Deserialize, Serialize};

/// Band CSV schema.
///
/// Expected headers:
/// bin,low,high
///
/// Example:
/// bin,low,high
/// 0,1000,1023
/// 1,740,780
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BandRow {
    pub bin: u8,
    pub low: u16,
    pub high: u16,
}

/// Number of bins in a band table.
pub const BIN_COUNT: usize = 5;

/// Debounce and gesture timing, in conversions ("ticks").
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GestureCfg {
    /// A candidate is confirmed once it has been seen more than this many
    /// times in a row.
    pub confirm_samples: u16,
    /// Second release within this many ticks of the first is a double click.
    pub double_click_ticks: u32,
    /// A lone release is reported as a click after this many ticks.
    pub single_click_ticks: u32,
    /// Button held down longer than this enters calibration.
    pub long_press_ticks: u32,
}

impl Default for GestureCfg {
    fn default() -> Self {
        Self {
            confirm_samples: 5,
            double_click_ticks: 3_000,
            single_click_ticks: 8_000,
            long_press_ticks: 65_534,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BucketOrder {
    /// Highest voltage first: bins 1..3 follow the ladder from the idle end.
    #[default]
    Descending,
    /// Lowest voltage first.
    Ascending,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Samples below this are treated as noise / button level.
    pub min_raw: u16,
    /// Samples above this are treated as noise / idle level.
    pub max_raw: u16,
    /// Calibration completes once any value has been seen more than this often.
    pub trigger_count: u16,
    /// Neighbouring values further apart than this start a new bin.
    pub bucket_gap: u16,
    /// How many of the most frequent values feed the bucketing pass.
    pub bucket_keys: usize,
    pub order: BucketOrder,
    /// Fixed bin 0 (idle), `[low, high]`.
    pub idle_band: [u16; 2],
    /// Fixed bin 4 (button down), `[low, high]`.
    pub button_band: [u16; 2],
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            min_raw: 10,
            max_raw: 1_000,
            trigger_count: 2_000,
            bucket_gap: 50,
            bucket_keys: 12,
            order: BucketOrder::Descending,
            idle_band: [1_000, 1_023],
            button_band: [0, 10],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Background conversion thread, events delivered over a channel.
    #[default]
    Sampler,
    /// Run the pipeline inline on the calling thread.
    Direct,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SamplerCfg {
    /// Conversion rate; 0 means "as fast as the source delivers".
    pub sample_rate_hz: u32,
    /// Max time to wait for a single conversion.
    pub read_timeout_ms: u64,
    /// Capacity of the event queue between the pipeline and the reporter.
    pub event_queue: usize,
    pub mode: RunMode,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 0,
            read_timeout_ms: 5,
            event_queue: 64,
            mode: RunMode::Sampler,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreCfg {
    /// Host file holding the EEPROM image.
    pub path: String,
    /// Byte address of bin 0.
    pub base_addr: u16,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "knob_eeprom.bin".to_string(),
            base_addr: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Peak ADC noise in counts.
    pub noise: u16,
    /// Contact bounce conversions after each position change.
    pub bounce: u32,
    pub seed: u32,
    /// Nominal levels `[open, a, b, both, button]`.
    pub levels: [u16; 5],
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            noise: 2,
            bounce: 3,
            seed: 0x2545_F491,
            levels: [1_015, 760, 520, 300, 4],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Hardware {
    /// IIO device directory, e.g. `/sys/bus/iio/devices/iio:device0`.
    pub iio_device: String,
    pub channel: u8,
    pub resolution_bits: u32,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            iio_device: "/sys/bus/iio/devices/iio:device0".to_string(),
            channel: 0,
            resolution_bits: 10,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub gesture: GestureCfg,
    pub calibration: CalibrationCfg,
    pub sampler: SamplerCfg,
    pub store: StoreCfg,
    pub sim: SimCfg,
    pub hardware: Hardware,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Histogram capacity of the calibration engine; `bucket_keys` cannot exceed
/// the number of ranked keys taken from it.
pub const MAX_BUCKET_KEYS: usize = 16;

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Gesture
        let g = &self.gesture;
        if g.confirm_samples == 0 {
            eyre::bail!("gesture.confirm_samples must be >= 1");
        }
        if g.double_click_ticks == 0 {
            eyre::bail!("gesture.double_click_ticks must be >= 1");
        }
        if g.double_click_ticks >= g.single_click_ticks {
            eyre::bail!("gesture.double_click_ticks must be < gesture.single_click_ticks");
        }
        if g.long_press_ticks <= u32::from(g.confirm_samples) {
            eyre::bail!("gesture.long_press_ticks must be > gesture.confirm_samples");
        }

        // Calibration
        let c = &self.calibration;
        if c.min_raw >= c.max_raw {
            eyre::bail!("calibration.min_raw must be < calibration.max_raw");
        }
        if c.trigger_count == 0 || c.trigger_count == u16::MAX {
            eyre::bail!("calibration.trigger_count must be in [1, 65534]");
        }
        if c.bucket_gap == 0 {
            eyre::bail!("calibration.bucket_gap must be >= 1");
        }
        if c.bucket_keys < 3 || c.bucket_keys > MAX_BUCKET_KEYS {
            eyre::bail!("calibration.bucket_keys must be in [3, {MAX_BUCKET_KEYS}]");
        }
        for (name, band) in [("idle_band", c.idle_band), ("button_band", c.button_band)] {
            if band[0] > band[1] {
                eyre::bail!("calibration.{name} must have low <= high");
            }
            if band.contains(&0xFFFF) {
                eyre::bail!("calibration.{name} must not use the erased value 0xFFFF");
            }
        }

        // Sampler
        if self.sampler.read_timeout_ms == 0 {
            eyre::bail!("sampler.read_timeout_ms must be >= 1");
        }
        if self.sampler.event_queue == 0 {
            eyre::bail!("sampler.event_queue must be >= 1");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }
        if usize::from(self.store.base_addr) + BIN_COUNT * 4 > 0x1_0000 {
            eyre::bail!("store.base_addr leaves no room for {BIN_COUNT} bins");
        }

        // Sim
        if self.sim.levels.iter().any(|&l| l > 1_023) {
            eyre::bail!("sim.levels must be 10-bit values (<= 1023)");
        }

        // Hardware
        if !(8..=16).contains(&self.hardware.resolution_bits) {
            eyre::bail!("hardware.resolution_bits must be in [8, 16]");
        }

        Ok(())
    }
}

/// Load a band table from CSV with exact `bin,low,high` headers.
///
/// Returns rows ordered by bin; every bin 0..5 must appear exactly once.
pub fn load_bands_csv(path: &std::path::Path) -> eyre::Result<Vec<BandRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open band CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["bin", "low", "high"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "band CSV must have headers 'bin,low,high', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<BandRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    check_rows(&mut rows)?;
    Ok(rows)
}

fn check_rows(rows: &mut [BandRow]) -> eyre::Result<()> {
    if rows.len() != BIN_COUNT {
        eyre::bail!("band CSV must contain exactly {BIN_COUNT} rows, got {}", rows.len());
    }
    rows.sort_by_key(|r| r.bin);
    for (i, row) in rows.iter().enumerate() {
        if usize::from(row.bin) != i {
            eyre::bail!("band CSV must list bins 0..{BIN_COUNT} exactly once");
        }
        if row.low > row.high {
            eyre::bail!("bin {}: low {} > high {}", row.bin, row.low, row.high);
        }
        if row.low == 0xFFFF || row.high == 0xFFFF {
            eyre::bail!("bin {}: 0xFFFF is reserved for erased cells", row.bin);
        }
    }
    Ok(())
}

/// Write a band table as CSV with `bin,low,high` headers.
pub fn write_bands_csv(path: &std::path::Path, rows: &[BandRow]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create band CSV {:?}: {}", path, e))?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
