//! EEPROM image maintenance: show, erase, import, export, self-check.

use std::path::Path;
use std::time::Duration;

use eyre::WrapErr;
use knob_core::BandTable;
use knob_core::hw_error::map_hw_error;
use knob_traits::SampleSource;
use serde_json::json;

use crate::run::{bands_json, open_store};

fn load_table(cfg: &knob_config::Config, path: &Path) -> eyre::Result<BandTable> {
    let mut store = open_store(cfg, path)?;
    BandTable::load(&mut store, cfg.store.base_addr)
}

fn print_table(t: &BandTable, json: bool) {
    if json {
        println!(
            "{}",
            json!({ "bands": bands_json(t), "blank": t.is_blank(), "complete": !t.has_erased_slot() })
        );
    } else if t.is_blank() {
        println!("No bands stored (image is erased)");
    } else {
        println!("{t}");
    }
}

pub fn show(cfg: &knob_config::Config, path: &Path, json: bool) -> eyre::Result<()> {
    let table = load_table(cfg, path)?;
    print_table(&table, json);
    Ok(())
}

pub fn erase(cfg: &knob_config::Config, path: &Path, json: bool) -> eyre::Result<()> {
    let mut store = open_store(cfg, path)?;
    store
        .erase()
        .wrap_err_with(|| format!("erase eeprom image {}", path.display()))?;
    tracing::info!(path = %path.display(), "eeprom image erased");
    if json {
        println!("{}", json!({ "erased": path.display().to_string() }));
    } else {
        println!("Erased {}", path.display());
    }
    Ok(())
}

/// Persist a CSV table, then read it back so a bad cell is caught here.
pub fn import(cfg: &knob_config::Config, path: &Path, csv: &Path, json: bool) -> eyre::Result<()> {
    let rows = knob_config::load_bands_csv(csv)?;
    let table = BandTable::try_from(rows.as_slice())?;
    let mut store = open_store(cfg, path)?;
    table.persist(&mut store, cfg.store.base_addr)?;
    let stored = BandTable::load(&mut store, cfg.store.base_addr)?;
    if stored != table {
        eyre::bail!("read-back mismatch after import into {}", path.display());
    }
    tracing::info!(csv = %csv.display(), path = %path.display(), "bands imported");
    print_table(&stored, json);
    Ok(())
}

pub fn export(cfg: &knob_config::Config, path: &Path, csv: &Path, json: bool) -> eyre::Result<()> {
    let table = load_table(cfg, path)?;
    if table.has_erased_slot() {
        eyre::bail!(
            "stored band table is incomplete; calibrate or import before exporting"
        );
    }
    let rows: Vec<knob_config::BandRow> = (&table).into();
    knob_config::write_bands_csv(csv, &rows)?;
    if json {
        println!(
            "{}",
            json!({ "exported": csv.display().to_string(), "bands": bands_json(&table) })
        );
    } else {
        println!("Wrote {}", csv.display());
    }
    Ok(())
}

/// Config already validated by the caller; check the image and one conversion.
pub fn self_check(cfg: &knob_config::Config, path: &Path, json: bool) -> eyre::Result<()> {
    let table = load_table(cfg, path)?;
    let timeout = Duration::from_millis(cfg.sampler.read_timeout_ms);

    #[cfg(feature = "hardware")]
    let (source, raw) = {
        let hw = &cfg.hardware;
        let mut adc = knob_hardware::IioAdc::open(&hw.iio_device, hw.channel, hw.resolution_bits)
            .wrap_err("open iio adc")?;
        ("iio", adc.read(timeout).map_err(|e| map_hw_error(&*e))?)
    };
    #[cfg(not(feature = "hardware"))]
    let (source, raw) = {
        let mut sim = crate::run::sim_source(&cfg.sim, knob_hardware::Plan::rest(1));
        ("sim", sim.read(timeout).map_err(|e| map_hw_error(&*e))?)
    };

    let symbol = table.classify(raw);
    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "source": source,
                "raw": raw,
                "symbol": symbol.map(|s| s.to_string()),
                "bands_blank": table.is_blank(),
            })
        );
    } else {
        println!("Config: OK");
        println!("Store {}: OK ({})", path.display(), if table.is_blank() { "blank" } else { "bands loaded" });
        match symbol {
            Some(s) => println!("Source {source}: OK (raw {raw} -> {s})"),
            None => println!("Source {source}: OK (raw {raw}, unclassified)"),
        }
        println!("OK");
    }
    Ok(())
}
