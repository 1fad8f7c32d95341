//! `knob` command-line entry point.

mod cli;
mod error_fmt;
mod run;
mod store;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::Session;

fn main() {
    // Plain panic/error hooks; our own formatter prints user-facing errors.
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(&cli.log_level, cli.json, &cfg.logging)?;
    let store = run::store_path(&cfg, cli.store.as_deref());
    tracing::debug!(store = %store.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            gestures,
            rounds,
            max_samples,
            direct,
        } => {
            let session = Session {
                cfg: &cfg,
                store,
                json: cli.json,
                shutdown: install_shutdown()?,
            };
            session.run(&gestures, rounds, max_samples, direct)?;
        }
        Commands::Calibrate { rounds, direct } => {
            let session = Session {
                cfg: &cfg,
                store,
                json: cli.json,
                shutdown: install_shutdown()?,
            };
            session.calibrate(rounds, direct)?;
        }
        Commands::Bands => store::show(&cfg, &store, cli.json)?,
        Commands::Erase => store::erase(&cfg, &store, cli.json)?,
        Commands::Import { csv } => store::import(&cfg, &store, &csv, cli.json)?,
        Commands::Export { csv } => store::export(&cfg, &store, &csv, cli.json)?,
        Commands::SelfCheck => store::self_check(&cfg, &store, cli.json)?,
    }
    Ok(())
}

/// Built-in defaults when no file is given; always validated.
fn load_config(path: Option<&Path>) -> Result<knob_config::Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))?;
            knob_config::load_toml(&text)
                .wrap_err_with(|| format!("parse config {}", p.display()))?
        }
        None => knob_config::Config::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Ctrl-C raises the flag; the runner stops after the current conversion.
fn install_shutdown() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("install Ctrl-C handler")?;
    Ok(shutdown)
}

/// Console logs go to stderr so stdout carries only reports. `RUST_LOG`
/// overrides `--log-level`. An optional JSON-lines file sink comes from
/// `[logging]`.
fn init_tracing(level: &str, json: bool, logging: &knob_config::Logging) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid --log-level {level:?}"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "never" => tracing_appender::rolling::never(dir, name),
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            other => eyre::bail!("logging.rotation must be never|daily|hourly, got {other:?}"),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
            .wrap_err("invalid logging.level")?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
