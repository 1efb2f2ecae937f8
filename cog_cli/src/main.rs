#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `cog`: operator front-end for the center-of-gravity balancer.

mod balance;
mod cli;
mod error_fmt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use cog_core::error::BalanceError;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    if let Err(e) = real_main() {
        tracing::error!(error = %format!("{e:#}"), "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg = load_config(&cli.config, cli.calibration.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        // First Ctrl-C stops the current move; a second one exits outright.
        ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .wrap_err("installing Ctrl-C handler")?;
    }

    let backend = balance::open_backend(&cfg)?;
    match cli.cmd {
        Commands::SelfCheck => {
            balance::run_self_check(&backend, cli.json);
            Ok(())
        }
        Commands::Calibrate {
            channel,
            known_grams,
            settle_ms,
        } => balance::run_calibrate(&cfg, backend, channel, known_grams, settle_ms, cli.json),
        Commands::Goto { offset } => {
            let (mut p, bench) = balance::assemble(&cfg, backend, None, Arc::clone(&shutdown))?;
            balance::run_goto(&mut p, &bench, offset, cli.json, &shutdown)
        }
        Commands::Console => {
            let (mut p, bench) = balance::assemble(&cfg, backend, None, Arc::clone(&shutdown))?;
            let stdin = std::io::stdin();
            balance::run_console(&mut p, &bench, stdin.lock(), cli.json, &shutdown)
        }
        Commands::Read { samples } => {
            let (mut p, bench) = balance::assemble(&cfg, backend, samples, Arc::clone(&shutdown))?;
            balance::run_read(&mut p, &bench, cli.json)
        }
    }
}

/// Read, parse and validate the TOML, then apply an optional calibration CSV.
///
/// Problems with the TOML are configuration errors; problems with the CSV are
/// calibration errors.
fn load_config(path: &Path, calibration: Option<&Path>) -> eyre::Result<cog_config::Config> {
    let config_err = |msg: String| eyre::Report::new(BalanceError::Configuration(msg));

    let text = std::fs::read_to_string(path)
        .map_err(|e| config_err(format!("cannot read {}: {e}", path.display())))?;
    let mut cfg = cog_config::load_toml(&text)
        .map_err(|e| config_err(format!("invalid TOML in {}: {e}", path.display())))?;
    cfg.validate().map_err(|e| config_err(format!("{e:#}")))?;

    if let Some(csv) = calibration {
        let fitted = cog_config::load_calibration_csv(csv).map_err(|e| {
            eyre::Report::new(BalanceError::Calibration(format!(
                "{}: {e:#}",
                csv.display()
            )))
        })?;
        cfg.calibration = fitted.merged_into(cfg.calibration);
    }
    Ok(cfg)
}

/// Console layer on stderr (pretty or JSON) filtered by RUST_LOG or `--log-level`,
/// plus an optional JSON-lines file layer from `[logging]`.
fn init_tracing(json: bool, level: &str, logging: &cog_config::Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| {
            eyre::Report::new(BalanceError::Configuration(format!(
                "invalid log level {level:?}: {e}"
            )))
        })?;

    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().map_or_else(|| "cog.log".into(), |n| n.to_os_string());
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
                .map_err(|e| {
                    eyre::Report::new(BalanceError::Configuration(format!(
                        "invalid logging.level: {e}"
                    )))
                })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(())
}
