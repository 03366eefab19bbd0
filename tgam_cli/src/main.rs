mod cli;
mod decode;
mod error_fmt;
mod stream;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::stream::StreamArgs;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    if let Err(err) = run(cli) {
        let code = error_fmt::exit_code_for_error(&err);
        tracing::debug!(error = ?err, code, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    init_tracing(cli.json, level, &cfg.logging)?;

    match cli.cmd {
        Commands::Ports => stream::run_ports(&cfg, cli.json),
        Commands::Stream {
            port,
            baud,
            duration_ms,
            csv,
            raw,
        } => stream::run_stream(
            &cfg,
            StreamArgs {
                port,
                baud,
                duration_ms,
                csv,
                raw,
            },
        ),
        Commands::Decode { file } => decode::run_decode(&file),
        Commands::SelfCheck => self_check(&cfg),
    }
}

fn load_config(path: Option<&Path>) -> Result<tgam_config::Config> {
    match path {
        Some(p) => tgam_config::load_file(p),
        None => {
            let cfg = tgam_config::Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}

/// The file-level checks passed in `load_config`; repeat the runtime ones so
/// a bad analysis or reader section fails here instead of mid-stream.
fn self_check(cfg: &tgam_config::Config) -> Result<()> {
    let analysis = tgam_core::AnalysisCfg::from(&cfg.analysis);
    analysis.validate()?;
    tgam_core::ReaderCfg::from(&cfg.reader).validate()?;
    tgam_core::Coordinator::new(analysis)?;
    tracing::debug!(?cfg, "configuration accepted");
    println!("ok");
    Ok(())
}

fn init_tracing(json: bool, level: &str, logging: &tgam_config::Logging) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    // Console logs go to stderr; stdout carries records.
    let console: BoxedLayer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };
    let mut layers = vec![console];

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => rolling::daily(dir, name),
            Some("hourly") => rolling::hourly(dir, name),
            _ => rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
