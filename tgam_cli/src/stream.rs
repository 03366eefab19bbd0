//! Live streaming: port selection, coordinator wiring and record output.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::{Result, WrapErr};
use serde::Serialize;
use serde_json::json;
use tgam_config::Config;
use tgam_core::conversions::serial_settings;
use tgam_core::{
    AnalysisCfg, Band, CombinedRecord, ConnectionError, ConnectionErrorKind, ConnectionEvent,
    Coordinator, PortEvent, PortManager, ReaderCfg, StreamEvent,
};
use tgam_hardware::SerialBackend;

pub struct StreamArgs {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub duration_ms: Option<u64>,
    pub csv: Option<PathBuf>,
    pub raw: bool,
}

fn port_manager(cfg: &Config) -> Result<PortManager<SerialBackend>> {
    let reader = ReaderCfg::from(&cfg.reader);
    Ok(PortManager::new(SerialBackend::new()).with_reader_cfg(reader)?)
}

/// Print enumerated ports, one per line or as a JSON array.
pub fn run_ports(cfg: &Config, json: bool) -> Result<()> {
    let mut pm = port_manager(cfg)?;
    let ports = pm.enumerate();
    let mut out = io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string(&ports)?)?;
    } else if ports.is_empty() {
        eprintln!("no serial ports found");
    } else {
        for p in &ports {
            writeln!(out, "{p}")?;
        }
    }
    Ok(())
}

/// One CSV row per combined record; bands flattened into columns.
#[derive(Serialize)]
struct CsvRow {
    timestamp_ms: u64,
    raw_eeg: f64,
    delta: f64,
    theta: f64,
    alpha_low: f64,
    alpha_high: f64,
    beta_low: f64,
    beta_high: f64,
    gamma_low: f64,
    gamma_high: f64,
    attention: Option<u8>,
    meditation: Option<u8>,
    signal_quality: Option<u8>,
}

impl From<&CombinedRecord> for CsvRow {
    fn from(r: &CombinedRecord) -> Self {
        let b = &r.frequency_bands;
        Self {
            timestamp_ms: r.timestamp_ms,
            raw_eeg: r.raw_eeg,
            delta: b.get(Band::Delta),
            theta: b.get(Band::Theta),
            alpha_low: b.get(Band::AlphaLow),
            alpha_high: b.get(Band::AlphaHigh),
            beta_low: b.get(Band::BetaLow),
            beta_high: b.get(Band::BetaHigh),
            gamma_low: b.get(Band::GammaLow),
            gamma_high: b.get(Band::GammaHigh),
            attention: r.attention,
            meditation: r.meditation,
            signal_quality: r.signal_quality,
        }
    }
}

/// Receives coordinator output. Failures are parked and reported after the
/// run loop returns.
struct Sink<W: Write> {
    out: W,
    raw: bool,
    csv: Option<csv::Writer<std::fs::File>>,
    shutdown: Arc<AtomicBool>,
    connection_error: Option<ConnectionError>,
    write_error: Option<eyre::Report>,
}

impl<W: Write> Sink<W> {
    fn handle(&mut self, event: StreamEvent) {
        let written = match event {
            StreamEvent::Decoded(rec) if self.raw => {
                self.line(&json!({ "event": "decoded", "record": rec }))
            }
            StreamEvent::Decoded(_) => Ok(()),
            StreamEvent::Combined(rec) => self.combined(&rec),
            StreamEvent::Connection(ConnectionEvent::Opened { port }) => {
                tracing::info!(%port, "streaming");
                Ok(())
            }
            StreamEvent::Connection(ConnectionEvent::Error(e)) => {
                tracing::error!(kind = %e.kind, message = %e.message, "connection lost");
                self.connection_error = Some(e);
                Ok(())
            }
            StreamEvent::Connection(ConnectionEvent::Closed) => {
                tracing::info!("port closed");
                self.shutdown.store(true, Ordering::Relaxed);
                Ok(())
            }
        };
        if let Err(e) = written {
            self.write_error.get_or_insert(e);
            self.shutdown.store(true, Ordering::Relaxed);
        }
    }

    fn line(&mut self, value: &serde_json::Value) -> Result<()> {
        writeln!(self.out, "{value}")?;
        Ok(())
    }

    fn combined(&mut self, rec: &CombinedRecord) -> Result<()> {
        self.line(&json!({ "event": "combined", "record": rec }))?;
        if let Some(w) = self.csv.as_mut() {
            w.serialize(CsvRow::from(rec))?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if let Some(mut w) = self.csv.take() {
            w.flush().wrap_err("flush CSV output")?;
        }
        self.out.flush()?;
        if let Some(e) = self.write_error {
            return Err(e);
        }
        if let Some(e) = self.connection_error {
            return Err(e.into());
        }
        Ok(())
    }
}

fn open_csv(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("open CSV output {}", path.display()))?;
    let fresh = file.metadata().map(|m| m.len() == 0).unwrap_or(true);
    Ok(csv::WriterBuilder::new().has_headers(fresh).from_writer(file))
}

/// Open the port, run the coordinator until Ctrl-C, the duration elapses or
/// the connection closes, then print the accumulated statistics.
pub fn run_stream(cfg: &Config, args: StreamArgs) -> Result<()> {
    let mut coordinator = Coordinator::new(AnalysisCfg::from(&cfg.analysis))?;
    let mut pm = port_manager(cfg)?;
    let ports = pm.enumerate();
    tracing::debug!(?ports, "enumerated");

    let port = args
        .port
        .or_else(|| cfg.serial.port.clone())
        .or_else(|| ports.first().cloned())
        .ok_or_else(|| {
            ConnectionError::new(ConnectionErrorKind::NotFound, "no serial ports found")
        })?;
    let mut settings = serial_settings(&cfg.serial, port);
    if let Some(baud) = args.baud {
        settings.baud_rate = baud;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }
    if let Some(ms) = args.duration_ms {
        let flag = Arc::clone(&shutdown);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(ms));
            flag.store(true, Ordering::Relaxed);
        });
    }

    let csv = args.csv.as_deref().map(open_csv).transpose()?;
    let mut sink = Sink {
        out: io::stdout().lock(),
        raw: args.raw,
        csv,
        shutdown: Arc::clone(&shutdown),
        connection_error: None,
        write_error: None,
    };

    pm.open(&settings)?;
    let events = pm.events();
    coordinator.run(&events, |ev| sink.handle(ev), &shutdown);
    pm.close();
    // The reader's final events were sent before close() returned.
    for ev in events.try_iter() {
        if let PortEvent::Error { kind, message } = ev {
            sink.connection_error.get_or_insert(ConnectionError::new(kind, message));
        }
    }

    let stats = coordinator.statistics();
    let outcome = sink.finish();
    println!("{}", json!({ "event": "statistics", "statistics": stats }));
    outcome
}
