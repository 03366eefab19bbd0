#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the TGAM stream tools.
//!
//! - `Config` and its sections are deserialized from TOML; every section and
//!   field is optional and falls back to the headset's factory settings.
//! - `Config::validate` rejects values the runtime cannot honor before any
//!   port is touched.
use serde::Deserialize;
use serde::de::Deserializer;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

/// Stop bits as written in TOML: `1`, `1.5` or `2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl<'de> Deserialize<'de> for StopBits {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
        }
        let v = match Raw::deserialize(deserializer)? {
            Raw::Int(i) => i as f64,
            Raw::Float(f) => f,
        };
        if v == 1.0 {
            Ok(StopBits::One)
        } else if v == 1.5 {
            Ok(StopBits::OnePointFive)
        } else if v == 2.0 {
            Ok(StopBits::Two)
        } else {
            Err(serde::de::Error::custom(format!(
                "stop_bits must be 1, 1.5 or 2, got {v}"
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    /// Device name, e.g. "/dev/rfcomm0" or "COM5". May also come from the CLI.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub byte_size: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Per-read driver timeout (ms).
    pub read_timeout_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 57_600,
            byte_size: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AnalysisCfg {
    pub sample_rate_hz: u32,
    /// Raw samples kept in the band engine window.
    pub buffer_size: usize,
    /// Raw samples per band recompute. Also accepts "analysis_batch_size".
    #[serde(alias = "analysis_batch_size")]
    pub batch_size: usize,
    /// Raw samples retained by the aggregator for statistics.
    pub raw_history: usize,
    /// Recompute a partial batch after this long without one (ms).
    pub fallback_interval_ms: u64,
}

impl Default for AnalysisCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 512,
            buffer_size: 1000,
            batch_size: 64,
            raw_history: 1000,
            fallback_interval_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReaderCfg {
    /// Sleep between polls of the port (ms).
    pub poll_interval_ms: u64,
    /// Open attempts before giving up.
    pub open_retries: u32,
    /// Delay between open attempts (ms).
    pub retry_backoff_ms: u64,
    /// Per-candidate timeout when probing ports (ms).
    pub probe_timeout_ms: u64,
}

impl Default for ReaderCfg {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            open_retries: 3,
            retry_backoff_ms: 500,
            probe_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub analysis: AnalysisCfg,
    pub reader: ReaderCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.baud_rate == 0 {
            eyre::bail!("serial.baud_rate must be > 0");
        }
        if !(5..=8).contains(&self.serial.byte_size) {
            eyre::bail!("serial.byte_size must be in [5, 8]");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }
        if let Some(port) = &self.serial.port
            && port.trim().is_empty()
        {
            eyre::bail!("serial.port must not be empty when set");
        }

        // Analysis
        if self.analysis.sample_rate_hz == 0 {
            eyre::bail!("analysis.sample_rate_hz must be > 0");
        }
        if self.analysis.buffer_size == 0 {
            eyre::bail!("analysis.buffer_size must be >= 1");
        }
        if self.analysis.batch_size == 0 {
            eyre::bail!("analysis.batch_size must be >= 1");
        }
        if self.analysis.batch_size > self.analysis.buffer_size {
            eyre::bail!("analysis.batch_size must not exceed analysis.buffer_size");
        }
        if self.analysis.raw_history == 0 {
            eyre::bail!("analysis.raw_history must be >= 1");
        }
        if self.analysis.fallback_interval_ms == 0 {
            eyre::bail!("analysis.fallback_interval_ms must be >= 1");
        }

        // Reader
        if self.reader.poll_interval_ms == 0 {
            eyre::bail!("reader.poll_interval_ms must be >= 1");
        }
        if self.reader.poll_interval_ms > 1_000 {
            eyre::bail!("reader.poll_interval_ms is unreasonably large (>1s)");
        }
        if self.reader.open_retries == 0 {
            eyre::bail!("reader.open_retries must be >= 1");
        }
        if self.reader.retry_backoff_ms > 60_000 {
            eyre::bail!("reader.retry_backoff_ms is unreasonably large (>60s)");
        }
        if self.reader.probe_timeout_ms == 0 {
            eyre::bail!("reader.probe_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = &self.logging.rotation
            && !matches!(rot.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
