//! Bridges from `tgam_config` file types to runtime and transport types.

use std::time::Duration;

use tgam_traits::{FlowControl, Parity, SerialSettings, StopBits};

use crate::config::{AnalysisCfg, ReaderCfg};

// ── AnalysisCfg ──────────────────────────────────────────────────────────────

impl From<&tgam_config::AnalysisCfg> for AnalysisCfg {
    fn from(c: &tgam_config::AnalysisCfg) -> Self {
        Self {
            sample_rate_hz: c.sample_rate_hz,
            buffer_size: c.buffer_size,
            batch_size: c.batch_size,
            raw_history: c.raw_history,
            fallback_interval: Duration::from_millis(c.fallback_interval_ms),
        }
    }
}

// ── ReaderCfg ────────────────────────────────────────────────────────────────

impl From<&tgam_config::ReaderCfg> for ReaderCfg {
    fn from(c: &tgam_config::ReaderCfg) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            open_retries: c.open_retries,
            retry_backoff: Duration::from_millis(c.retry_backoff_ms),
            probe_timeout: Duration::from_millis(c.probe_timeout_ms),
        }
    }
}

// ── Serial framing ───────────────────────────────────────────────────────────

fn parity(p: tgam_config::Parity) -> Parity {
    match p {
        tgam_config::Parity::None => Parity::None,
        tgam_config::Parity::Even => Parity::Even,
        tgam_config::Parity::Odd => Parity::Odd,
        tgam_config::Parity::Mark => Parity::Mark,
        tgam_config::Parity::Space => Parity::Space,
    }
}

fn stop_bits(s: tgam_config::StopBits) -> StopBits {
    match s {
        tgam_config::StopBits::One => StopBits::One,
        tgam_config::StopBits::OnePointFive => StopBits::OnePointFive,
        tgam_config::StopBits::Two => StopBits::Two,
    }
}

fn flow_control(f: tgam_config::FlowControl) -> FlowControl {
    match f {
        tgam_config::FlowControl::None => FlowControl::None,
        tgam_config::FlowControl::Hardware => FlowControl::Hardware,
        tgam_config::FlowControl::Software => FlowControl::Software,
    }
}

/// Build open parameters for `port_name` from the `[serial]` section.
pub fn serial_settings(c: &tgam_config::SerialCfg, port_name: impl Into<String>) -> SerialSettings {
    SerialSettings {
        port_name: port_name.into(),
        baud_rate: c.baud_rate,
        byte_size: c.byte_size,
        parity: parity(c.parity),
        stop_bits: stop_bits(c.stop_bits),
        flow_control: flow_control(c.flow_control),
        read_timeout: Duration::from_millis(c.read_timeout_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_maps_to_runtime() {
        let cfg = tgam_config::load_toml(
            "[serial]\nparity = \"even\"\nstop_bits = 2\n[analysis]\nfallback_interval_ms = 250\n",
        )
        .unwrap();
        let analysis = AnalysisCfg::from(&cfg.analysis);
        assert_eq!(analysis.fallback_interval, Duration::from_millis(250));
        assert_eq!(analysis.batch_size, 64);
        let reader = ReaderCfg::from(&cfg.reader);
        assert_eq!(reader, ReaderCfg::default());
        let s = serial_settings(&cfg.serial, "COM5");
        assert_eq!(s.port_name, "COM5");
        assert_eq!(s.parity, Parity::Even);
        assert_eq!(s.stop_bits, StopBits::Two);
        assert_eq!(s.baud_rate, 57_600);
    }

    #[test]
    fn every_framing_option_maps_to_its_transport_twin() {
        let cfg = tgam_config::load_toml(
            "[serial]\nparity = \"space\"\nstop_bits = 1.5\nflow_control = \"hardware\"\n",
        )
        .unwrap();
        let s = serial_settings(&cfg.serial, "/dev/rfcomm0");
        assert_eq!(s.parity, Parity::Space);
        assert_eq!(s.stop_bits, StopBits::OnePointFive);
        assert_eq!(s.flow_control, FlowControl::Hardware);
        assert_eq!(parity(tgam_config::Parity::Mark), Parity::Mark);
        assert_eq!(stop_bits(tgam_config::StopBits::One), StopBits::One);
        assert_eq!(flow_control(tgam_config::FlowControl::Software), FlowControl::Software);
    }
}
