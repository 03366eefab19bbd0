//! Runtime configuration for the stream pipeline.
//!
//! These are the structs the coordinator and port manager consume. They are
//! separate from the TOML-deserialized config in `tgam_config`; see
//! `conversions` for the bridge.

use std::time::Duration;

use crate::error::ConfigError;

/// Band analysis and aggregation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisCfg {
    pub sample_rate_hz: u32,
    /// Ring capacity of the band engine window.
    pub buffer_size: usize,
    /// Raw samples per recompute.
    pub batch_size: usize,
    /// Raw samples retained for aggregate statistics.
    pub raw_history: usize,
    /// A non-empty batch is flushed after this long without a recompute.
    pub fallback_interval: Duration,
}

impl Default for AnalysisCfg {
    fn default() -> Self {
        Self {
            sample_rate_hz: 512,
            buffer_size: 1000,
            batch_size: 64,
            raw_history: 1000,
            fallback_interval: Duration::from_millis(100),
        }
    }
}

impl AnalysisCfg {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::Invalid("sample_rate_hz must be > 0"));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be >= 1"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be >= 1"));
        }
        if self.batch_size > self.buffer_size {
            return Err(ConfigError::Invalid("batch_size must not exceed buffer_size"));
        }
        if self.raw_history == 0 {
            return Err(ConfigError::Invalid("raw_history must be >= 1"));
        }
        if self.fallback_interval.is_zero() {
            return Err(ConfigError::Invalid("fallback_interval must be > 0"));
        }
        Ok(())
    }
}

/// Port manager and reader-thread settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderCfg {
    /// Sleep between polls of the transport.
    pub poll_interval: Duration,
    pub open_retries: u32,
    pub retry_backoff: Duration,
    /// Open/close timeout per probed candidate during enumeration.
    pub probe_timeout: Duration,
}

impl Default for ReaderCfg {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            open_retries: 3,
            retry_backoff: Duration::from_millis(500),
            probe_timeout: Duration::from_millis(100),
        }
    }
}

impl ReaderCfg {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be > 0"));
        }
        if self.open_retries == 0 {
            return Err(ConfigError::Invalid("open_retries must be >= 1"));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid("probe_timeout must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AnalysisCfg::default().validate().is_ok());
        assert!(ReaderCfg::default().validate().is_ok());
    }

    #[test]
    fn batch_larger_than_buffer_is_rejected() {
        let cfg = AnalysisCfg {
            buffer_size: 32,
            ..AnalysisCfg::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Invalid("batch_size must not exceed buffer_size"))
        );
    }
}
