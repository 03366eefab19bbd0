//! Windowed decomposition of the raw waveform into eight band magnitudes.
//!
//! Samples accumulate in a bounded ring. Each recompute filters the whole
//! window per band and keeps only the final output sample as that band's
//! value; the previous set stays visible until the new one is complete.

use std::collections::VecDeque;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::aggregator::AggregateStats;
use crate::error::ConfigError;
use crate::filters::{Sos, moving_average_same};
use crate::records::{Band, BandPowerSet};

/// Fewer samples than this and a recompute is skipped.
pub const MIN_SAMPLES: usize = 64;
/// Box width of the fallback low-pass.
pub const FALLBACK_WINDOW: usize = 8;
pub const FILTER_ORDER: usize = 4;

const EDGE_MIN: f64 = 0.001;
const EDGE_MAX: f64 = 0.99;

/// How one band turns the window into a value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStrategy {
    BandPass(Sos),
    MovingAverage { window: usize },
}

impl FilterStrategy {
    /// Pick the filter for `band` at `sample_rate_hz`.
    pub fn design(band: Band, sample_rate_hz: u32) -> Self {
        let nyquist = f64::from(sample_rate_hz) / 2.0;
        let (lo_hz, hi_hz) = band.range_hz();
        let low = (lo_hz / nyquist).clamp(EDGE_MIN, EDGE_MAX);
        let high = (hi_hz / nyquist).clamp(EDGE_MIN, EDGE_MAX);
        if low < high
            && let Some(sos) = Sos::butter_bandpass(FILTER_ORDER, low, high)
        {
            return FilterStrategy::BandPass(sos);
        }
        tracing::debug!(band = band.name(), sample_rate_hz, "band uses moving-average fallback");
        FilterStrategy::MovingAverage {
            window: FALLBACK_WINDOW,
        }
    }

    pub fn is_band_pass(&self) -> bool {
        matches!(self, FilterStrategy::BandPass(_))
    }

    /// Last output sample of this filter over `samples`.
    fn last_output(&self, samples: &[f64]) -> f64 {
        let filtered = match self {
            FilterStrategy::BandPass(sos) => sos
                .filtfilt(samples)
                .unwrap_or_else(|| moving_average_same(samples, FALLBACK_WINDOW)),
            FilterStrategy::MovingAverage { window } => moving_average_same(samples, *window),
        };
        filtered.last().copied().unwrap_or(0.0)
    }
}

/// Per-band summary of retained band values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandStatistics(pub [Option<AggregateStats>; 8]);

impl BandStatistics {
    pub fn get(&self, band: Band) -> Option<AggregateStats> {
        self.0[band.index()]
    }
}

impl Serialize for BandStatistics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(8))?;
        for band in Band::ALL {
            map.serialize_entry(band.name(), &self.0[band.index()])?;
        }
        map.end()
    }
}

#[derive(Debug)]
pub struct BandEngine {
    sample_rate_hz: u32,
    capacity: usize,
    window: VecDeque<f64>,
    strategies: Vec<FilterStrategy>,
    current: BandPowerSet,
    history: [VecDeque<f64>; 8],
    recomputes: u64,
}

impl BandEngine {
    pub fn new(sample_rate_hz: u32, capacity: usize) -> Result<Self, ConfigError> {
        check_rate(sample_rate_hz)?;
        check_capacity(capacity)?;
        Ok(Self {
            sample_rate_hz,
            capacity,
            window: VecDeque::with_capacity(capacity),
            strategies: design_all(sample_rate_hz),
            current: BandPowerSet::default(),
            history: Default::default(),
            recomputes: 0,
        })
    }

    /// Append one sample (microvolts), evicting the oldest when full.
    pub fn push(&mut self, microvolts: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(microvolts);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Recompute every band from the current window.
    ///
    /// Returns `false` (and changes nothing) while fewer than
    /// [`MIN_SAMPLES`] samples are buffered.
    pub fn recompute(&mut self) -> bool {
        if self.window.len() < MIN_SAMPLES {
            return false;
        }
        let samples: &[f64] = self.window.make_contiguous();
        let mut next = [0.0; 8];
        for (value, strategy) in next.iter_mut().zip(&self.strategies) {
            *value = strategy.last_output(samples);
        }
        self.current = BandPowerSet(next);
        for (hist, value) in self.history.iter_mut().zip(next) {
            if hist.len() == self.capacity {
                hist.pop_front();
            }
            hist.push_back(value);
        }
        self.recomputes += 1;
        tracing::trace!(samples = self.window.len(), "bands recomputed");
        true
    }

    /// Latest band values (zeros before the first recompute).
    pub fn current(&self) -> BandPowerSet {
        self.current
    }

    pub fn relative_power(&self) -> BandPowerSet {
        self.current.relative()
    }

    /// Retained values of `band`, oldest first.
    pub fn history(&self, band: Band) -> impl Iterator<Item = f64> + Clone + '_ {
        self.history[band.index()].iter().copied()
    }

    pub fn band_statistics(&self) -> BandStatistics {
        BandStatistics(Band::ALL.map(|b| AggregateStats::from_values(self.history(b))))
    }

    pub fn strategy(&self, band: Band) -> &FilterStrategy {
        &self.strategies[band.index()]
    }

    /// Successful recomputes since construction or the last clear.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    /// Drop samples, band values and history. Settings are kept.
    pub fn clear(&mut self) {
        self.window.clear();
        self.current = BandPowerSet::default();
        for h in &mut self.history {
            h.clear();
        }
        self.recomputes = 0;
    }

    /// Change the window capacity, keeping the newest samples.
    pub fn resize(&mut self, capacity: usize) -> Result<(), ConfigError> {
        check_capacity(capacity)?;
        while self.window.len() > capacity {
            self.window.pop_front();
        }
        for h in &mut self.history {
            while h.len() > capacity {
                h.pop_front();
            }
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Rebuild the filter bank for a new rate. Buffered samples are dropped.
    pub fn set_sample_rate(&mut self, sample_rate_hz: u32) -> Result<(), ConfigError> {
        check_rate(sample_rate_hz)?;
        self.sample_rate_hz = sample_rate_hz;
        self.strategies = design_all(sample_rate_hz);
        self.clear();
        Ok(())
    }
}

fn design_all(sample_rate_hz: u32) -> Vec<FilterStrategy> {
    Band::ALL
        .iter()
        .map(|b| FilterStrategy::design(*b, sample_rate_hz))
        .collect()
}

fn check_rate(sample_rate_hz: u32) -> Result<(), ConfigError> {
    if sample_rate_hz == 0 {
        return Err(ConfigError::Invalid("sample_rate_hz must be > 0"));
    }
    Ok(())
}

fn check_capacity(capacity: usize) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::Invalid("buffer_size must be >= 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_bands_get_band_pass_at_512_hz() {
        let engine = BandEngine::new(512, 1000).unwrap();
        for band in Band::ALL {
            assert!(engine.strategy(band).is_band_pass(), "{}", band.name());
        }
    }

    #[test]
    fn bands_above_nyquist_fall_back() {
        // Nyquist 32 Hz: both gamma_high edges clamp to 0.99.
        let engine = BandEngine::new(64, 1000).unwrap();
        assert_eq!(
            engine.strategy(Band::GammaHigh),
            &FilterStrategy::MovingAverage { window: 8 }
        );
        assert!(engine.strategy(Band::GammaLow).is_band_pass());
    }

    #[test]
    fn short_window_recompute_is_skipped() {
        let mut engine = BandEngine::new(512, 1000).unwrap();
        for _ in 0..MIN_SAMPLES - 1 {
            engine.push(1.0);
        }
        assert!(!engine.recompute());
        assert_eq!(engine.recompute_count(), 0);
        engine.push(1.0);
        assert!(engine.recompute());
        assert_eq!(engine.recompute_count(), 1);
    }

    #[test]
    fn invalid_settings_are_rejected_without_change() {
        let mut engine = BandEngine::new(512, 100).unwrap();
        engine.push(1.0);
        assert!(engine.resize(0).is_err());
        assert!(engine.set_sample_rate(0).is_err());
        assert_eq!(engine.capacity(), 100);
        assert_eq!(engine.sample_rate_hz(), 512);
        assert_eq!(engine.len(), 1);
        assert!(BandEngine::new(0, 10).is_err());
    }
}
