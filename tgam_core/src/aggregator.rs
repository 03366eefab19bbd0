//! Per-kind rolling statistics over decoded records.
//!
//! Records are routed through a table indexed by [`RecordKind`]; each kind
//! owns one accumulator that can be cleared on its own.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::ConfigError;
use crate::records::{BandPowerSet, DecodedRecord, RecordKind, SignalLevel};

/// Summary of a run of values. Standard deviation is the population one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
}

impl AggregateStats {
    /// `None` for an empty iterator.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
        I::IntoIter: Clone,
    {
        let it = values.into_iter();
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut latest = 0.0;
        for v in it.clone() {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
            latest = v;
        }
        if count == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        let mean = sum / n;
        let var = it.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Some(Self {
            count,
            mean,
            std: var.sqrt(),
            min,
            max,
            latest,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedValue {
    pub timestamp_ms: u64,
    pub value: f64,
}

#[derive(Debug)]
struct RawAccumulator {
    capacity: usize,
    samples: VecDeque<TimedValue>,
}

impl RawAccumulator {
    fn push(&mut self, value: f64, timestamp_ms: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(TimedValue {
            timestamp_ms,
            value,
        });
    }

    fn stats(&self) -> Option<AggregateStats> {
        AggregateStats::from_values(self.samples.iter().map(|s| s.value))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ScalarAccumulator {
    latest: Option<u8>,
    updated_ms: Option<u64>,
    count: u64,
}

impl ScalarAccumulator {
    fn set(&mut self, value: u8, timestamp_ms: u64) {
        self.latest = Some(value);
        self.updated_ms = Some(timestamp_ms);
        self.count += 1;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PowerAccumulator {
    latest: Option<[u32; 8]>,
    count: u64,
}

impl PowerAccumulator {
    fn relative(&self) -> Option<BandPowerSet> {
        self.latest
            .map(|bands| BandPowerSet(bands.map(f64::from)).relative())
    }
}

/// Owned view of every accumulator, suitable for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub raw: Option<AggregateStats>,
    pub signal_quality: Option<u8>,
    pub signal_level: Option<SignalLevel>,
    pub attention: Option<u8>,
    pub meditation: Option<u8>,
    pub blink: Option<u8>,
    pub power_bands: Option<[u32; 8]>,
    pub relative_power: Option<BandPowerSet>,
    /// Records seen per kind since the last clear, in `RecordKind::ALL` order.
    pub counts: [u64; RecordKind::COUNT],
}

type Handler = fn(&mut Aggregator, &DecodedRecord, u64);

const HANDLERS: [Handler; RecordKind::COUNT] = [
    Aggregator::on_raw,
    Aggregator::on_signal_quality,
    Aggregator::on_attention,
    Aggregator::on_meditation,
    Aggregator::on_blink,
    Aggregator::on_power_bands,
];

#[derive(Debug)]
pub struct Aggregator {
    raw: RawAccumulator,
    raw_count: u64,
    signal_quality: ScalarAccumulator,
    attention: ScalarAccumulator,
    meditation: ScalarAccumulator,
    blink: ScalarAccumulator,
    power: PowerAccumulator,
}

impl Aggregator {
    /// `raw_history` bounds the raw samples kept for statistics.
    pub fn new(raw_history: usize) -> Result<Self, ConfigError> {
        if raw_history == 0 {
            return Err(ConfigError::Invalid("raw_history must be >= 1"));
        }
        Ok(Self {
            raw: RawAccumulator {
                capacity: raw_history,
                samples: VecDeque::with_capacity(raw_history),
            },
            raw_count: 0,
            signal_quality: ScalarAccumulator::default(),
            attention: ScalarAccumulator::default(),
            meditation: ScalarAccumulator::default(),
            blink: ScalarAccumulator::default(),
            power: PowerAccumulator::default(),
        })
    }

    /// Route one record to its accumulator.
    pub fn ingest(&mut self, record: &DecodedRecord, timestamp_ms: u64) {
        HANDLERS[record.kind().index()](self, record, timestamp_ms);
    }

    fn on_raw(&mut self, record: &DecodedRecord, ts: u64) {
        if let DecodedRecord::RawSample { microvolts, .. } = *record {
            self.raw.push(microvolts, ts);
            self.raw_count += 1;
        }
    }

    fn on_signal_quality(&mut self, record: &DecodedRecord, ts: u64) {
        if let DecodedRecord::SignalQuality { value } = *record {
            self.signal_quality.set(value, ts);
        }
    }

    fn on_attention(&mut self, record: &DecodedRecord, ts: u64) {
        if let DecodedRecord::Attention { value } = *record {
            self.attention.set(value, ts);
        }
    }

    fn on_meditation(&mut self, record: &DecodedRecord, ts: u64) {
        if let DecodedRecord::Meditation { value } = *record {
            self.meditation.set(value, ts);
        }
    }

    fn on_blink(&mut self, record: &DecodedRecord, ts: u64) {
        if let DecodedRecord::Blink { strength } = *record {
            self.blink.set(strength, ts);
        }
    }

    fn on_power_bands(&mut self, record: &DecodedRecord, _ts: u64) {
        if let DecodedRecord::PowerBands { bands } = *record {
            self.power.latest = Some(bands);
            self.power.count += 1;
        }
    }

    pub fn raw_stats(&self) -> Option<AggregateStats> {
        self.raw.stats()
    }

    /// Retained raw samples, oldest first.
    pub fn raw_samples(&self) -> impl Iterator<Item = &TimedValue> + '_ {
        self.raw.samples.iter()
    }

    pub fn raw_capacity(&self) -> usize {
        self.raw.capacity
    }

    /// Change the raw history bound, dropping the oldest samples if needed.
    pub fn set_raw_history(&mut self, raw_history: usize) -> Result<(), ConfigError> {
        if raw_history == 0 {
            return Err(ConfigError::Invalid("raw_history must be >= 1"));
        }
        while self.raw.samples.len() > raw_history {
            self.raw.samples.pop_front();
        }
        self.raw.capacity = raw_history;
        Ok(())
    }

    pub fn signal_quality(&self) -> Option<u8> {
        self.signal_quality.latest
    }

    pub fn signal_level(&self) -> Option<SignalLevel> {
        self.signal_quality.latest.map(SignalLevel::from_quality)
    }

    pub fn attention(&self) -> Option<u8> {
        self.attention.latest
    }

    pub fn meditation(&self) -> Option<u8> {
        self.meditation.latest
    }

    pub fn blink(&self) -> Option<u8> {
        self.blink.latest
    }

    /// Clock reading of the latest scalar of `kind`, if any.
    pub fn last_updated_ms(&self, kind: RecordKind) -> Option<u64> {
        match kind {
            RecordKind::RawSample => self.raw.samples.back().map(|s| s.timestamp_ms),
            RecordKind::SignalQuality => self.signal_quality.updated_ms,
            RecordKind::Attention => self.attention.updated_ms,
            RecordKind::Meditation => self.meditation.updated_ms,
            RecordKind::Blink => self.blink.updated_ms,
            RecordKind::PowerBands => None,
        }
    }

    pub fn power_bands(&self) -> Option<[u32; 8]> {
        self.power.latest
    }

    /// Relative device-side band power; all zero when the total is zero.
    pub fn relative_power(&self) -> Option<BandPowerSet> {
        self.power.relative()
    }

    pub fn count(&self, kind: RecordKind) -> u64 {
        match kind {
            RecordKind::RawSample => self.raw_count,
            RecordKind::SignalQuality => self.signal_quality.count,
            RecordKind::Attention => self.attention.count,
            RecordKind::Meditation => self.meditation.count,
            RecordKind::Blink => self.blink.count,
            RecordKind::PowerBands => self.power.count,
        }
    }

    pub fn clear_kind(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::RawSample => {
                self.raw.samples.clear();
                self.raw_count = 0;
            }
            RecordKind::SignalQuality => self.signal_quality = ScalarAccumulator::default(),
            RecordKind::Attention => self.attention = ScalarAccumulator::default(),
            RecordKind::Meditation => self.meditation = ScalarAccumulator::default(),
            RecordKind::Blink => self.blink = ScalarAccumulator::default(),
            RecordKind::PowerBands => self.power = PowerAccumulator::default(),
        }
    }

    pub fn clear(&mut self) {
        for kind in RecordKind::ALL {
            self.clear_kind(kind);
        }
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            raw: self.raw_stats(),
            signal_quality: self.signal_quality(),
            signal_level: self.signal_level(),
            attention: self.attention(),
            meditation: self.meditation(),
            blink: self.blink(),
            power_bands: self.power_bands(),
            relative_power: self.relative_power(),
            counts: RecordKind::ALL.map(|k| self.count(k)),
        }
    }
}
