//! Merges decoded records into combined band/scalar output.
//!
//! Raw samples feed the band engine in batches. A batch is flushed when it
//! reaches `batch_size`, or by [`Coordinator::tick`] once the fallback
//! interval has passed with samples still pending. Every flush recomputes
//! the bands and yields one [`CombinedRecord`] carrying the latest cached
//! attention, meditation and signal quality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use serde::Serialize;
use tgam_traits::{Clock, MonotonicClock};

use crate::aggregator::{AggregateSnapshot, Aggregator};
use crate::bands::{BandEngine, BandStatistics};
use crate::config::AnalysisCfg;
use crate::error::{ConfigError, ConnectionError};
use crate::port::PortEvent;
use crate::records::{BandPowerSet, CombinedRecord, DecodedRecord};

/// Connection lifecycle as seen by stream consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened { port: String },
    Error(ConnectionError),
    Closed,
}

/// Output of [`Coordinator::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Decoded(DecodedRecord),
    Combined(CombinedRecord),
    Connection(ConnectionEvent),
}

/// On-demand view of everything the coordinator has accumulated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStatistics {
    pub aggregate: AggregateSnapshot,
    pub bands: BandStatistics,
    pub current_bands: BandPowerSet,
    pub relative_bands: BandPowerSet,
    pub recomputes: u64,
    pub combined_emitted: u64,
}

pub struct Coordinator<C: Clock = MonotonicClock> {
    clock: C,
    epoch: Instant,
    cfg: AnalysisCfg,
    engine: BandEngine,
    aggregator: Aggregator,
    latest_raw: f64,
    attention: Option<u8>,
    meditation: Option<u8>,
    signal_quality: Option<u8>,
    batch: usize,
    last_flush: Instant,
    running: bool,
    emitted: u64,
}

impl Coordinator<MonotonicClock> {
    pub fn new(cfg: AnalysisCfg) -> Result<Self, ConfigError> {
        Self::with_clock(cfg, MonotonicClock::new())
    }
}

impl<C: Clock> Coordinator<C> {
    pub fn with_clock(cfg: AnalysisCfg, clock: C) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let engine = BandEngine::new(cfg.sample_rate_hz, cfg.buffer_size)?;
        let aggregator = Aggregator::new(cfg.raw_history)?;
        let epoch = clock.now();
        Ok(Self {
            clock,
            epoch,
            cfg,
            engine,
            aggregator,
            latest_raw: 0.0,
            attention: None,
            meditation: None,
            signal_quality: None,
            batch: 0,
            last_flush: epoch,
            running: true,
            emitted: 0,
        })
    }

    /// Process one record. Returns a combined record when this sample
    /// completed a batch.
    pub fn handle(&mut self, record: DecodedRecord) -> Option<CombinedRecord> {
        if !self.running {
            return None;
        }
        let ts = self.clock.ms_since(self.epoch);
        self.aggregator.ingest(&record, ts);
        match record {
            DecodedRecord::RawSample { microvolts, .. } => {
                self.latest_raw = microvolts;
                self.engine.push(microvolts);
                self.batch += 1;
                if self.batch >= self.cfg.batch_size {
                    return Some(self.flush());
                }
            }
            DecodedRecord::Attention { value } => self.attention = Some(value),
            DecodedRecord::Meditation { value } => self.meditation = Some(value),
            DecodedRecord::SignalQuality { value } => self.signal_quality = Some(value),
            DecodedRecord::Blink { .. } | DecodedRecord::PowerBands { .. } => {}
        }
        None
    }

    /// Flush a pending partial batch once the fallback interval has passed.
    pub fn tick(&mut self) -> Option<CombinedRecord> {
        if self.running
            && self.batch > 0
            && self
                .clock
                .has_elapsed(self.last_flush, self.cfg.fallback_interval)
        {
            tracing::trace!(pending = self.batch, "fallback flush");
            return Some(self.flush());
        }
        None
    }

    fn flush(&mut self) -> CombinedRecord {
        self.engine.recompute();
        self.batch = 0;
        self.last_flush = self.clock.now();
        self.emitted += 1;
        CombinedRecord {
            timestamp_ms: self.clock.ms_since(self.epoch),
            raw_eeg: self.latest_raw,
            frequency_bands: self.engine.current(),
            attention: self.attention,
            meditation: self.meditation,
            signal_quality: self.signal_quality,
        }
    }

    /// Resume processing. Buffers are kept.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.last_flush = self.clock.now();
            tracing::info!("coordinator started");
        }
    }

    /// Pause processing; records handled while stopped are dropped.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            tracing::info!("coordinator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Clear the sample window, aggregates, cached scalars and pending batch.
    pub fn reset(&mut self) {
        self.engine.clear();
        self.aggregator.clear();
        self.latest_raw = 0.0;
        self.attention = None;
        self.meditation = None;
        self.signal_quality = None;
        self.batch = 0;
        self.emitted = 0;
        self.last_flush = self.clock.now();
        tracing::debug!("coordinator reset");
    }

    pub fn set_sample_rate(&mut self, sample_rate_hz: u32) -> Result<(), ConfigError> {
        self.engine.set_sample_rate(sample_rate_hz)?;
        self.cfg.sample_rate_hz = sample_rate_hz;
        self.batch = 0;
        Ok(())
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) -> Result<(), ConfigError> {
        if buffer_size < self.cfg.batch_size {
            return Err(ConfigError::Invalid("batch_size must not exceed buffer_size"));
        }
        self.engine.resize(buffer_size)?;
        self.cfg.buffer_size = buffer_size;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<(), ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be >= 1"));
        }
        if batch_size > self.cfg.buffer_size {
            return Err(ConfigError::Invalid("batch_size must not exceed buffer_size"));
        }
        self.cfg.batch_size = batch_size;
        Ok(())
    }

    pub fn config(&self) -> &AnalysisCfg {
        &self.cfg
    }

    pub fn engine(&self) -> &BandEngine {
        &self.engine
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Raw samples waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.batch
    }

    pub fn latest_raw(&self) -> f64 {
        self.latest_raw
    }

    pub fn statistics(&self) -> StreamStatistics {
        StreamStatistics {
            aggregate: self.aggregator.snapshot(),
            bands: self.engine.band_statistics(),
            current_bands: self.engine.current(),
            relative_bands: self.engine.relative_power(),
            recomputes: self.engine.recompute_count(),
            combined_emitted: self.emitted,
        }
    }

    /// Drive the coordinator from a port event stream until `shutdown` is set
    /// or every sender is gone.
    ///
    /// The receive wait never exceeds the fallback interval, so partial
    /// batches are flushed even when the stream stalls.
    pub fn run<F>(&mut self, events: &xch::Receiver<PortEvent>, mut sink: F, shutdown: &AtomicBool)
    where
        F: FnMut(StreamEvent),
    {
        let wake = self.cfg.fallback_interval.max(Duration::from_millis(1));
        loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::debug!("coordinator run loop shutting down");
                break;
            }
            match events.recv_timeout(wake) {
                Ok(event) => self.dispatch(event, &mut sink),
                Err(xch::RecvTimeoutError::Timeout) => {}
                Err(xch::RecvTimeoutError::Disconnected) => {
                    tracing::debug!("event senders gone, leaving run loop");
                    break;
                }
            }
            if let Some(combined) = self.tick() {
                sink(StreamEvent::Combined(combined));
            }
        }
        if let Some(combined) = self.tick() {
            sink(StreamEvent::Combined(combined));
        }
    }

    fn dispatch<F: FnMut(StreamEvent)>(&mut self, event: PortEvent, sink: &mut F) {
        match event {
            PortEvent::Record(record) => {
                if !self.running {
                    return;
                }
                sink(StreamEvent::Decoded(record));
                if let Some(combined) = self.handle(record) {
                    sink(StreamEvent::Combined(combined));
                }
            }
            PortEvent::RawBytes(bytes) => {
                tracing::trace!(len = bytes.len(), "raw bytes");
            }
            PortEvent::Opened { port } => {
                sink(StreamEvent::Connection(ConnectionEvent::Opened { port }));
            }
            PortEvent::Error { kind, message } => {
                sink(StreamEvent::Connection(ConnectionEvent::Error(
                    ConnectionError::new(kind, message),
                )));
            }
            PortEvent::Closed => sink(StreamEvent::Connection(ConnectionEvent::Closed)),
        }
    }
}
