//! Port discovery and connection lifecycle.
//!
//! `PortManager` enumerates candidate devices, opens one with bounded
//! retries, and hands the transport to a background [`Reader`]. Everything
//! the reader observes leaves on a crossbeam channel as [`PortEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel as xch;
use tgam_traits::{Clock, MonotonicClock, PortBackend, SerialSettings};

use crate::config::ReaderCfg;
use crate::error::{ConnectionError, ConnectionErrorKind};
use crate::reader::Reader;
use crate::records::DecodedRecord;

/// Capacity of the event channel created by [`event_channel`].
pub const EVENT_CAPACITY: usize = 8192;

/// Everything a connection reports to its consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
    Opened { port: String },
    /// Bytes exactly as read from the device.
    RawBytes(Vec<u8>),
    Record(DecodedRecord),
    Error {
        kind: ConnectionErrorKind,
        message: String,
    },
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortState {
    Closed = 0,
    Opening = 1,
    Reading = 2,
    Closing = 3,
    Error = 4,
}

impl PortState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PortState::Opening,
            2 => PortState::Reading,
            3 => PortState::Closing,
            4 => PortState::Error,
            _ => PortState::Closed,
        }
    }
}

/// Lifecycle state shared between a manager and its reader thread.
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn load(&self) -> PortState {
        PortState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: PortState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Bounded channel for [`PortEvent`]s. Several managers may share one.
pub fn event_channel() -> (xch::Sender<PortEvent>, xch::Receiver<PortEvent>) {
    xch::bounded(EVENT_CAPACITY)
}

pub struct PortManager<B: PortBackend> {
    backend: B,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: ReaderCfg,
    tx: xch::Sender<PortEvent>,
    rx: xch::Receiver<PortEvent>,
    known_ports: Vec<String>,
    state: StateCell,
    reader: Option<Reader>,
    current_port: Option<String>,
}

impl<B: PortBackend> PortManager<B> {
    pub fn new(backend: B) -> Self {
        let (tx, rx) = event_channel();
        Self::with_channel(backend, tx, rx)
    }

    /// Use an existing event channel, e.g. one shared with other managers.
    pub fn with_channel(
        backend: B,
        tx: xch::Sender<PortEvent>,
        rx: xch::Receiver<PortEvent>,
    ) -> Self {
        Self {
            backend,
            clock: Arc::new(MonotonicClock::new()),
            cfg: ReaderCfg::default(),
            tx,
            rx,
            known_ports: Vec::new(),
            state: StateCell::default(),
            reader: None,
            current_port: None,
        }
    }

    /// Clock used for retry backoff.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_reader_cfg(mut self, cfg: ReaderCfg) -> Result<Self, crate::error::ConfigError> {
        cfg.validate()?;
        self.cfg = cfg;
        Ok(self)
    }

    /// Receiver side of the event channel.
    pub fn events(&self) -> xch::Receiver<PortEvent> {
        self.rx.clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// List usable ports, probing well-known names when the platform listing
    /// is empty. Never fails; the result replaces [`PortManager::known_ports`].
    pub fn enumerate(&mut self) -> Vec<String> {
        let mut ports = match self.backend.list_ports() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "port listing failed");
                Vec::new()
            }
        };
        if ports.is_empty() {
            tracing::debug!("platform listing empty, probing candidates");
            ports = self
                .backend
                .probe_candidates()
                .into_iter()
                .filter(|name| self.backend.probe(name, self.cfg.probe_timeout).is_ok())
                .collect();
        }
        let mut seen = std::collections::HashSet::new();
        ports.retain(|p| seen.insert(p.clone()));
        tracing::info!(count = ports.len(), "ports enumerated");
        self.known_ports.clone_from(&ports);
        ports
    }

    /// Result of the most recent [`PortManager::enumerate`].
    pub fn known_ports(&self) -> &[String] {
        &self.known_ports
    }

    /// Open `settings.port_name` and start the reader thread.
    ///
    /// The port must appear in the most recent enumeration. An already open
    /// connection is closed first.
    pub fn open(&mut self, settings: &SerialSettings) -> Result<(), ConnectionError> {
        self.close();
        let name = settings.port_name.as_str();
        if !self.known_ports.iter().any(|p| p == name) {
            let err = ConnectionError::new(
                ConnectionErrorKind::NotFound,
                format!("port {name} is not among the enumerated ports"),
            );
            tracing::warn!(port = name, "open refused: port not enumerated");
            return Err(err);
        }

        self.state.store(PortState::Opening);
        tracing::info!(port = name, baud = settings.baud_rate, "opening port");
        let backend = &self.backend;
        let opened = crate::util::retry_with_backoff(
            self.clock.as_ref(),
            self.cfg.open_retries,
            self.cfg.retry_backoff,
            |attempt| {
                tracing::debug!(port = name, attempt, "open attempt");
                backend
                    .open(settings)
                    .map_err(|e| crate::hw_error::classify(e.as_ref()))
            },
        );

        match opened {
            Ok(transport) => {
                self.notify(PortEvent::Opened {
                    port: name.to_string(),
                });
                self.state.store(PortState::Reading);
                self.current_port = Some(name.to_string());
                self.reader = Some(Reader::spawn(
                    transport,
                    self.tx.clone(),
                    self.state.clone(),
                    self.cfg.poll_interval,
                ));
                tracing::info!(port = name, "port open, reader started");
                Ok(())
            }
            Err(e) => {
                self.state.store(PortState::Error);
                tracing::error!(port = name, kind = %e.kind, message = %e.message, "open failed");
                self.notify(PortEvent::Error {
                    kind: e.kind,
                    message: e.message.clone(),
                });
                Err(e)
            }
        }
    }

    /// Stop the reader and release the port. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            self.state.store(PortState::Closing);
            reader.stop();
            tracing::info!(port = ?self.current_port, "port closed");
        }
        self.current_port = None;
        self.state.store(PortState::Closed);
    }

    pub fn state(&self) -> PortState {
        self.state.load()
    }

    /// True while the reader thread is alive.
    pub fn is_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    pub fn current_port(&self) -> Option<&str> {
        self.current_port.as_deref()
    }

    fn notify(&self, event: PortEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!(error = %e, "event channel full or disconnected");
        }
    }
}

impl<B: PortBackend> Drop for PortManager<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_round_trips() {
        let cell = StateCell::default();
        assert_eq!(cell.load(), PortState::Closed);
        for s in [
            PortState::Opening,
            PortState::Reading,
            PortState::Closing,
            PortState::Error,
            PortState::Closed,
        ] {
            cell.store(s);
            assert_eq!(cell.load(), s);
        }
    }
}
