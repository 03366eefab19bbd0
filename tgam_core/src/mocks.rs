//! In-memory loopback port for driving the manager and reader without hardware.
//!
//! `LoopbackBackend` lists a fixed set of names; every transport it opens
//! reads from one shared [`LoopbackFeed`] that tests push bytes into.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tgam_traits::{BoxError, PortBackend, SerialSettings, SerialTransport};

#[derive(Debug, Default)]
struct FeedState {
    pending: VecDeque<u8>,
    read_error: Option<(io::ErrorKind, String)>,
    open: bool,
    close_calls: u32,
}

/// Shared byte source behind every [`LoopbackTransport`].
#[derive(Debug, Clone, Default)]
pub struct LoopbackFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl LoopbackFeed {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes for the next reads.
    pub fn push(&self, bytes: &[u8]) {
        self.lock().pending.extend(bytes.iter().copied());
    }

    /// Make the next poll fail with an I/O error of `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind, message: &str) {
        self.lock().read_error = Some((kind, message.to_string()));
    }

    /// True while a transport is open and not yet closed.
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn close_calls(&self) -> u32 {
        self.lock().close_calls
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }
}

#[derive(Debug)]
pub struct LoopbackTransport {
    feed: LoopbackFeed,
}

impl SerialTransport for LoopbackTransport {
    fn bytes_available(&mut self) -> Result<usize, BoxError> {
        let mut st = self.feed.lock();
        if let Some((kind, message)) = st.read_error.take() {
            return Err(Box::new(io::Error::new(kind, message)));
        }
        Ok(st.pending.len())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let mut st = self.feed.lock();
        let n = buf.len().min(st.pending.len());
        for (slot, b) in buf.iter_mut().zip(st.pending.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let mut st = self.feed.lock();
        st.open = false;
        st.close_calls += 1;
        Ok(())
    }
}

/// Port backend serving [`LoopbackTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct LoopbackBackend {
    listed: Vec<String>,
    /// Not listed, but answer probes.
    hidden: Vec<String>,
    feed: LoopbackFeed,
    open_failures: Arc<Mutex<VecDeque<(io::ErrorKind, String)>>>,
    open_attempts: Arc<AtomicU32>,
}

impl LoopbackBackend {
    pub fn new<S: Into<String>>(listed: impl IntoIterator<Item = S>) -> Self {
        Self {
            listed: listed.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Names that only show up through probing.
    #[must_use]
    pub fn with_hidden<S: Into<String>>(mut self, hidden: impl IntoIterator<Item = S>) -> Self {
        self.hidden = hidden.into_iter().map(Into::into).collect();
        self
    }

    /// Fail the next `times` open attempts with `kind`.
    pub fn fail_opens(&self, kind: io::ErrorKind, message: &str, times: usize) {
        let mut q = self
            .open_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for _ in 0..times {
            q.push_back((kind, message.to_string()));
        }
    }

    pub fn open_attempts(&self) -> u32 {
        self.open_attempts.load(Ordering::Relaxed)
    }

    pub fn feed(&self) -> LoopbackFeed {
        self.feed.clone()
    }

    fn exists(&self, name: &str) -> bool {
        self.listed.iter().chain(&self.hidden).any(|p| p == name)
    }
}

impl PortBackend for LoopbackBackend {
    type Transport = LoopbackTransport;

    fn list_ports(&self) -> Result<Vec<String>, BoxError> {
        Ok(self.listed.clone())
    }

    fn probe_candidates(&self) -> Vec<String> {
        (0..4)
            .map(|i| format!("loop{i}"))
            .chain(self.hidden.iter().cloned())
            .collect()
    }

    fn probe(&self, name: &str, _timeout: Duration) -> Result<(), BoxError> {
        if self.hidden.iter().any(|p| p == name) {
            Ok(())
        } else {
            Err(Box::new(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device: {name}"),
            )))
        }
    }

    fn open(&self, settings: &SerialSettings) -> Result<LoopbackTransport, BoxError> {
        self.open_attempts.fetch_add(1, Ordering::Relaxed);
        let queued = self
            .open_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some((kind, message)) = queued {
            return Err(Box::new(io::Error::new(kind, message)));
        }
        if !self.exists(&settings.port_name) {
            return Err(Box::new(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device: {}", settings.port_name),
            )));
        }
        self.feed.lock().open = true;
        Ok(LoopbackTransport {
            feed: self.feed.clone(),
        })
    }
}
