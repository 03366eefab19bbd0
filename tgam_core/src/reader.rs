//! Background read loop for one open connection.
//!
//! Spawns a thread that owns the transport and its `Decoder`, polls for
//! bytes, and forwards raw chunks and decoded records as `PortEvent`s.
//!
//! Each `Reader` spawns exactly one thread, stopped and joined when the
//! `Reader` is stopped or dropped. The thread always closes its transport and
//! sends `PortEvent::Closed` on the way out (preceded by `PortEvent::Error`
//! when a read failed).
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tgam_traits::{Clock, MonotonicClock, SerialTransport};

use crate::decoder::Decoder;
use crate::error::ConnectionError;
use crate::port::{PortEvent, PortState, StateCell};

/// Largest single read handed to the transport.
pub const READ_CHUNK: usize = 4096;

pub struct Reader {
    /// Shutdown flag checked once per poll.
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Reader {
    pub fn spawn<T: SerialTransport + Send + 'static>(
        transport: T,
        events: xch::Sender<PortEvent>,
        state: StateCell,
        poll: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let mut ctx = ReadLoop {
                transport,
                decoder: Decoder::new(),
                events,
                shutdown: shutdown_clone,
                poll,
            };
            let failure = ctx.run();
            ctx.finish(&state, failure);
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// True once the thread has exited (error, disconnect or stop).
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(std::thread::JoinHandle::is_finished)
    }

    /// Signal the loop and wait for it. Safe to call more than once.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("reader thread joined"),
                Err(e) => tracing::warn!(?e, "reader thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ReadLoop<T> {
    transport: T,
    decoder: Decoder,
    events: xch::Sender<PortEvent>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
}

enum Poll {
    Continue,
    ConsumerGone,
}

impl<T: SerialTransport> ReadLoop<T> {
    /// Returns the error that ended the loop, if any.
    fn run(&mut self) -> Option<ConnectionError> {
        let mut buf = vec![0u8; READ_CHUNK];
        let mut records = Vec::new();
        let clock = MonotonicClock::new();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::debug!("reader received shutdown signal");
                return None;
            }
            match self.poll_once(&mut buf, &mut records) {
                Ok(Poll::Continue) => {}
                Ok(Poll::ConsumerGone) => {
                    tracing::debug!("event consumer disconnected, exiting reader");
                    return None;
                }
                Err(e) => {
                    tracing::error!(kind = %e.kind, message = %e.message, "serial read failed");
                    return Some(e);
                }
            }
            if self.shutdown.load(Ordering::Relaxed) {
                return None;
            }
            clock.sleep(self.poll);
        }
    }

    fn poll_once(
        &mut self,
        buf: &mut [u8],
        records: &mut Vec<crate::records::DecodedRecord>,
    ) -> Result<Poll, ConnectionError> {
        let available = self
            .transport
            .bytes_available()
            .map_err(|e| crate::hw_error::classify(e.as_ref()))?;
        if available == 0 {
            return Ok(Poll::Continue);
        }

        let mut chunk = Vec::with_capacity(available);
        while chunk.len() < available {
            let want = (available - chunk.len()).min(buf.len());
            let n = self
                .transport
                .read_available(&mut buf[..want])
                .map_err(|e| crate::hw_error::classify(e.as_ref()))?;
            if n == 0 {
                break;
            }
            chunk.extend_from_slice(&buf[..n]);
        }
        if chunk.is_empty() {
            return Ok(Poll::Continue);
        }

        self.decoder.feed_into(&chunk, records);
        if !self.emit(PortEvent::RawBytes(chunk)) {
            return Ok(Poll::ConsumerGone);
        }
        for record in records.drain(..) {
            if !self.emit(PortEvent::Record(record)) {
                return Ok(Poll::ConsumerGone);
            }
        }
        Ok(Poll::Continue)
    }

    /// Blocking send that gives up on disconnect or shutdown.
    fn emit(&self, event: PortEvent) -> bool {
        let mut event = event;
        loop {
            match self.events.send_timeout(event, self.poll) {
                Ok(()) => return true,
                Err(xch::SendTimeoutError::Timeout(back)) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        return false;
                    }
                    event = back;
                }
                Err(xch::SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    fn finish(&mut self, state: &StateCell, failure: Option<ConnectionError>) {
        state.store(PortState::Closing);
        if let Err(e) = self.transport.close() {
            tracing::warn!(error = %e, "closing transport failed");
        }
        let failed = failure.is_some();
        if let Some(ConnectionError { kind, message }) = failure
            && !self.emit(PortEvent::Error { kind, message })
        {
            tracing::warn!(%kind, "connection error event not delivered");
        }
        if !self.emit(PortEvent::Closed) {
            tracing::warn!("closed event not delivered");
        }
        state.store(if failed {
            PortState::Error
        } else {
            PortState::Closed
        });
        tracing::trace!(
            stats = ?self.decoder.stats(),
            "reader thread exiting cleanly"
        );
    }
}
