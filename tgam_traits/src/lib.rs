//! Hardware seams shared by the TGAM workspace.
//!
//! `tgam_core` only talks to serial devices through [`PortBackend`] and
//! [`SerialTransport`]; `tgam_hardware` implements them on top of the
//! `serialport` crate and `tgam_core::mocks` provides an in-memory loopback.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Error type crossing the trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Parity setting requested for the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

/// Stop bits requested for the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

/// Flow control requested for the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

/// Everything needed to open one serial connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    /// Data bits per character (5..=8).
    pub byte_size: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Per-read timeout handed to the driver.
    pub read_timeout: Duration,
}

impl SerialSettings {
    /// 8N1 without flow control at the headset's factory baud rate.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 57_600,
            byte_size: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// An open byte stream. Owned by exactly one reader thread.
pub trait SerialTransport {
    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize, BoxError>;

    /// Read up to `buf.len()` bytes; `Ok(0)` means nothing arrived before the timeout.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, BoxError>;

    /// Release the device. Must be safe to call more than once.
    fn close(&mut self) -> Result<(), BoxError>;
}

/// Port discovery and opening.
pub trait PortBackend {
    type Transport: SerialTransport + Send + 'static;

    /// Primary platform listing.
    fn list_ports(&self) -> Result<Vec<String>, BoxError>;

    /// Device names worth probing when the platform listing comes back empty.
    fn probe_candidates(&self) -> Vec<String>;

    /// Open and immediately close `name`.
    fn probe(&self, name: &str, timeout: Duration) -> Result<(), BoxError>;

    fn open(&self, settings: &SerialSettings) -> Result<Self::Transport, BoxError>;
}
