//! `serialport`-backed implementation of the `tgam_traits` port seams.
//!
//! The headset usually shows up as a USB-UART bridge or a Bluetooth SPP
//! device (`/dev/rfcomm*`, or an outgoing `COMn` port on Windows); both look
//! like ordinary serial ports here.
pub mod error;

use std::io::Read;
use std::time::Duration;

use tgam_traits::{BoxError, FlowControl, Parity, PortBackend, SerialSettings, SerialTransport, StopBits};

use crate::error::{HwError, Result};

/// Baud rate used for the short probe open; the port is closed right away.
const PROBE_BAUD: u32 = 9_600;

/// Device names probed when the platform listing is empty.
#[cfg(windows)]
pub fn candidate_port_names() -> Vec<String> {
    (1..=20).map(|i| format!("COM{i}")).collect()
}

/// Device names probed when the platform listing is empty.
#[cfg(not(windows))]
pub fn candidate_port_names() -> Vec<String> {
    ["/dev/ttyUSB", "/dev/ttyACM", "/dev/rfcomm"]
        .iter()
        .flat_map(|prefix| (0..10).map(move |i| format!("{prefix}{i}")))
        .collect()
}

/// Map requested framing onto a `serialport` builder.
///
/// Mark/space parity and 1.5 stop bits have no `serialport` representation
/// and are rejected as `HwError::Unsupported`.
pub fn builder_for(settings: &SerialSettings) -> Result<serialport::SerialPortBuilder> {
    let data_bits = match settings.byte_size {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        8 => serialport::DataBits::Eight,
        _ => return Err(HwError::Unsupported("byte size must be 5, 6, 7 or 8")),
    };
    let parity = match settings.parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Mark => return Err(HwError::Unsupported("mark parity")),
        Parity::Space => return Err(HwError::Unsupported("space parity")),
    };
    let stop_bits = match settings.stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
        StopBits::OnePointFive => return Err(HwError::Unsupported("1.5 stop bits")),
    };
    let flow_control = match settings.flow_control {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
        FlowControl::Software => serialport::FlowControl::Software,
    };

    Ok(serialport::new(&settings.port_name, settings.baud_rate)
        .data_bits(data_bits)
        .parity(parity)
        .stop_bits(stop_bits)
        .flow_control(flow_control)
        .timeout(settings.read_timeout))
}

/// Real serial devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl SerialBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PortBackend for SerialBackend {
    type Transport = SerialPortTransport;

    fn list_ports(&self) -> std::result::Result<Vec<String>, BoxError> {
        let ports = serialport::available_ports().map_err(HwError::from)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn probe_candidates(&self) -> Vec<String> {
        candidate_port_names()
    }

    fn probe(&self, name: &str, timeout: Duration) -> std::result::Result<(), BoxError> {
        let port = serialport::new(name, PROBE_BAUD)
            .timeout(timeout)
            .open()
            .map_err(HwError::from)?;
        drop(port);
        tracing::trace!(port = name, "probe ok");
        Ok(())
    }

    fn open(&self, settings: &SerialSettings) -> std::result::Result<SerialPortTransport, BoxError> {
        let port = builder_for(settings)?.open().map_err(HwError::from)?;
        tracing::debug!(
            port = %settings.port_name,
            baud = settings.baud_rate,
            "serial port opened"
        );
        Ok(SerialPortTransport { port: Some(port) })
    }
}

/// An open `serialport` handle; dropping or closing releases the device.
pub struct SerialPortTransport {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl std::fmt::Debug for SerialPortTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortTransport")
            .field("port", &self.port.as_ref().and_then(|p| p.name()))
            .finish()
    }
}

impl SerialTransport for SerialPortTransport {
    fn bytes_available(&mut self) -> std::result::Result<usize, BoxError> {
        let port = self.port.as_mut().ok_or(HwError::Closed)?;
        let n = port.bytes_to_read().map_err(HwError::from)?;
        Ok(n as usize)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> std::result::Result<usize, BoxError> {
        let port = self.port.as_mut().ok_or(HwError::Closed)?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(HwError::Io(e).into()),
        }
    }

    fn close(&mut self) -> std::result::Result<(), BoxError> {
        if let Some(port) = self.port.take() {
            tracing::debug!(port = ?port.name(), "serial port closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_are_bounded_and_unique() {
        let names = candidate_port_names();
        assert!(!names.is_empty());
        assert!(names.len() <= 30);
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
    }

    #[test]
    fn closing_twice_is_harmless() {
        let mut t = SerialPortTransport { port: None };
        assert!(t.close().is_ok());
        assert!(t.close().is_ok());
        assert!(t.bytes_available().is_err());
    }
}
