use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial: {0}")]
    Serial(#[from] serialport::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported framing: {0}")]
    Unsupported(&'static str),
    #[error("port already closed")]
    Closed,
}

impl HwError {
    /// Underlying `std::io::ErrorKind`, when the failure came from the OS.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            HwError::Io(e) => Some(e.kind()),
            HwError::Serial(e) => match e.kind {
                serialport::ErrorKind::Io(kind) => Some(kind),
                _ => None,
            },
            _ => None,
        }
    }

    /// The driver reported that the device does not exist (or vanished).
    pub fn is_missing_device(&self) -> bool {
        matches!(
            self,
            HwError::Serial(serialport::Error {
                kind: serialport::ErrorKind::NoDevice,
                ..
            })
        )
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
