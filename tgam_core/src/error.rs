use serde::Serialize;
use thiserror::Error;

/// Why a connection could not be opened or kept alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionErrorKind {
    Timeout,
    PermissionDenied,
    NotFound,
    Busy,
    Unknown,
}

impl ConnectionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionErrorKind::Timeout => "timeout",
            ConnectionErrorKind::PermissionDenied => "permission-denied",
            ConnectionErrorKind::NotFound => "not-found",
            ConnectionErrorKind::Busy => "busy",
            ConnectionErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable open/read failure. The connection is already closed when the
/// caller sees one of these; retrying is up to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("connection error ({kind}): {message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    /// Driver/OS message, preserved verbatim for diagnostics.
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Rejected at the API boundary; nothing was mutated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Framing or payload problem. Handled inside the decoder by resynchronizing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("unknown tag {tag:#04x} at payload offset {offset}")]
    UnknownTag { tag: u8, offset: usize },
    #[error("truncated item {tag:#04x} at payload offset {offset}")]
    Truncated { tag: u8, offset: usize },
    #[error("payload of {0} bytes does not fit a length byte")]
    PayloadTooLong(usize),
}
