//! Maps `Box<dyn Error>` from the port seams to a `ConnectionError`.
//!
//! The traits in `tgam_traits` use `Box<dyn Error + Send + Sync>`; this module
//! turns those into one of the five connection error kinds, with an optional
//! feature-gated path for `tgam_hardware::HwError` downcasting.

use std::io::ErrorKind as IoKind;

use crate::error::{ConnectionError, ConnectionErrorKind};

/// Classify a trait-boundary error.
///
/// Typed information wins (hardware error, then `std::io::Error`); the
/// message-signature heuristics only run when neither is conclusive.
pub fn classify(e: &(dyn std::error::Error + 'static)) -> ConnectionError {
    let message = e.to_string();

    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<tgam_hardware::error::HwError>() {
            if hw.is_missing_device() {
                return ConnectionError::new(ConnectionErrorKind::NotFound, message);
            }
            if let Some(kind) = hw.io_kind().and_then(kind_for_io) {
                return ConnectionError::new(kind, message);
            }
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>()
        && let Some(kind) = kind_for_io(io.kind())
    {
        return ConnectionError::new(kind, message);
    }

    ConnectionError::new(kind_for_message(&message), message)
}

fn kind_for_io(kind: IoKind) -> Option<ConnectionErrorKind> {
    match kind {
        IoKind::TimedOut | IoKind::WouldBlock => Some(ConnectionErrorKind::Timeout),
        IoKind::PermissionDenied => Some(ConnectionErrorKind::PermissionDenied),
        IoKind::NotFound => Some(ConnectionErrorKind::NotFound),
        IoKind::ResourceBusy | IoKind::AddrInUse => Some(ConnectionErrorKind::Busy),
        _ => None,
    }
}

/// Match the known failure signatures of serial drivers (including the
/// Windows Bluetooth "semaphore timeout" message).
pub fn kind_for_message(message: &str) -> ConnectionErrorKind {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["timed out", "timeout"]) {
        ConnectionErrorKind::Timeout
    } else if has(&["permission", "access is denied", "access denied"]) {
        ConnectionErrorKind::PermissionDenied
    } else if has(&[
        "not exist",
        "no such file",
        "no such device",
        "not found",
        "cannot find",
    ]) {
        ConnectionErrorKind::NotFound
    } else if has(&["in use", "busy", "locked"]) {
        ConnectionErrorKind::Busy
    } else {
        ConnectionErrorKind::Unknown
    }
}
