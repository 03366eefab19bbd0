//! Human-readable error descriptions and structured JSON error formatting.

use tgam_core::{ConfigError, ConnectionError, ConnectionErrorKind};

fn connection_error(err: &eyre::Report) -> Option<&ConnectionError> {
    err.downcast_ref::<ConnectionError>()
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = connection_error(err) {
        let msg = &ce.message;
        return match ce.kind {
            ConnectionErrorKind::Timeout => format!(
                "What happened: The headset stopped answering ({msg}).\nLikely causes: Headset switched off, Bluetooth link dropped, or the wrong baud rate.\nHow to fix: Power-cycle the headset, re-pair it, and check serial.baud_rate (57600 for TGAM)."
            ),
            ConnectionErrorKind::PermissionDenied => format!(
                "What happened: Access to the serial port was denied ({msg}).\nLikely causes: The user is not in the dialout/uucp group, or another program holds the port.\nHow to fix: Add your user to the serial group (then log in again) or close the other program."
            ),
            ConnectionErrorKind::NotFound => format!(
                "What happened: The serial port does not exist ({msg}).\nLikely causes: Headset not paired, adapter unplugged, or a stale port name in the config.\nHow to fix: Run `tgam ports` and pass one of the listed names with --port."
            ),
            ConnectionErrorKind::Busy => format!(
                "What happened: The serial port is busy ({msg}).\nLikely causes: Another application or an earlier `tgam stream` still has it open.\nHow to fix: Close the other application and try again."
            ),
            ConnectionErrorKind::Unknown => format!(
                "What happened: The serial connection failed ({msg}).\nLikely causes: Driver or adapter problem.\nHow to fix: Re-run with --log-level=debug and check the driver messages."
            ),
        };
    }

    if let Some(ConfigError::Invalid(what)) = err.downcast_ref::<ConfigError>() {
        return format!(
            "What happened: Invalid configuration ({what}).\nLikely causes: Out-of-range values in the [analysis] or [reader] section.\nHow to fix: Edit the config file, then rerun `tgam self-check`."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("parse config") || lower.contains("read config") {
        return format!(
            "What happened: The config file could not be loaded.\nLikely causes: Wrong path or a TOML syntax error.\nHow to fix: Check the file named here: {msg}"
        );
    }

    if lower.contains("must ") || lower.contains("unreasonably large") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: A value outside its allowed range.\nHow to fix: Edit the TOML config and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per connection error kind; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match connection_error(err).map(|ce| ce.kind) {
        Some(ConnectionErrorKind::Timeout) => 2,
        Some(ConnectionErrorKind::PermissionDenied) => 3,
        Some(ConnectionErrorKind::NotFound) => 4,
        Some(ConnectionErrorKind::Busy) => 5,
        Some(ConnectionErrorKind::Unknown) => 6,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ce) = connection_error(err) {
        return json!({
            "reason": "Connection",
            "kind": ce.kind,
            "details": { "driver_message": ce.message },
            "message": humanize(err),
        })
        .to_string();
    }

    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
