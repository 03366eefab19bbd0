//! Offline decoding of a captured byte dump.

use std::io::{self, Write};
use std::path::Path;

use eyre::{Result, WrapErr};
use serde_json::json;
use tgam_core::Decoder;

/// Bytes handed to the decoder per call, so packets straddle feed boundaries
/// the same way they do on a live port.
const CHUNK: usize = 4096;

pub fn run_decode(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).wrap_err_with(|| format!("read capture {}", path.display()))?;
    let mut decoder = Decoder::new();
    let mut records = Vec::new();
    let mut out = io::stdout().lock();
    for chunk in bytes.chunks(CHUNK) {
        records.clear();
        decoder.feed_into(chunk, &mut records);
        for rec in &records {
            writeln!(out, "{}", json!({ "event": "decoded", "record": rec }))?;
        }
    }
    let stats = decoder.stats();
    tracing::info!(
        bytes = stats.bytes_seen,
        packets = stats.packets_accepted,
        checksum_failures = stats.checksum_failures,
        "decode finished"
    );
    writeln!(out, "{}", json!({ "event": "decoder_stats", "stats": stats }))?;
    out.flush()?;
    Ok(())
}
