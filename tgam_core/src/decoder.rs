//! Incremental decoder for the TGAM packet framing.
//!
//! ```text
//! [0xAA 0xAA] [LEN] [PAYLOAD: LEN bytes of tagged items] [CHECKSUM]
//! CHECKSUM = !sum(PAYLOAD) (mod 256)
//! ```
//!
//! The decoder can be fed arbitrary chunks; a packet may straddle any number
//! of `feed` calls. Bad checksums and malformed payloads never produce
//! records from the rejected packet and never disturb the next one.

use crate::error::ProtocolError;
use crate::records::DecodedRecord;

pub const SYNC: u8 = 0xAA;

pub const TAG_SIGNAL_QUALITY: u8 = 0x02;
pub const TAG_ATTENTION: u8 = 0x04;
pub const TAG_MEDITATION: u8 = 0x05;
pub const TAG_BLINK: u8 = 0x16;
pub const TAG_RAW: u8 = 0x80;
pub const TAG_POWER_BANDS: u8 = 0x83;

/// Body length carried by a well-formed power-bands item (8 x 3 bytes).
pub const POWER_BANDS_LEN: u8 = 24;

/// Largest payload a single length byte can declare.
pub const MAX_ENCODED_PAYLOAD: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    SeekSync1,
    SeekSync2,
    ReadLength,
    ReadPayload,
    ReadChecksum,
}

/// Counters kept across packets for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DecoderStats {
    pub bytes_seen: u64,
    pub packets_accepted: u64,
    pub checksum_failures: u64,
    /// Checksum-valid packets whose item parsing stopped early.
    pub parse_aborts: u64,
}

#[derive(Debug, Default)]
pub struct Decoder {
    state: State,
    declared_len: u8,
    payload: Vec<u8>,
    sum: u8,
    stats: DecoderStats,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            payload: Vec::with_capacity(usize::from(u8::MAX)),
            ..Self::default()
        }
    }

    /// Feed bytes and collect the records of every packet completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DecodedRecord> {
        let mut out = Vec::new();
        self.feed_into(bytes, &mut out);
        out
    }

    /// Like [`Decoder::feed`] but appends to a caller-owned buffer.
    pub fn feed_into(&mut self, bytes: &[u8], out: &mut Vec<DecodedRecord>) {
        self.stats.bytes_seen += bytes.len() as u64;
        for &b in bytes {
            self.step(b, out);
        }
    }

    fn step(&mut self, b: u8, out: &mut Vec<DecodedRecord>) {
        match self.state {
            State::SeekSync1 => {
                if b == SYNC {
                    self.state = State::SeekSync2;
                }
            }
            State::SeekSync2 => {
                self.state = if b == SYNC {
                    State::ReadLength
                } else {
                    State::SeekSync1
                };
            }
            State::ReadLength => {
                self.declared_len = b;
                self.payload.clear();
                self.sum = 0;
                self.state = if b == 0 {
                    State::ReadChecksum
                } else {
                    State::ReadPayload
                };
            }
            State::ReadPayload => {
                self.payload.push(b);
                self.sum = self.sum.wrapping_add(b);
                if self.payload.len() == usize::from(self.declared_len) {
                    self.state = State::ReadChecksum;
                }
            }
            State::ReadChecksum => {
                let expected = !self.sum;
                if b == expected {
                    self.stats.packets_accepted += 1;
                    if let Err(e) = parse_payload(&self.payload, out) {
                        self.stats.parse_aborts += 1;
                        tracing::warn!(error = %e, len = self.payload.len(), "payload parse aborted");
                    }
                } else {
                    self.stats.checksum_failures += 1;
                    let e = ProtocolError::ChecksumMismatch {
                        expected,
                        actual: b,
                    };
                    tracing::warn!(error = %e, "packet dropped");
                }
                self.clear_packet();
            }
        }
    }

    fn clear_packet(&mut self) {
        self.state = State::SeekSync1;
        self.declared_len = 0;
        self.payload.clear();
        self.sum = 0;
    }

    /// Drop any partial packet and go back to sync search. Counters survive.
    pub fn reset(&mut self) {
        self.clear_packet();
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// True while a packet is partially received.
    pub fn in_packet(&self) -> bool {
        self.state != State::SeekSync1
    }
}

/// Inverted 8-bit sum of `payload`.
pub fn checksum(payload: &[u8]) -> u8 {
    !payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Frame `payload` with sync bytes, length and checksum.
pub fn encode_packet(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_ENCODED_PAYLOAD {
        return Err(ProtocolError::PayloadTooLong(payload.len()));
    }
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(&[SYNC, SYNC]);
    #[allow(clippy::cast_possible_truncation)]
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(payload));
    Ok(frame)
}

/// Parse the tagged items of a checksum-valid payload into `out`.
///
/// Stops at the first unknown tag or truncated item; records parsed before
/// that point are kept.
pub fn parse_payload(payload: &[u8], out: &mut Vec<DecodedRecord>) -> Result<(), ProtocolError> {
    let len = payload.len();
    let mut i = 0;
    while i < len {
        let tag = payload[i];
        let offset = i;
        i += 1;
        let remaining = len - i;
        let truncated = ProtocolError::Truncated { tag, offset };
        match tag {
            TAG_RAW => {
                if remaining < 2 {
                    return Err(truncated);
                }
                let raw = i16::from_be_bytes([payload[i], payload[i + 1]]);
                out.push(DecodedRecord::raw(raw));
                i += 2;
            }
            TAG_SIGNAL_QUALITY | TAG_ATTENTION | TAG_MEDITATION | TAG_BLINK => {
                if remaining < 1 {
                    return Err(truncated);
                }
                let value = payload[i];
                out.push(match tag {
                    TAG_SIGNAL_QUALITY => DecodedRecord::SignalQuality { value },
                    TAG_ATTENTION => DecodedRecord::Attention { value },
                    TAG_MEDITATION => DecodedRecord::Meditation { value },
                    _ => DecodedRecord::Blink { strength: value },
                });
                i += 1;
            }
            TAG_POWER_BANDS => {
                // Length byte plus a full 24-byte body must be present even
                // when the length byte is wrong.
                if remaining < 1 + usize::from(POWER_BANDS_LEN) {
                    return Err(truncated);
                }
                let body_len = payload[i];
                i += 1;
                if body_len != POWER_BANDS_LEN {
                    tracing::debug!(body_len, "skipping power-bands item with odd length");
                    i += usize::from(body_len);
                    continue;
                }
                let mut bands = [0u32; 8];
                for (band, chunk) in bands.iter_mut().zip(payload[i..i + 24].chunks_exact(3)) {
                    *band = u32::from_be_bytes([0, chunk[0], chunk[1], chunk[2]]);
                }
                out.push(DecodedRecord::PowerBands { bands });
                i += 24;
            }
            _ => return Err(ProtocolError::UnknownTag { tag, offset }),
        }
    }
    Ok(())
}
