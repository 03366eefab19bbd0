//! Record types flowing from the decoder through the coordinator.

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// Scale factor from raw ADC counts to microvolts.
pub const MICROVOLTS_PER_COUNT: f64 = 0.516;

/// One item decoded from a checksum-valid packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecodedRecord {
    RawSample { raw: i16, microvolts: f64 },
    /// 0 is best, 200 means no skin contact.
    SignalQuality { value: u8 },
    Attention { value: u8 },
    Meditation { value: u8 },
    Blink { strength: u8 },
    /// Device-side band powers in `Band::ALL` order.
    PowerBands { bands: [u32; 8] },
}

impl DecodedRecord {
    pub fn raw(raw: i16) -> Self {
        DecodedRecord::RawSample {
            raw,
            microvolts: f64::from(raw) * MICROVOLTS_PER_COUNT,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            DecodedRecord::RawSample { .. } => RecordKind::RawSample,
            DecodedRecord::SignalQuality { .. } => RecordKind::SignalQuality,
            DecodedRecord::Attention { .. } => RecordKind::Attention,
            DecodedRecord::Meditation { .. } => RecordKind::Meditation,
            DecodedRecord::Blink { .. } => RecordKind::Blink,
            DecodedRecord::PowerBands { .. } => RecordKind::PowerBands,
        }
    }
}

/// Field-less discriminant of [`DecodedRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    RawSample,
    SignalQuality,
    Attention,
    Meditation,
    Blink,
    PowerBands,
}

impl RecordKind {
    pub const COUNT: usize = 6;
    pub const ALL: [RecordKind; Self::COUNT] = [
        RecordKind::RawSample,
        RecordKind::SignalQuality,
        RecordKind::Attention,
        RecordKind::Meditation,
        RecordKind::Blink,
        RecordKind::PowerBands,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Qualitative reading of a signal-quality byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl SignalLevel {
    pub fn from_quality(value: u8) -> Self {
        match value {
            0..10 => SignalLevel::Excellent,
            10..20 => SignalLevel::Good,
            20..40 => SignalLevel::Fair,
            40..70 => SignalLevel::Poor,
            _ => SignalLevel::VeryPoor,
        }
    }
}

/// The eight fixed EEG bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Delta,
    Theta,
    AlphaLow,
    AlphaHigh,
    BetaLow,
    BetaHigh,
    GammaLow,
    GammaHigh,
}

impl Band {
    pub const ALL: [Band; 8] = [
        Band::Delta,
        Band::Theta,
        Band::AlphaLow,
        Band::AlphaHigh,
        Band::BetaLow,
        Band::BetaHigh,
        Band::GammaLow,
        Band::GammaHigh,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::AlphaLow => "alpha_low",
            Band::AlphaHigh => "alpha_high",
            Band::BetaLow => "beta_low",
            Band::BetaHigh => "beta_high",
            Band::GammaLow => "gamma_low",
            Band::GammaHigh => "gamma_high",
        }
    }

    /// Pass band edges in Hz.
    pub const fn range_hz(self) -> (f64, f64) {
        match self {
            Band::Delta => (0.5, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::AlphaLow => (8.0, 10.0),
            Band::AlphaHigh => (10.0, 13.0),
            Band::BetaLow => (13.0, 20.0),
            Band::BetaHigh => (20.0, 30.0),
            Band::GammaLow => (30.0, 50.0),
            Band::GammaHigh => (50.0, 100.0),
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One value per band; serializes as a map keyed by band name.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandPowerSet(pub [f64; 8]);

impl BandPowerSet {
    pub fn get(&self, band: Band) -> f64 {
        self.0[band.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Band, f64)> + '_ {
        Band::ALL.iter().map(|b| (*b, self.0[b.index()]))
    }

    /// Share of each band in the total magnitude; all zero when the total is zero.
    pub fn relative(&self) -> BandPowerSet {
        let total: f64 = self.0.iter().map(|v| v.abs()).sum();
        if total <= 0.0 || !total.is_finite() {
            return BandPowerSet::default();
        }
        BandPowerSet(self.0.map(|v| v.abs() / total))
    }
}

impl Serialize for BandPowerSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(8))?;
        for (band, value) in self.iter() {
            map.serialize_entry(band.name(), &value)?;
        }
        map.end()
    }
}

/// Merged output emitted by the coordinator after each band recompute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombinedRecord {
    /// Milliseconds since the coordinator's epoch.
    pub timestamp_ms: u64,
    /// Latest raw sample in microvolts.
    pub raw_eeg: f64,
    pub frequency_bands: BandPowerSet,
    pub attention: Option<u8>,
    pub meditation: Option<u8>,
    pub signal_quality: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, SignalLevel::Excellent)]
    #[case(9, SignalLevel::Excellent)]
    #[case(10, SignalLevel::Good)]
    #[case(39, SignalLevel::Fair)]
    #[case(69, SignalLevel::Poor)]
    #[case(70, SignalLevel::VeryPoor)]
    #[case(200, SignalLevel::VeryPoor)]
    fn signal_level_thresholds(#[case] q: u8, #[case] expected: SignalLevel) {
        assert_eq!(SignalLevel::from_quality(q), expected);
    }

    #[test]
    fn record_kind_indices_are_dense() {
        for (i, k) in RecordKind::ALL.iter().enumerate() {
            assert_eq!(k.index(), i);
        }
    }

    #[test]
    fn relative_power_of_zero_set_is_zero() {
        assert_eq!(BandPowerSet::default().relative(), BandPowerSet::default());
    }

    #[test]
    fn relative_power_sums_to_one() {
        let set = BandPowerSet([1.0, -1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 4.0]);
        let rel = set.relative();
        let sum: f64 = rel.0.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((rel.get(Band::GammaHigh) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn combined_record_serializes_band_names() {
        let rec = CombinedRecord {
            timestamp_ms: 5,
            raw_eeg: 1.5,
            frequency_bands: BandPowerSet::default(),
            attention: Some(40),
            meditation: None,
            signal_quality: Some(0),
        };
        let v = serde_json::to_value(rec).unwrap();
        assert_eq!(v["frequency_bands"].as_object().unwrap().len(), 8);
        assert!(v["frequency_bands"]["gamma_high"].is_number());
        assert_eq!(v["attention"], 40);
        assert!(v["meditation"].is_null());
    }

    #[test]
    fn decoded_record_is_tagged() {
        let v = serde_json::to_value(DecodedRecord::Blink { strength: 9 }).unwrap();
        assert_eq!(v["type"], "blink");
        assert_eq!(v["strength"], 9);
    }
}
