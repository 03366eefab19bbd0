use rstest::rstest;
use tgam_core::decoder::{
    Decoder, SYNC, TAG_ATTENTION, TAG_BLINK, TAG_MEDITATION, TAG_POWER_BANDS, TAG_RAW,
    TAG_SIGNAL_QUALITY, checksum, encode_packet, parse_payload,
};
use tgam_core::{DecodedRecord, ProtocolError};

fn big_packet_payload() -> Vec<u8> {
    let mut p = vec![TAG_SIGNAL_QUALITY, 0x1A, TAG_POWER_BANDS, 24];
    for band in 0u32..8 {
        let v = 0x01_02_03 * (band + 1);
        p.extend_from_slice(&v.to_be_bytes()[1..]);
    }
    p.extend_from_slice(&[TAG_ATTENTION, 0x30, TAG_MEDITATION, 0x40]);
    p
}

#[test]
fn raw_sample_vector() {
    let mut d = Decoder::new();
    let out = d.feed(&[0xAA, 0xAA, 0x04, 0x80, 0x02, 0x01, 0x02, 0x7A]);
    // The trailing 0x02 is a signal-quality tag without its value byte.
    assert_eq!(out.len(), 1);
    match out[0] {
        DecodedRecord::RawSample { raw, microvolts } => {
            assert_eq!(raw, 513);
            assert!((microvolts - 264.708).abs() < 1e-9);
        }
        other => panic!("unexpected record {other:?}"),
    }
    assert_eq!(d.stats().packets_accepted, 1);
    assert_eq!(d.stats().parse_aborts, 1);
}

#[test]
fn wrong_checksum_emits_nothing() {
    let mut d = Decoder::new();
    assert!(d.feed(&[0xAA, 0xAA, 0x04, 0x80, 0x02, 0x01, 0x02, 0x79]).is_empty());
    assert_eq!(d.stats().checksum_failures, 1);
    assert_eq!(d.stats().packets_accepted, 0);
}

#[test]
fn negative_raw_values_are_sign_extended() {
    let frame = encode_packet(&[TAG_RAW, 0xFF, 0xFE]).unwrap();
    let out = Decoder::new().feed(&frame);
    assert_eq!(out, vec![DecodedRecord::raw(-2)]);
    if let DecodedRecord::RawSample { microvolts, .. } = out[0] {
        assert!((microvolts + 1.032).abs() < 1e-12);
    }
}

#[test]
fn big_packet_decodes_in_payload_order() {
    let frame = encode_packet(&big_packet_payload()).unwrap();
    let out = Decoder::new().feed(&frame);
    assert_eq!(out.len(), 4);
    assert_eq!(out[0], DecodedRecord::SignalQuality { value: 0x1A });
    let DecodedRecord::PowerBands { bands } = out[1] else {
        panic!("expected power bands, got {:?}", out[1]);
    };
    assert_eq!(bands[0], 0x01_02_03);
    assert_eq!(bands[7], 0x01_02_03 * 8);
    assert_eq!(out[2], DecodedRecord::Attention { value: 0x30 });
    assert_eq!(out[3], DecodedRecord::Meditation { value: 0x40 });
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(7)]
fn packets_split_across_feeds(#[case] chunk: usize) {
    let mut bytes = encode_packet(&big_packet_payload()).unwrap();
    bytes.extend(encode_packet(&[TAG_BLINK, 77]).unwrap());
    let mut d = Decoder::new();
    let mut out = Vec::new();
    for part in bytes.chunks(chunk) {
        d.feed_into(part, &mut out);
    }
    assert_eq!(out.len(), 5);
    assert_eq!(out[4], DecodedRecord::Blink { strength: 77 });
}

#[test]
fn unknown_tag_keeps_earlier_items() {
    let payload = [TAG_ATTENTION, 10, 0x55, 1, TAG_MEDITATION, 20];
    let mut out = Vec::new();
    assert_eq!(
        parse_payload(&payload, &mut out),
        Err(ProtocolError::UnknownTag {
            tag: 0x55,
            offset: 2
        })
    );
    assert_eq!(out, vec![DecodedRecord::Attention { value: 10 }]);
}

#[test]
fn power_item_needs_a_full_body_even_with_odd_length() {
    let payload = [TAG_POWER_BANDS, 2, 0xDE, 0xAD, TAG_ATTENTION, 99];
    let mut out = Vec::new();
    assert_eq!(
        parse_payload(&payload, &mut out),
        Err(ProtocolError::Truncated {
            tag: TAG_POWER_BANDS,
            offset: 0
        })
    );
    assert!(out.is_empty());
}

#[test]
fn odd_power_length_is_skipped() {
    let mut payload = vec![TAG_POWER_BANDS, 2, 0xDE, 0xAD];
    for _ in 0..11 {
        payload.extend_from_slice(&[TAG_BLINK, 5]);
    }
    let mut out = Vec::new();
    assert_eq!(parse_payload(&payload, &mut out), Ok(()));
    assert_eq!(out.len(), 11);
    assert!(out.iter().all(|r| *r == DecodedRecord::Blink { strength: 5 }));
}

#[test]
fn garbage_between_packets_is_ignored() {
    let mut bytes = vec![0x00, 0x13, SYNC, 0x42, 0x99];
    bytes.extend(encode_packet(&[TAG_ATTENTION, 42]).unwrap());
    bytes.extend([0x01, 0x02, 0x03]);
    bytes.extend(encode_packet(&[TAG_MEDITATION, 43]).unwrap());
    let out = Decoder::new().feed(&bytes);
    assert_eq!(
        out,
        vec![
            DecodedRecord::Attention { value: 42 },
            DecodedRecord::Meditation { value: 43 }
        ]
    );
}

#[test]
fn corrupted_packet_does_not_disturb_the_next() {
    let mut bad = encode_packet(&[TAG_ATTENTION, 42]).unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0x01;
    let mut bytes = bad;
    bytes.extend(encode_packet(&[TAG_ATTENTION, 43]).unwrap());
    let mut d = Decoder::new();
    assert_eq!(d.feed(&bytes), vec![DecodedRecord::Attention { value: 43 }]);
    assert_eq!(d.stats().checksum_failures, 1);
}

#[test]
fn checksum_helper_matches_frames() {
    let payload = big_packet_payload();
    let frame = encode_packet(&payload).unwrap();
    assert_eq!(*frame.last().unwrap(), checksum(&payload));
    assert_eq!(usize::from(frame[2]), payload.len());
}
