#![no_main]
use libfuzzer_sys::{arbitrary, fuzz_target};
use tgam_core::Decoder;
use tgam_core::decoder::encode_packet;

#[derive(Debug, arbitrary::Arbitrary)]
struct Input {
    stream: Vec<u8>,
    // Feed boundaries; each value is a chunk length.
    splits: Vec<u8>,
}

fuzz_target!(|input: Input| {
    // Whole-buffer and chunked feeding must agree, and nothing may panic.
    let whole = Decoder::new().feed(&input.stream);

    let mut chunked = Decoder::new();
    let mut got = Vec::new();
    let mut rest = input.stream.as_slice();
    for &n in &input.splits {
        let take = usize::from(n).min(rest.len());
        let (head, tail) = rest.split_at(take);
        chunked.feed_into(head, &mut got);
        rest = tail;
    }
    chunked.feed_into(rest, &mut got);
    assert_eq!(whole, got);

    // A payload re-framed by the encoder is accepted as exactly one packet.
    if let Ok(packet) = encode_packet(&input.stream) {
        let mut d = Decoder::new();
        d.feed(&packet);
        assert_eq!(d.stats().packets_accepted, 1);
    }
});
