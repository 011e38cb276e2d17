use link_engine::codec::{encode_frame, max_frame_len, DecodeOutcome, Decoder, FrameKind};
use proptest::prelude::*;

fn decode_all(encoded: &[u8], max_pkt: usize) -> (DecodeOutcome, Vec<u8>) {
    let mut decoder = Decoder::new(max_pkt);
    let mut out = vec![0u8; max_pkt];
    let mut last = DecodeOutcome::NeedMore;
    for &b in encoded {
        last = decoder.feed(b, &mut out);
    }
    (last, out)
}

proptest! {
    /// P1: decode(encode(payload)) reproduces the exact payload bytes.
    #[test]
    fn p1_roundtrip(seq in 0u8..8, payload in prop::collection::vec(any::<u8>(), 1..64)) {
        let mut encoded = vec![0u8; max_frame_len(payload.len())];
        let len = encode_frame(FrameKind::Data, seq, &payload, &mut encoded);

        let (outcome, out) = decode_all(&encoded[..len], payload.len());

        prop_assert_eq!(
            outcome,
            DecodeOutcome::FrameReady { kind: FrameKind::Data, seq, length: payload.len() }
        );
        prop_assert_eq!(&out[..payload.len()], &payload[..]);
    }

    /// P2: a single flipped bit anywhere in an encoded data frame either
    /// gets caught as a bad frame or, if it happens to still parse (roughly
    /// 2^-16 of the time for FCS-16), decodes to something other than the
    /// original payload -- it never silently reproduces the same bytes.
    #[test]
    fn p2_single_bit_flip_is_detected(
        seq in 0u8..8,
        payload in prop::collection::vec(any::<u8>(), 1..64),
        byte_index in 0usize..64,
        bit in 0u8..8,
    ) {
        let mut encoded = vec![0u8; max_frame_len(payload.len())];
        let len = encode_frame(FrameKind::Data, seq, &payload, &mut encoded);

        let idx = 1 + (byte_index % (len - 2));
        encoded[idx] ^= 1 << bit;

        let (outcome, out) = decode_all(&encoded[..len], payload.len());
        if let DecodeOutcome::FrameReady { length, .. } = outcome {
            prop_assert!(length != payload.len() || out[..length] != payload[..]);
        }
    }
}
