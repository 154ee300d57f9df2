//! Property tests for tokenizer span-exactness and robustness.

#![allow(clippy::unwrap_used, missing_docs)]

use proptest::prelude::*;

use kerilog_cesr::encode::{attachment_group, controller_signatures, ed25519_key};
use kerilog_cesr::qb64::encode_payload;
use kerilog_cesr::{decode_str, PrimitiveValue, Tokenizer};

proptest! {
    /// Every encoded matter primitive tokenizes back to exactly its span
    /// and payload.
    #[test]
    fn matter_spans_are_exact(fill in any::<[u8; 32]>()) {
        let qb64 = ed25519_key(&fill);
        let mut tok = Tokenizer::new(&qb64);
        let prim = tok.read_primitive().unwrap();
        prop_assert_eq!(prim.size(), qb64.len());
        prop_assert_eq!(prim.qb64, qb64.clone());
        match prim.value {
            PrimitiveValue::Matter { raw, .. } => prop_assert_eq!(raw, fill.to_vec()),
            other => prop_assert!(false, "unexpected primitive {:?}", other),
        }
        prop_assert!(tok.at_end());
    }

    /// Signature groups tokenize member-exact: the declared count equals
    /// the number of indexed signatures produced, with indices intact.
    #[test]
    fn signature_groups_are_member_exact(
        indices in proptest::collection::vec(0usize..64, 1..8),
        fill in any::<u8>(),
    ) {
        let sigs: Vec<(usize, [u8; 64])> =
            indices.iter().map(|i| (*i, [fill; 64])).collect();
        let encoded = attachment_group(&controller_signatures(&sigs)).unwrap();
        let primitives: Result<Vec<_>, _> = Tokenizer::new(&encoded).collect();
        let primitives = primitives.unwrap();
        // one -V counter, one -A counter, then the signatures
        prop_assert_eq!(primitives.len(), sigs.len() + 2);
        for (prim, (index, _)) in primitives[2..].iter().zip(&sigs) {
            match &prim.value {
                PrimitiveValue::IndexedSignature { index: got, .. } => {
                    prop_assert_eq!(got, index);
                }
                other => prop_assert!(false, "unexpected primitive {:?}", other),
            }
        }
    }

    /// Cutting any prefix off a primitive makes it a truncation or unknown
    /// code, never a bogus primitive.
    #[test]
    fn truncation_never_yields_a_primitive(cut in 1usize..44) {
        let qb64 = encode_payload("E", &[0x5a; 32]);
        let truncated = &qb64[..44 - cut];
        let mut tok = Tokenizer::new(truncated);
        prop_assert!(tok.read_primitive().is_err());
    }

    /// Arbitrary input never panics the stream decoder; it either decodes
    /// or reports an error.
    #[test]
    fn decoder_is_total(input in "[ -~]{0,200}") {
        let _ = decode_str(&input);
    }
}
