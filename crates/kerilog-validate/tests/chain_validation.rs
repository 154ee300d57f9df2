//! Chain validation over composed, signed streams.

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::json;

use kerilog_cesr::encode::{
    attachment_group, controller_signatures, ed25519_key, key_commitment, EventBuilder,
};
use kerilog_cesr::{decode_str, BuiltEvent};
use kerilog_core::{DiagnosticCode, Severity, Threshold};
use kerilog_validate::{ChainValidator, ValidatedEvent};

fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

fn key_qb64(key: &SigningKey) -> String {
    ed25519_key(key.verifying_key().as_bytes())
}

/// Sign `body` with each (index, key) pair and encode the attachment group
fn sign_attach(body: &str, signers: &[(usize, &SigningKey)]) -> String {
    let sigs: Vec<(usize, [u8; 64])> = signers
        .iter()
        .map(|(index, key)| (*index, key.sign(body.as_bytes()).to_bytes()))
        .collect();
    attachment_group(&controller_signatures(&sigs)).unwrap()
}

fn validate_stream(stream: &str) -> (Vec<ValidatedEvent>, ChainValidator) {
    let outcome = decode_str(stream).unwrap();
    let mut validator = ChainValidator::new();
    let validated = outcome
        .events
        .into_iter()
        .map(|event| validator.validate(event))
        .collect();
    (validated, validator)
}

/// inception(K0, next=K1) → rotation(K1, next=K2) signed by K0 →
/// interaction signed by K1, one seal
fn clean_three_event_stream() -> (String, [SigningKey; 3], BuiltEvent, BuiltEvent, BuiltEvent) {
    let k0 = signing_key(0x10);
    let k1 = signing_key(0x11);
    let k2 = signing_key(0x12);

    let icp = EventBuilder::inception()
        .keys(vec![key_qb64(&k0)])
        .threshold(1)
        .next_digests(vec![key_commitment(&key_qb64(&k1))])
        .build()
        .unwrap();
    let rot = EventBuilder::rotation(1, &icp.said)
        .prefix(&icp.prefix)
        .keys(vec![key_qb64(&k1)])
        .threshold(1)
        .next_digests(vec![key_commitment(&key_qb64(&k2))])
        .build()
        .unwrap();
    let ixn = EventBuilder::interaction(2, &rot.said)
        .prefix(&icp.prefix)
        .seal(json!({"i": icp.prefix.as_str(), "s": "0", "d": icp.said.as_str()}))
        .build()
        .unwrap();

    let mut stream = String::new();
    stream.push_str(&icp.body);
    stream.push_str(&sign_attach(&icp.body, &[(0, &k0)]));
    stream.push_str(&rot.body);
    stream.push_str(&sign_attach(&rot.body, &[(0, &k0)])); // pre-rotation keys sign
    stream.push_str(&ixn.body);
    stream.push_str(&sign_attach(&ixn.body, &[(0, &k1)]));
    (stream, [k0, k1, k2], icp, rot, ixn)
}

#[test]
fn clean_chain_accepts_every_event() {
    let (stream, [_, k1, _], icp, rot, _) = clean_three_event_stream();
    let (validated, validator) = validate_stream(&stream);

    assert_eq!(validated.len(), 3);
    for event in &validated {
        assert!(event.accepted, "{:?}", event.diagnostics);
        assert!(event.diagnostics.is_empty(), "{:?}", event.diagnostics);
    }

    let state = validator.states().get(&icp.prefix).unwrap();
    assert_eq!(state.keys, vec![kerilog_core::PublicKey::new(key_qb64(&k1))]);
    assert_eq!(state.last_sn, 2);
    assert_ne!(state.last_digest, rot.said); // interaction advanced the head
}

#[test]
fn interaction_leaves_keys_unchanged() {
    let (stream, _, _, _, _) = clean_three_event_stream();
    let (validated, _) = validate_stream(&stream);
    let after_rot = validated[1].state.as_ref().unwrap();
    let after_ixn = validated[2].state.as_ref().unwrap();
    assert_eq!(after_rot.keys, after_ixn.keys);
    assert_eq!(after_rot.next_digests, after_ixn.next_digests);
}

#[test]
fn fork_sibling_is_flagged_chain_fork() {
    let (mut stream, [k0, _, _], icp, _, _) = clean_three_event_stream();

    // a second, conflicting event at sn 1 chained on a digest that is not
    // the accepted head
    let bogus_prior = kerilog_cesr::said::default_digest_qb64(b"elsewhere");
    let fork = EventBuilder::interaction(1, &kerilog_core::SelfAddress::new(bogus_prior))
        .prefix(&icp.prefix)
        .build()
        .unwrap();
    stream.push_str(&fork.body);
    stream.push_str(&sign_attach(&fork.body, &[(0, &k0)]));

    let (validated, _) = validate_stream(&stream);
    assert_eq!(validated.len(), 4);
    // the original three still stand
    assert!(validated[..3].iter().all(|e| e.accepted));
    let fork_event = &validated[3];
    assert!(!fork_event.accepted);
    assert_matches!(
        fork_event.diagnostics.as_slice(),
        [d] if d.code == DiagnosticCode::ChainFork
    );
}

#[test]
fn wrong_prior_digest_is_chain_fork() {
    let k0 = signing_key(0x20);
    let k1 = signing_key(0x21);
    let icp = EventBuilder::inception()
        .keys(vec![key_qb64(&k0)])
        .threshold(1)
        .next_digests(vec![key_commitment(&key_qb64(&k1))])
        .build()
        .unwrap();
    // chained on a digest that was never accepted
    let wrong_prior = kerilog_core::SelfAddress::new(kerilog_cesr::said::default_digest_qb64(b"x"));
    let rot = EventBuilder::rotation(1, &wrong_prior)
        .prefix(&icp.prefix)
        .keys(vec![key_qb64(&k1)])
        .threshold(1)
        .next_digests(vec![])
        .build()
        .unwrap();

    let mut stream = String::new();
    stream.push_str(&icp.body);
    stream.push_str(&sign_attach(&icp.body, &[(0, &k0)]));
    stream.push_str(&rot.body);
    stream.push_str(&sign_attach(&rot.body, &[(0, &k0)]));

    let (validated, validator) = validate_stream(&stream);
    assert!(validated[0].accepted);
    assert!(!validated[1].accepted);
    assert_eq!(validated[1].diagnostics[0].code, DiagnosticCode::ChainFork);
    // state still reflects the inception
    let state = validator.states().get(&icp.prefix).unwrap();
    assert_eq!(state.last_sn, 0);
}

#[test]
fn byte_tampered_prior_rejects_only_that_event() {
    let (stream, _, _, rot, _) = clean_three_event_stream();
    // flip one character inside the rotation's prior digest field
    let prior_field = format!("\"p\":\"{}\"", rot.body.split("\"p\":\"").nth(1).unwrap().split('"').next().unwrap());
    let tampered_field = {
        let mut chars: Vec<char> = prior_field.chars().collect();
        let target = prior_field.len() - 10;
        chars[target] = if chars[target] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect::<String>()
    };
    let tampered = stream.replace(&prior_field, &tampered_field);
    assert_ne!(tampered, stream);

    let (validated, _) = validate_stream(&tampered);
    assert_eq!(validated.len(), 3);
    assert!(validated[0].accepted);
    // the tampered rotation no longer matches its own digest
    assert!(!validated[1].accepted);
    assert!(validated[1]
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error));
    // the interaction chains on the untampered rotation, which was never
    // accepted; it must not sneak in against the inception state
    assert!(!validated[2].accepted);
}

#[test]
fn duplicate_inception_is_rejected_first_stands() {
    let (mut stream, [k0, _, _], icp, _, _) = clean_three_event_stream();
    stream.push_str(&icp.body);
    stream.push_str(&sign_attach(&icp.body, &[(0, &k0)]));

    let (validated, validator) = validate_stream(&stream);
    assert_eq!(validated.len(), 4);
    assert!(validated[0].accepted);
    assert!(!validated[3].accepted);
    assert_eq!(
        validated[3].diagnostics[0].code,
        DiagnosticCode::DuplicateInception
    );
    // key state still comes from the original chain
    assert_eq!(validator.states().get(&icp.prefix).unwrap().last_sn, 2);
}

#[test]
fn uncommitted_rotation_key_is_commitment_mismatch() {
    let k0 = signing_key(0x30);
    let k1 = signing_key(0x31);
    let k_other = signing_key(0x3f);
    let icp = EventBuilder::inception()
        .keys(vec![key_qb64(&k0)])
        .threshold(1)
        .next_digests(vec![key_commitment(&key_qb64(&k1))])
        .build()
        .unwrap();
    // announces a key that was never committed to
    let rot = EventBuilder::rotation(1, &icp.said)
        .prefix(&icp.prefix)
        .keys(vec![key_qb64(&k_other)])
        .threshold(1)
        .next_digests(vec![])
        .build()
        .unwrap();

    let mut stream = String::new();
    stream.push_str(&icp.body);
    stream.push_str(&sign_attach(&icp.body, &[(0, &k0)]));
    stream.push_str(&rot.body);
    stream.push_str(&sign_attach(&rot.body, &[(0, &k0)]));

    let (validated, validator) = validate_stream(&stream);
    assert!(!validated[1].accepted);
    assert_eq!(
        validated[1].diagnostics[0].code,
        DiagnosticCode::CommitmentMismatch
    );
    // the rejected rotation did not alter key state
    let state = validator.states().get(&icp.prefix).unwrap();
    assert_eq!(state.keys, vec![kerilog_core::PublicKey::new(key_qb64(&k0))]);
}

#[test]
fn rotation_after_abandonment_is_commitment_mismatch() {
    let k0 = signing_key(0x40);
    let k1 = signing_key(0x41);
    let icp = EventBuilder::inception()
        .keys(vec![key_qb64(&k0)])
        .threshold(1)
        .next_digests(vec![]) // no further rotation permitted
        .build()
        .unwrap();
    let rot = EventBuilder::rotation(1, &icp.said)
        .prefix(&icp.prefix)
        .keys(vec![key_qb64(&k1)])
        .threshold(1)
        .next_digests(vec![])
        .build()
        .unwrap();

    let mut stream = String::new();
    stream.push_str(&icp.body);
    stream.push_str(&sign_attach(&icp.body, &[(0, &k0)]));
    stream.push_str(&rot.body);
    stream.push_str(&sign_attach(&rot.body, &[(0, &k0)]));

    let (validated, _) = validate_stream(&stream);
    assert!(validated[0].accepted);
    assert_eq!(
        validated[1].diagnostics[0].code,
        DiagnosticCode::CommitmentMismatch
    );
}

#[test]
fn unsatisfied_threshold_is_rejected() {
    let k0 = signing_key(0x50);
    let k1 = signing_key(0x51);
    let icp = EventBuilder::inception()
        .keys(vec![key_qb64(&k0)])
        .threshold(1)
        .next_digests(vec![key_commitment(&key_qb64(&k1))])
        .build()
        .unwrap();
    let rot = EventBuilder::rotation(1, &icp.said)
        .prefix(&icp.prefix)
        .keys(vec![key_qb64(&k1)])
        .threshold(1)
        .next_digests(vec![])
        .build()
        .unwrap();

    let mut stream = String::new();
    stream.push_str(&icp.body);
    stream.push_str(&sign_attach(&icp.body, &[(0, &k0)]));
    // signed by the new key instead of the current state's key
    stream.push_str(&rot.body);
    stream.push_str(&sign_attach(&rot.body, &[(0, &k1)]));

    let (validated, _) = validate_stream(&stream);
    assert!(validated[0].accepted);
    assert!(!validated[1].accepted);
    assert_eq!(
        validated[1].diagnostics[0].code,
        DiagnosticCode::ThresholdNotMet
    );
}

#[test]
fn weighted_threshold_counts_weights() {
    let keys: Vec<SigningKey> = vec![signing_key(0x60), signing_key(0x61), signing_key(0x62)];
    let key_list: Vec<String> = keys.iter().map(key_qb64).collect();
    let icp = EventBuilder::inception()
        .keys(key_list)
        .weighted_threshold(["1/2", "1/2", "1/2"].map(String::from))
        .next_digests(vec![])
        .build()
        .unwrap();

    // two of three halves reach 1
    let mut stream = icp.body.clone();
    stream.push_str(&sign_attach(&icp.body, &[(0, &keys[0]), (2, &keys[2])]));
    let (validated, _) = validate_stream(&stream);
    assert!(validated[0].accepted, "{:?}", validated[0].diagnostics);
    assert_matches!(
        validated[0].event.threshold,
        Some(Threshold::Weighted(_))
    );

    // a single half does not
    let mut stream = icp.body.clone();
    stream.push_str(&sign_attach(&icp.body, &[(1, &keys[1])]));
    let (validated, _) = validate_stream(&stream);
    assert!(!validated[0].accepted);
    assert_eq!(
        validated[0].diagnostics[0].code,
        DiagnosticCode::ThresholdNotMet
    );
}

#[test]
fn sequence_gap_is_flagged() {
    let (stream, [_, k1, _], icp, rot, _) = clean_three_event_stream();
    // skip sn 3 and submit sn 4
    let skipped = EventBuilder::interaction(4, &rot.said)
        .prefix(&icp.prefix)
        .build()
        .unwrap();
    let mut stream = stream;
    stream.push_str(&skipped.body);
    stream.push_str(&sign_attach(&skipped.body, &[(0, &k1)]));

    let (validated, _) = validate_stream(&stream);
    assert!(!validated[3].accepted);
    assert_eq!(validated[3].diagnostics[0].code, DiagnosticCode::SequenceGap);
}

#[test]
fn receipts_check_the_accepted_digest() {
    let (mut stream, _, icp, _, _) = clean_three_event_stream();
    let good = EventBuilder::receipt(0, &icp.said)
        .prefix(&icp.prefix)
        .build()
        .unwrap();
    let dangling = EventBuilder::receipt(
        9,
        &kerilog_core::SelfAddress::new(kerilog_cesr::said::default_digest_qb64(b"nothing")),
    )
    .prefix(&icp.prefix)
    .build()
    .unwrap();
    stream.push_str(&good.body);
    stream.push_str(&dangling.body);

    let (validated, validator) = validate_stream(&stream);
    assert_eq!(validated.len(), 5);
    let receipt = &validated[3];
    assert!(receipt.accepted);
    assert!(receipt.diagnostics.is_empty(), "{:?}", receipt.diagnostics);
    let bad_receipt = &validated[4];
    assert!(bad_receipt.accepted); // listed, state untouched
    assert_eq!(
        bad_receipt.diagnostics[0].code,
        DiagnosticCode::ReceiptMismatch
    );
    assert_eq!(bad_receipt.diagnostics[0].severity, Severity::Warning);
    assert_eq!(validator.states().len(), 1);
}

#[test]
fn independent_identifiers_validate_independently() {
    let (stream_a, _, icp_a, _, _) = clean_three_event_stream();
    let kb = signing_key(0x70);
    let icp_b = EventBuilder::inception()
        .keys(vec![key_qb64(&kb)])
        .threshold(1)
        .next_digests(vec![])
        .build()
        .unwrap();
    let mut stream = stream_a;
    stream.push_str(&icp_b.body);
    stream.push_str(&sign_attach(&icp_b.body, &[(0, &kb)]));

    let (validated, validator) = validate_stream(&stream);
    assert!(validated.iter().all(|e| e.accepted));
    assert_eq!(validator.states().len(), 2);
    assert_ne!(icp_a.prefix, icp_b.prefix);
    assert_eq!(validator.states().get(&icp_b.prefix).unwrap().last_sn, 0);
}

#[test]
fn rotation_before_inception_is_rejected() {
    let k0 = signing_key(0x80);
    let bogus_prior =
        kerilog_core::SelfAddress::new(kerilog_cesr::said::default_digest_qb64(b"none"));
    let rot = EventBuilder::rotation(1, &bogus_prior)
        .prefix(&kerilog_core::Prefix::new(key_qb64(&k0)))
        .keys(vec![key_qb64(&k0)])
        .threshold(1)
        .next_digests(vec![])
        .build()
        .unwrap();
    let mut stream = rot.body.clone();
    stream.push_str(&sign_attach(&rot.body, &[(0, &k0)]));

    let (validated, validator) = validate_stream(&stream);
    assert!(!validated[0].accepted);
    assert_eq!(validated[0].diagnostics[0].code, DiagnosticCode::SequenceGap);
    assert!(validator.states().is_empty());
}
