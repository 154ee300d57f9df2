//! Ed25519 verification of attached indexed signatures

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use kerilog_cesr::qb64;
use kerilog_core::{KeyEvent, PublicKey};

/// Verify an event's attached signatures against a key list
///
/// Returns the key indices whose signatures verified over the raw body
/// bytes. Out-of-range indices, undecodable keys, and bad signatures are
/// simply not counted; whether the survivors satisfy the threshold is the
/// caller's question.
pub fn verified_indices(event: &KeyEvent, keys: &[PublicKey]) -> Vec<usize> {
    let message = event.raw_body.as_bytes();
    let mut verified = Vec::new();
    for attached in &event.signatures {
        if attached.index >= keys.len() {
            tracing::debug!(
                index = attached.index,
                keys = keys.len(),
                "signature index outside the key list"
            );
            continue;
        }
        let Some(key) = decode_key(&keys[attached.index]) else {
            tracing::debug!(index = attached.index, "signing key is not a decodable Ed25519 key");
            continue;
        };
        let Some(signature) = decode_signature(&attached.qb64) else {
            tracing::debug!(index = attached.index, "attached signature is not decodable");
            continue;
        };
        if key.verify(message, &signature).is_ok() {
            verified.push(attached.index);
        } else {
            tracing::debug!(index = attached.index, "signature does not verify");
        }
    }
    verified
}

fn decode_key(key: &PublicKey) -> Option<VerifyingKey> {
    if !key.as_str().starts_with('D') {
        return None;
    }
    let raw = qb64::decode_payload(1, key.as_str(), 0).ok()?;
    let bytes: [u8; 32] = raw.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

fn decode_signature(qb64_sig: &str) -> Option<Signature> {
    // indexed signature: two code characters, then the signature body
    let raw = qb64::decode_payload(2, qb64_sig, 0).ok()?;
    let bytes: [u8; 64] = raw.try_into().ok()?;
    Some(Signature::from_bytes(&bytes))
}
