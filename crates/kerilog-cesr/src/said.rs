//! Self-addressing digest computation
//!
//! An event's `d` field is the digest of its own body with the digest field
//! replaced by `#` padding of the same width. At inception the identifier
//! prefix equals the digest, so dummying every occurrence of the digest
//! string covers the `i` field as well (no other field can collide with the
//! event's own digest).

use sha2::{Digest, Sha256};

use kerilog_core::SelfAddress;

use crate::primitive::MatterCode;
use crate::qb64;

/// Digest `data` under a digest matter code, returning the qb64 form
///
/// Returns `None` for digest codes this crate does not compute (Blake2,
/// SHA3).
pub fn digest_qb64(code: MatterCode, data: &[u8]) -> Option<String> {
    let raw: [u8; 32] = match code {
        MatterCode::Blake3 => *blake3::hash(data).as_bytes(),
        MatterCode::Sha2 => Sha256::digest(data).into(),
        _ => return None,
    };
    Some(qb64::encode_payload(code.code(), &raw))
}

/// Digest under the default code (Blake3-256)
pub fn default_digest_qb64(data: &[u8]) -> String {
    qb64::encode_payload(MatterCode::Blake3.code(), blake3::hash(data).as_bytes())
}

/// Recompute the expected self-addressing digest of `raw_body`
///
/// Returns `None` when the claimed digest uses a code this crate does not
/// compute, in which case the check is skipped.
pub fn expected_said(raw_body: &str, claimed: &SelfAddress) -> Option<String> {
    let code = match claimed.code()? {
        'E' => MatterCode::Blake3,
        'I' => MatterCode::Sha2,
        _ => return None,
    };
    let dummy = "#".repeat(claimed.as_str().len());
    let dummied = raw_body.replace(claimed.as_str(), &dummy);
    digest_qb64(code, dummied.as_bytes())
}

/// True when the claimed digest is either correct or uses a code the check
/// cannot evaluate
pub fn said_verifies(raw_body: &str, claimed: &SelfAddress) -> bool {
    match expected_said(raw_body, claimed) {
        Some(expected) => expected == claimed.as_str(),
        None => true,
    }
}
