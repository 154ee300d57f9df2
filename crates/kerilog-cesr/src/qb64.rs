//! qb64 text-domain codec
//!
//! CESR primitives interleave a short code with base64url payload such that
//! the whole primitive is a multiple of four characters. The pad rule is
//! positional: a code of length `cs` displaces `cs % 4` pad characters, so
//! decoding prepends that many `A` characters, decodes, and drops the same
//! number of leading zero bytes. Encoding is the exact inverse.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use kerilog_core::{KerilogError, Result};

/// Value of one base64url character, or `None` for characters outside the
/// alphabet
pub fn b64_char_value(c: u8) -> Option<u32> {
    match c {
        b'A'..=b'Z' => Some(u32::from(c - b'A')),
        b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
        b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

/// The base64url character for a six-bit value
///
/// Values above 63 wrap; callers keep indices in range.
pub fn u6_to_b64_char(value: u32) -> char {
    const ALPHABET: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    ALPHABET[(value & 0x3f) as usize] as char
}

/// Decode the count field of a counter: `chars` base64url characters as a
/// big-endian base-64 integer
pub fn decode_count(text: &str, offset: usize) -> Result<u64> {
    let mut count: u64 = 0;
    for (i, c) in text.bytes().enumerate() {
        let value = b64_char_value(c).ok_or_else(|| {
            KerilogError::unknown_code(
                format!("count character {:?} outside base64url alphabet", c as char),
                offset + i,
            )
        })?;
        count = count * 64 + u64::from(value);
    }
    Ok(count)
}

/// Encode a count as `width` base64url characters
pub fn encode_count(mut count: u64, width: usize) -> String {
    let mut out = vec!['A'; width];
    for slot in out.iter_mut().rev() {
        *slot = u6_to_b64_char((count % 64) as u32);
        count /= 64;
    }
    out.into_iter().collect()
}

/// Decode the payload of a primitive whose code occupies `code_size`
/// characters of the full `qb64` span
pub fn decode_payload(code_size: usize, qb64: &str, offset: usize) -> Result<Vec<u8>> {
    let ps = code_size % 4;
    let value = qb64.get(code_size..).ok_or_else(|| {
        KerilogError::truncated(format!("primitive shorter than its {code_size}-char code"), offset)
    })?;
    let mut padded = String::with_capacity(ps + value.len());
    for _ in 0..ps {
        padded.push('A');
    }
    padded.push_str(value);
    let decoded = URL_SAFE_NO_PAD.decode(padded.as_bytes()).map_err(|e| {
        KerilogError::unknown_code(format!("primitive payload is not base64url: {e}"), offset)
    })?;
    if decoded.len() < ps {
        return Err(KerilogError::truncated("primitive payload shorter than its pad", offset));
    }
    Ok(decoded[ps..].to_vec())
}

/// Encode a payload under a code, producing the full qb64 span
pub fn encode_payload(code: &str, raw: &[u8]) -> String {
    let ps = code.len() % 4;
    let mut prefixed = vec![0u8; ps];
    prefixed.extend_from_slice(raw);
    let encoded = URL_SAFE_NO_PAD.encode(&prefixed);
    format!("{code}{}", &encoded[ps..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_one_char_code() {
        let raw = [7u8; 32];
        let qb64 = encode_payload("D", &raw);
        assert_eq!(qb64.len(), 44);
        assert!(qb64.starts_with('D'));
        assert_eq!(decode_payload(1, &qb64, 0).unwrap(), raw.to_vec());
    }

    #[test]
    fn payload_round_trips_two_char_code() {
        let raw = [0xabu8; 64];
        let qb64 = encode_payload("0B", &raw);
        assert_eq!(qb64.len(), 88);
        assert!(qb64.starts_with("0B"));
        assert_eq!(decode_payload(2, &qb64, 0).unwrap(), raw.to_vec());
    }

    #[test]
    fn count_round_trips() {
        for count in [0u64, 1, 63, 64, 4095] {
            let text = encode_count(count, 2);
            assert_eq!(decode_count(&text, 0).unwrap(), count);
        }
        assert_eq!(encode_count(1, 2), "AB");
    }

    #[test]
    fn bad_alphabet_rejected() {
        assert!(decode_count("A!", 0).is_err());
    }
}
