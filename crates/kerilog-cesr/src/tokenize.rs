//! Primitive tokenizer over a CESR text-domain stream
//!
//! The stream is self-framing: each primitive's total length follows from
//! its code, and counter codes open nested scopes whose extent is declared
//! up front. The tokenizer tracks those scopes so a consumer can tell
//! "signatures attached to event N" from "start of event N+1" without any
//! lookahead into event bodies.
//!
//! Which code table applies depends on the enclosing group (indexed
//! signature codes are only valid inside an indexed-signature group), so a
//! tokenizer is restartable from the beginning of the stream, not from an
//! arbitrary midpoint.

use kerilog_core::{KerilogError, Result};

use crate::primitive::{CounterCode, IndexCode, MatterCode, Primitive, PrimitiveValue};
use crate::qb64;

#[derive(Debug, Clone)]
enum GroupScope {
    /// A quadlet-counted scope; no primitive may extend past `end`
    Quadlet { end: usize },
    /// An indexed-signature group with `remaining` members left to read;
    /// `controller` distinguishes controller from witness signatures
    IdxSigs { remaining: u64, controller: bool },
}

/// Cursor over a CESR text stream yielding one primitive per call
#[derive(Debug)]
pub struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    groups: Vec<GroupScope>,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize from the start of `source`
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            groups: Vec::new(),
        }
    }

    /// Current byte offset
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor; used by the event decoder after consuming a body
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.source.len());
    }

    /// True once the cursor has reached the end of the stream
    pub fn at_end(&mut self) -> bool {
        self.expire_groups();
        self.pos >= self.source.len()
    }

    /// The next byte, without consuming it
    pub fn peek_byte(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    /// True while inside any counter group scope
    pub fn in_group(&mut self) -> bool {
        self.expire_groups();
        !self.groups.is_empty()
    }

    /// End offset of the innermost quadlet-counted scope, if any is open
    pub fn group_end(&mut self) -> Option<usize> {
        self.expire_groups();
        self.groups.iter().rev().find_map(|g| match g {
            GroupScope::Quadlet { end } => Some(*end),
            GroupScope::IdxSigs { .. } => None,
        })
    }

    /// Skip whitespace between framed units; never inside a group scope,
    /// where every character is counted
    pub fn skip_separators(&mut self) {
        self.expire_groups();
        if !self.groups.is_empty() {
            return;
        }
        let bytes = self.source.as_bytes();
        while let Some(b) = bytes.get(self.pos) {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Read exactly one primitive at the cursor
    pub fn read_primitive(&mut self) -> Result<Primitive> {
        self.expire_groups();
        let start = self.pos;
        let bytes = self.source.as_bytes();
        let first = *bytes
            .get(start)
            .ok_or_else(|| KerilogError::truncated("expected a primitive, found end of stream", start))?;

        if self.in_idx_sig_group() {
            return self.read_indexed_signature(start, first);
        }
        if first == b'-' {
            return self.read_counter(start);
        }
        self.read_matter(start)
    }

    fn in_idx_sig_group(&self) -> bool {
        matches!(self.groups.last(), Some(GroupScope::IdxSigs { remaining, .. }) if *remaining > 0)
    }

    /// True when the next primitive is a controller indexed signature
    pub fn in_controller_sig_group(&mut self) -> bool {
        self.expire_groups();
        matches!(
            self.groups.last(),
            Some(GroupScope::IdxSigs { remaining, controller: true }) if *remaining > 0
        )
    }

    fn expire_groups(&mut self) {
        while let Some(group) = self.groups.last() {
            let expired = match group {
                GroupScope::Quadlet { end } => self.pos >= *end,
                GroupScope::IdxSigs { remaining, .. } => *remaining == 0,
            };
            if expired {
                self.groups.pop();
            } else {
                break;
            }
        }
    }

    /// Slice an exact span, rejecting streams where the span would split a
    /// multi-byte character (CESR text is ASCII)
    fn span(&self, start: usize, size: usize) -> Result<&'a str> {
        self.source
            .get(start..start + size)
            .ok_or_else(|| KerilogError::unknown_code("primitive span is not ASCII", start))
    }

    /// Check a span of `size` characters fits the stream and the innermost
    /// quadlet scope
    fn ensure_span(&self, start: usize, size: usize) -> Result<()> {
        if start + size > self.source.len() {
            return Err(KerilogError::truncated(
                format!(
                    "primitive declares {size} characters, {} remain",
                    self.source.len() - start
                ),
                start,
            ));
        }
        let quadlet_end = self.groups.iter().rev().find_map(|g| match g {
            GroupScope::Quadlet { end } => Some(*end),
            GroupScope::IdxSigs { .. } => None,
        });
        if let Some(end) = quadlet_end {
            if start + size > end {
                return Err(KerilogError::framing(
                    format!(
                        "primitive of {size} characters crosses its group boundary at {end}"
                    ),
                    start,
                ));
            }
        }
        Ok(())
    }

    fn read_matter(&mut self, start: usize) -> Result<Primitive> {
        let bytes = &self.source.as_bytes()[start..];
        let code = MatterCode::from_prefix(bytes).ok_or_else(|| {
            KerilogError::unknown_code(
                format!("no primitive code starts with {:?}", bytes[0] as char),
                start,
            )
        })?;
        let (cs, fs) = code.sizes();
        self.ensure_span(start, fs)?;
        let qb64 = self.span(start, fs)?;
        let raw = qb64::decode_payload(cs, qb64, start)?;
        self.pos = start + fs;
        tracing::trace!(code = %code, offset = start, size = fs, "read matter primitive");
        Ok(Primitive {
            value: PrimitiveValue::Matter { code, raw },
            offset: start,
            qb64: qb64.to_string(),
        })
    }

    fn read_indexed_signature(&mut self, start: usize, first: u8) -> Result<Primitive> {
        let code = IndexCode::from_prefix(first).ok_or_else(|| {
            KerilogError::unknown_code(
                format!("no indexed signature code starts with {:?}", first as char),
                start,
            )
        })?;
        let (cs, fs) = code.sizes();
        self.ensure_span(start, fs)?;
        let qb64 = self.span(start, fs)?;
        let index_char = self.source.as_bytes()[start + 1];
        let index = qb64::b64_char_value(index_char).ok_or_else(|| {
            KerilogError::unknown_code(
                format!("signer index character {:?} outside base64url alphabet", index_char as char),
                start + 1,
            )
        })? as usize;
        let raw = qb64::decode_payload(cs, qb64, start)?;
        self.pos = start + fs;
        if let Some(GroupScope::IdxSigs { remaining, .. }) = self.groups.last_mut() {
            *remaining -= 1;
        }
        tracing::trace!(index, offset = start, "read indexed signature");
        Ok(Primitive {
            value: PrimitiveValue::IndexedSignature { code, index, raw },
            offset: start,
            qb64: qb64.to_string(),
        })
    }

    fn read_counter(&mut self, start: usize) -> Result<Primitive> {
        let bytes = self.source.as_bytes();
        let second = *bytes.get(start + 1).ok_or_else(|| {
            KerilogError::truncated("counter cut off after its sentinel", start)
        })?;
        let (code, fs, count_range) = if second == b'0' {
            let third = *bytes.get(start + 2).ok_or_else(|| {
                KerilogError::truncated("big counter cut off after its prefix", start)
            })?;
            let code = CounterCode::from_big_char(third).ok_or_else(|| {
                KerilogError::unknown_code(
                    format!("no big counter code -0{:?}", third as char),
                    start,
                )
            })?;
            (code, 8usize, start + 3..start + 8)
        } else {
            let code = CounterCode::from_char(second).ok_or_else(|| {
                KerilogError::unknown_code(
                    format!("no counter code -{:?}", second as char),
                    start,
                )
            })?;
            (code, 4usize, start + 2..start + 4)
        };
        self.ensure_span(start, fs)?;
        let qb64_span = self.span(start, fs)?;
        let count_text = self
            .source
            .get(count_range)
            .ok_or_else(|| KerilogError::unknown_code("count field is not ASCII", start))?;
        let count = qb64::decode_count(count_text, start)?;
        self.pos = start + fs;

        if code.counts_quadlets() {
            let end = self.pos + (count as usize) * 4;
            if end > self.source.len() {
                return Err(KerilogError::truncated(
                    format!(
                        "group {} declares {count} quadlets, stream ends first",
                        code.code()
                    ),
                    start,
                ));
            }
            self.ensure_span(start, fs + (count as usize) * 4)?;
            self.groups.push(GroupScope::Quadlet { end });
        } else if code.is_indexed_sig_group() && count > 0 {
            self.groups.push(GroupScope::IdxSigs {
                remaining: count,
                controller: code == CounterCode::ControllerIdxSigs,
            });
        }
        tracing::trace!(code = %code, count, offset = start, "read counter");
        Ok(Primitive {
            value: PrimitiveValue::Counter { code, count },
            offset: start,
            qb64: qb64_span.to_string(),
        })
    }
}

/// Lazy sequence view: primitives until end of stream or the next event
/// body start
impl Iterator for Tokenizer<'_> {
    type Item = Result<Primitive>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_separators();
        if self.at_end() {
            return None;
        }
        if !self.in_group() && self.peek_byte() == Some(b'{') {
            return None;
        }
        Some(self.read_primitive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb64::{encode_count, encode_payload};
    use assert_matches::assert_matches;

    fn key_primitive(fill: u8) -> String {
        encode_payload("D", &[fill; 32])
    }

    fn sig_primitive(index: u32, fill: u8) -> String {
        let mut qb64 = String::from("A");
        qb64.push(qb64::u6_to_b64_char(index));
        let body = encode_payload("0B", &[fill; 64]);
        qb64.push_str(&body[2..]);
        qb64
    }

    #[test]
    fn reads_matter_with_exact_span() {
        let source = key_primitive(9);
        let mut tok = Tokenizer::new(&source);
        let prim = tok.read_primitive().unwrap();
        assert_eq!(prim.size(), 44);
        assert_eq!(prim.offset, 0);
        assert_matches!(
            prim.value,
            PrimitiveValue::Matter { code: MatterCode::Ed25519, ref raw } if raw == &vec![9u8; 32]
        );
        assert!(tok.at_end());
    }

    #[test]
    fn indexed_sigs_require_group_context() {
        // 'A' at top level is an Ed25519 seed, not an indexed signature
        let source = encode_payload("A", &[1; 32]);
        let mut tok = Tokenizer::new(&source);
        let prim = tok.read_primitive().unwrap();
        assert_matches!(
            prim.value,
            PrimitiveValue::Matter { code: MatterCode::Ed25519Seed, .. }
        );
    }

    #[test]
    fn counter_switches_code_table() {
        let mut source = format!("-A{}", encode_count(2, 2));
        source.push_str(&sig_primitive(0, 1));
        source.push_str(&sig_primitive(1, 2));
        let mut tok = Tokenizer::new(&source);

        let counter = tok.read_primitive().unwrap();
        assert_matches!(
            counter.value,
            PrimitiveValue::Counter { code: CounterCode::ControllerIdxSigs, count: 2 }
        );
        let first = tok.read_primitive().unwrap();
        assert_matches!(
            first.value,
            PrimitiveValue::IndexedSignature { index: 0, .. }
        );
        let second = tok.read_primitive().unwrap();
        assert_matches!(
            second.value,
            PrimitiveValue::IndexedSignature { index: 1, .. }
        );
        assert!(!tok.in_group());
    }

    #[test]
    fn attachment_group_scope_tracked() {
        let sigs = format!("-A{}{}", encode_count(1, 2), sig_primitive(0, 3));
        let quadlets = (sigs.len() / 4) as u64;
        let source = format!("-V{}{}", encode_count(quadlets, 2), sigs);
        let mut tok = Tokenizer::new(&source);

        let group = tok.read_primitive().unwrap();
        assert_matches!(
            group.value,
            PrimitiveValue::Counter { code: CounterCode::AttachmentGroup, .. }
        );
        assert_eq!(tok.group_end(), Some(source.len()));
        tok.read_primitive().unwrap(); // -A counter
        tok.read_primitive().unwrap(); // signature
        assert!(!tok.in_group());
        assert!(tok.at_end());
    }

    #[test]
    fn truncated_primitive_is_truncated_stream() {
        let source = &key_primitive(5)[..20];
        let mut tok = Tokenizer::new(source);
        assert_matches!(
            tok.read_primitive(),
            Err(KerilogError::Truncated { .. })
        );
    }

    #[test]
    fn truncated_group_is_truncated_stream() {
        // group declares more quadlets than the stream holds
        let source = format!("-V{}", encode_count(10, 2));
        let mut tok = Tokenizer::new(&source);
        assert_matches!(
            tok.read_primitive(),
            Err(KerilogError::Truncated { .. })
        );
    }

    #[test]
    fn unknown_code_reported_with_offset() {
        let source = "zzzz";
        let mut tok = Tokenizer::new(source);
        assert_matches!(
            tok.read_primitive(),
            Err(KerilogError::UnknownCode { offset: 0, .. })
        );
    }

    #[test]
    fn iterator_stops_at_body_start() {
        let mut source = key_primitive(1);
        source.push_str("{\"v\":\"KERI10JSON000000_\"}");
        let primitives: Vec<_> = Tokenizer::new(&source).collect::<Result<_>>().unwrap();
        assert_eq!(primitives.len(), 1);
    }
}
