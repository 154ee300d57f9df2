//! Event decoder: bodies plus their attached material
//!
//! Walks the stream alternating between version-framed JSON bodies and the
//! CESR primitives attached after each body. Malformed *events* become
//! diagnostics on the decoded entry; only stream-level faults (bad framing,
//! unknown codes, truncation) abort the current event, and the decoder then
//! resynchronizes at the next recognizable body start. A stream whose very
//! first unit cannot be read at all fails the whole parse.

use serde_json::Value;

use kerilog_core::{
    Diagnostic, DiagnosticCode, EventKind, IndexedSignature, KerilogError, KeyEvent, Prefix,
    PublicKey, Result, Seal, SelfAddress, Threshold,
};

use crate::primitive::{CounterCode, PrimitiveValue};
use crate::said;
use crate::tokenize::Tokenizer;
use crate::version::{self, SerialKind};

/// One decoded event with the diagnostics decoding itself produced
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    /// The decoded event
    pub event: KeyEvent,
    /// Structural diagnostics (missing fields, digest mismatch, skipped
    /// attachment groups)
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of decoding one whole stream
#[derive(Debug, Clone, Default)]
pub struct DecodeOutcome {
    /// Events in stream order
    pub events: Vec<DecodedEvent>,
    /// Faults not attributable to any single decoded event
    pub stream_diagnostics: Vec<Diagnostic>,
}

/// Decode a raw byte stream
pub fn decode_stream(bytes: &[u8]) -> Result<DecodeOutcome> {
    let source = std::str::from_utf8(bytes)
        .map_err(|e| KerilogError::unreadable(format!("stream is not valid UTF-8: {e}")))?;
    decode_str(source)
}

/// Decode a text stream
pub fn decode_str(source: &str) -> Result<DecodeOutcome> {
    StreamDecoder::new(source).run()
}

struct StreamDecoder<'a> {
    source: &'a str,
    tok: Tokenizer<'a>,
    events: Vec<DecodedEvent>,
    stream_diags: Vec<Diagnostic>,
}

impl<'a> StreamDecoder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            tok: Tokenizer::new(source),
            events: Vec::new(),
            stream_diags: Vec::new(),
        }
    }

    fn run(mut self) -> Result<DecodeOutcome> {
        loop {
            self.tok.skip_separators();
            if self.tok.at_end() {
                break;
            }
            if self.tok.peek_byte() == Some(b'{') {
                self.decode_event()?;
            } else {
                self.consume_stray_material()?;
            }
        }
        tracing::debug!(
            events = self.events.len(),
            stream_faults = self.stream_diags.len(),
            "stream decoded"
        );
        Ok(DecodeOutcome {
            events: self.events,
            stream_diagnostics: self.stream_diags,
        })
    }

    /// Next body start at or after `from`
    fn find_body(&self, from: usize) -> Option<usize> {
        let from = from.min(self.source.len());
        self.source.get(from..)?.find("{\"v\":\"").map(|i| i + from)
    }

    /// Record a stream fault and resynchronize, or fail the parse when
    /// nothing has been decoded and no resync point exists
    fn stream_fault(&mut self, err: KerilogError) -> Result<()> {
        let offset = err.offset().unwrap_or_else(|| self.tok.pos());
        match self.find_body(offset + 1) {
            Some(next) => {
                self.stream_diags
                    .push(Diagnostic::error(DiagnosticCode::StreamFault, err.to_string(), offset));
                self.tok.seek(next);
                Ok(())
            }
            None if self.events.is_empty() => Err(err),
            None => {
                self.stream_diags
                    .push(Diagnostic::error(DiagnosticCode::StreamFault, err.to_string(), offset));
                self.tok.seek(self.source.len());
                Ok(())
            }
        }
    }

    /// Tokenize material that is not attached to any event (before the
    /// first body, or left over after a resync)
    fn consume_stray_material(&mut self) -> Result<()> {
        let start = self.tok.pos();
        loop {
            if !self.tok.in_group() {
                self.tok.skip_separators();
            }
            if self.tok.at_end() || (!self.tok.in_group() && self.tok.peek_byte() == Some(b'{')) {
                break;
            }
            if let Err(err) = self.tok.read_primitive() {
                return self.stream_fault(err);
            }
        }
        if self.tok.pos() > start {
            self.stream_diags.push(Diagnostic::warning(
                DiagnosticCode::StreamFault,
                "material not attached to any event",
                start,
            ));
        }
        Ok(())
    }

    fn decode_event(&mut self) -> Result<()> {
        let start = self.tok.pos();
        let info = match version::sniff(self.source, start) {
            Ok(info) => info,
            Err(err) => return self.stream_fault(err),
        };
        let body_end = start + info.size;
        if body_end > self.source.len() {
            return self.stream_fault(KerilogError::truncated(
                format!("body declares {} bytes, stream ends first", info.size),
                start,
            ));
        }
        let Some(raw_body) = self.source.get(start..body_end) else {
            return self.stream_fault(KerilogError::framing(
                "declared body size splits a character",
                start,
            ));
        };

        if info.kind != SerialKind::Json {
            self.stream_diags.push(Diagnostic::error(
                DiagnosticCode::UnsupportedSerialization,
                format!("cannot decode a {} body", info.kind),
                start,
            ));
            self.tok.seek(body_end);
            let _ = self.read_attachments();
            return Ok(());
        }

        let value: Value = match serde_json::from_str(raw_body) {
            Ok(value) => value,
            Err(e) => {
                return self.stream_fault(KerilogError::framing(
                    format!("declared span is not one JSON value: {e}"),
                    start,
                ))
            }
        };

        let Some((mut event, mut diags)) = self.build_event(&value, raw_body, start) else {
            // the body could not even be typed; skip its attachments
            self.tok.seek(body_end);
            let _ = self.read_attachments();
            return Ok(());
        };

        self.tok.seek(body_end);
        let (signatures, attach_diags) = self.read_attachments();
        event.signatures = signatures;
        event.raw_attachments = self
            .source
            .get(body_end..self.tok.pos())
            .unwrap_or_default()
            .to_string();
        diags.extend(attach_diags);
        for diag in &mut diags {
            diag.sn.get_or_insert(event.sn);
        }
        tracing::debug!(
            kind = %event.kind,
            sn = event.sn,
            identifier = event.identifier_str(),
            diagnostics = diags.len(),
            "event decoded"
        );
        self.events.push(DecodedEvent {
            event,
            diagnostics: diags,
        });
        Ok(())
    }

    /// Extract the structural fields of one body
    ///
    /// Returns `None` when the body cannot be typed at all (not an object,
    /// missing or unknown `t`); those faults go to the stream diagnostics.
    fn build_event(
        &mut self,
        value: &Value,
        raw_body: &str,
        offset: usize,
    ) -> Option<(KeyEvent, Vec<Diagnostic>)> {
        let Some(obj) = value.as_object() else {
            self.stream_diags.push(Diagnostic::error(
                DiagnosticCode::MalformedEvent,
                "event body is not an object",
                offset,
            ));
            return None;
        };
        let Some(t) = obj.get("t").and_then(Value::as_str) else {
            self.stream_diags.push(Diagnostic::error(
                DiagnosticCode::MalformedEvent,
                "event body has no kind field",
                offset,
            ));
            return None;
        };
        let Some(kind) = EventKind::from_code(t) else {
            self.stream_diags.push(Diagnostic::error(
                DiagnosticCode::MalformedEvent,
                format!("unknown event kind {t:?}"),
                offset,
            ));
            return None;
        };

        let mut diags = Vec::new();

        let digest = match obj.get("d").and_then(Value::as_str) {
            Some(d) if !d.is_empty() => SelfAddress::new(d),
            _ => {
                diags.push(Diagnostic::error(
                    DiagnosticCode::MalformedEvent,
                    "event has no digest field",
                    offset,
                ));
                SelfAddress::new("")
            }
        };
        let prefix = obj
            .get("i")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(Prefix::new);
        let sn = match obj.get("s") {
            Some(Value::String(s)) => match u64::from_str_radix(s, 16) {
                Ok(sn) => sn,
                Err(_) => {
                    diags.push(Diagnostic::error(
                        DiagnosticCode::MalformedEvent,
                        format!("sequence number {s:?} is not hex"),
                        offset,
                    ));
                    0
                }
            },
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => {
                if kind.is_chained() || kind == EventKind::Receipt {
                    diags.push(Diagnostic::error(
                        DiagnosticCode::MalformedEvent,
                        "event has no sequence number",
                        offset,
                    ));
                }
                0
            }
        };
        let prior = obj
            .get("p")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(SelfAddress::new);
        let threshold = threshold_field(obj, "kt", offset, &mut diags);
        let next_threshold = threshold_field(obj, "nt", offset, &mut diags);
        let keys = string_list(obj.get("k"))
            .unwrap_or_else(|| {
                diags.push(Diagnostic::error(
                    DiagnosticCode::MalformedEvent,
                    "key list is not a list of strings",
                    offset,
                ));
                Vec::new()
            })
            .into_iter()
            .map(PublicKey::new)
            .collect::<Vec<_>>();
        let next_digests = string_list(obj.get("n"))
            .unwrap_or_else(|| {
                diags.push(Diagnostic::error(
                    DiagnosticCode::MalformedEvent,
                    "next-key commitment is not a list of strings",
                    offset,
                ));
                Vec::new()
            })
            .into_iter()
            .map(SelfAddress::new)
            .collect::<Vec<_>>();
        let seals = match obj.get("a") {
            Some(Value::Array(items)) => items.iter().cloned().map(Seal).collect(),
            _ => Vec::new(),
        };

        check_required_fields(kind, obj, &keys, &threshold, &prior, &mut diags, offset);

        // the digest of a receipt names the receipted event, not the
        // receipt body itself
        if kind != EventKind::Receipt
            && !digest.as_str().is_empty()
            && !said::said_verifies(raw_body, &digest)
        {
            diags.push(Diagnostic::error(
                DiagnosticCode::MalformedEvent,
                "self-addressing digest does not match the event body",
                offset,
            ));
        }

        let event = KeyEvent {
            kind,
            prefix,
            sn,
            digest,
            prior,
            keys,
            threshold,
            next_digests,
            next_threshold,
            seals,
            signatures: Vec::new(),
            raw_body: raw_body.to_string(),
            raw_attachments: String::new(),
            offset,
        };
        Some((event, diags))
    }

    /// Consume primitives up to the next body start or end of stream,
    /// collecting controller indexed signatures
    fn read_attachments(&mut self) -> (Vec<IndexedSignature>, Vec<Diagnostic>) {
        let mut sigs = Vec::new();
        let mut diags = Vec::new();
        loop {
            if !self.tok.in_group() {
                self.tok.skip_separators();
            }
            if self.tok.at_end() {
                break;
            }
            if !self.tok.in_group() && self.tok.peek_byte() == Some(b'{') {
                break;
            }
            let in_controller_group = self.tok.in_controller_sig_group();
            let prim = match self.tok.read_primitive() {
                Ok(prim) => prim,
                Err(err) => {
                    let offset = err.offset().unwrap_or_else(|| self.tok.pos());
                    self.stream_diags.push(Diagnostic::error(
                        DiagnosticCode::StreamFault,
                        err.to_string(),
                        offset,
                    ));
                    let next = self.find_body(offset + 1).unwrap_or(self.source.len());
                    self.tok.seek(next);
                    break;
                }
            };
            match prim.value {
                PrimitiveValue::Counter { code, count } => {
                    if !self.enter_group(code, count, prim.offset, &mut diags) {
                        break;
                    }
                }
                PrimitiveValue::IndexedSignature { index, .. } => {
                    if in_controller_group {
                        sigs.push(IndexedSignature {
                            index,
                            qb64: prim.qb64,
                        });
                    }
                }
                PrimitiveValue::Matter { .. } => {
                    // loose material (bare receipt couples and the like);
                    // preserved verbatim in the raw attachment span
                    tracing::trace!(offset = prim.offset, "loose attachment material");
                }
            }
        }
        (sigs, diags)
    }

    /// Handle one counter header; returns false when the attachment walk
    /// should stop
    fn enter_group(
        &mut self,
        code: CounterCode,
        count: u64,
        offset: usize,
        diags: &mut Vec<Diagnostic>,
    ) -> bool {
        match code {
            // the tokenizer's group scope carries the controller/witness
            // distinction; the signatures themselves follow
            CounterCode::ControllerIdxSigs | CounterCode::WitnessIdxSigs => true,
            CounterCode::AttachmentGroup | CounterCode::BigAttachmentGroup => true,
            CounterCode::PathedMaterialGroup
            | CounterCode::GenericGroup
            | CounterCode::EssrPayloadGroup => {
                diags.push(Diagnostic::warning(
                    DiagnosticCode::UnknownAttachment,
                    format!("skipped {} ({count} quadlets)", code.name()),
                    offset,
                ));
                if let Some(end) = self.tok.group_end() {
                    self.tok.seek(end);
                }
                true
            }
            _ => match code.members_per_item() {
                Some(members) if !code.is_indexed_sig_group() => {
                    // flat couples/triples/quadruples: consume the members
                    for _ in 0..count.saturating_mul(members as u64) {
                        if let Err(err) = self.tok.read_primitive() {
                            let fault_offset = err.offset().unwrap_or_else(|| self.tok.pos());
                            self.stream_diags.push(Diagnostic::error(
                                DiagnosticCode::StreamFault,
                                err.to_string(),
                                fault_offset,
                            ));
                            let next =
                                self.find_body(fault_offset + 1).unwrap_or(self.source.len());
                            self.tok.seek(next);
                            return false;
                        }
                    }
                    tracing::trace!(code = %code, count, "consumed couple group");
                    true
                }
                _ => {
                    // structured group this decoder does not interpret
                    diags.push(Diagnostic::warning(
                        DiagnosticCode::UnknownAttachment,
                        format!("skipped {} ({count} items)", code.name()),
                        offset,
                    ));
                    if let Some(end) = self.tok.group_end() {
                        self.tok.seek(end);
                        true
                    } else {
                        // no enclosing declared scope to jump to; give up
                        // on the rest of this event's attachments
                        let next = self.find_body(self.tok.pos()).unwrap_or(self.source.len());
                        self.tok.seek(next);
                        false
                    }
                }
            },
        }
    }
}

fn threshold_field(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    offset: usize,
    diags: &mut Vec<Diagnostic>,
) -> Option<Threshold> {
    let value = obj.get(field)?;
    match Threshold::from_json(value) {
        Ok(threshold) => Some(threshold),
        Err(e) => {
            diags.push(Diagnostic::error(
                DiagnosticCode::MalformedEvent,
                format!("bad {field} field: {e}"),
                offset,
            ));
            None
        }
    }
}

fn check_required_fields(
    kind: EventKind,
    obj: &serde_json::Map<String, Value>,
    keys: &[PublicKey],
    threshold: &Option<Threshold>,
    prior: &Option<SelfAddress>,
    diags: &mut Vec<Diagnostic>,
    offset: usize,
) {
    let mut require = |ok: bool, message: &str| {
        if !ok {
            diags.push(Diagnostic::error(DiagnosticCode::MalformedEvent, message, offset));
        }
    };
    if kind.is_chained() {
        require(
            obj.get("i").and_then(Value::as_str).is_some_and(|i| !i.is_empty()),
            "key events require an identifier prefix",
        );
    }
    match kind {
        EventKind::Inception | EventKind::DelegatedInception => {
            require(!keys.is_empty(), "inception requires a non-empty key list");
            require(threshold.is_some(), "inception requires a signing threshold");
            require(
                obj.contains_key("n"),
                "inception requires a next-key commitment field",
            );
            require(prior.is_none(), "inception must not carry a prior digest");
        }
        EventKind::Rotation | EventKind::DelegatedRotation => {
            require(prior.is_some(), "rotation requires a prior digest");
            require(!keys.is_empty(), "rotation requires a non-empty key list");
            require(threshold.is_some(), "rotation requires a signing threshold");
            require(
                obj.contains_key("n"),
                "rotation requires a next-key commitment field",
            );
        }
        EventKind::Interaction => {
            require(prior.is_some(), "interaction requires a prior digest");
        }
        EventKind::Receipt => {
            require(
                obj.get("i").and_then(Value::as_str).is_some(),
                "receipt requires the receipted identifier",
            );
        }
        _ => {}
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        None => Some(Vec::new()),
        // a bare string commitment is tolerated as a single-entry list
        Some(Value::String(s)) => Some(vec![s.clone()]),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(item.as_str()?.to_string());
            }
            Some(out)
        }
        Some(_) => None,
    }
}
