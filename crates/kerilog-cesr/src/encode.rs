//! Event body and attachment serialization
//!
//! The inverse of [`crate::decode`]: composes a version-framed JSON body
//! with its self-addressing digest filled in, and encodes attachment
//! groups. Field order follows the canonical wire layout so a body built
//! from decoded fields reproduces the original bytes exactly.

use serde_json::{json, Map, Value};

use kerilog_core::{EventKind, KerilogError, KeyEvent, Prefix, Result, SelfAddress};

use crate::primitive::MatterCode;
use crate::qb64;
use crate::said;
use crate::version::{self, SerialKind};

/// Width of a Blake3-256 digest in qb64 characters
const SAID_LEN: usize = 44;

/// A finished event body
#[derive(Debug, Clone)]
pub struct BuiltEvent {
    /// The serialized body, version string and digest complete
    pub body: String,
    /// The computed self-addressing digest
    pub said: SelfAddress,
    /// The identifier prefix (equals the digest for a self-addressing
    /// inception)
    pub prefix: Prefix,
}

/// Composes one event body in canonical field order
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: EventKind,
    prefix: Option<String>,
    sn: u64,
    prior: Option<String>,
    receipted_digest: Option<String>,
    keys: Vec<String>,
    threshold: Option<Value>,
    next_digests: Vec<String>,
    next_threshold: Option<Value>,
    seals: Vec<Value>,
}

impl EventBuilder {
    /// Start an inception; with no explicit prefix the identifier becomes
    /// self-addressing (prefix = digest)
    pub fn inception() -> Self {
        Self::new(EventKind::Inception, 0)
    }

    /// Start a rotation chained to `prior`
    pub fn rotation(sn: u64, prior: &SelfAddress) -> Self {
        let mut builder = Self::new(EventKind::Rotation, sn);
        builder.prior = Some(prior.as_str().to_string());
        builder
    }

    /// Start an interaction chained to `prior`
    pub fn interaction(sn: u64, prior: &SelfAddress) -> Self {
        let mut builder = Self::new(EventKind::Interaction, sn);
        builder.prior = Some(prior.as_str().to_string());
        builder
    }

    /// Start a receipt referencing the event `digest` at `sn`
    pub fn receipt(sn: u64, digest: &SelfAddress) -> Self {
        let mut builder = Self::new(EventKind::Receipt, sn);
        builder.receipted_digest = Some(digest.as_str().to_string());
        builder
    }

    fn new(kind: EventKind, sn: u64) -> Self {
        Self {
            kind,
            prefix: None,
            sn,
            prior: None,
            receipted_digest: None,
            keys: Vec::new(),
            threshold: None,
            next_digests: Vec::new(),
            next_threshold: None,
            seals: Vec::new(),
        }
    }

    /// Set the identifier prefix explicitly
    pub fn prefix(mut self, prefix: &Prefix) -> Self {
        self.prefix = Some(prefix.as_str().to_string());
        self
    }

    /// Set the signing key list (qb64 forms)
    pub fn keys<I: IntoIterator<Item = String>>(mut self, keys: I) -> Self {
        self.keys = keys.into_iter().collect();
        self
    }

    /// Set a count threshold
    pub fn threshold(mut self, count: u64) -> Self {
        self.threshold = Some(json!(format!("{count:x}")));
        self
    }

    /// Set a weighted threshold from fraction strings
    pub fn weighted_threshold<I: IntoIterator<Item = String>>(mut self, weights: I) -> Self {
        self.threshold = Some(json!(weights.into_iter().collect::<Vec<_>>()));
        self
    }

    /// Set the next-key digest commitment
    pub fn next_digests<I: IntoIterator<Item = String>>(mut self, digests: I) -> Self {
        self.next_digests = digests.into_iter().collect();
        self
    }

    /// Set the committed next threshold
    pub fn next_threshold(mut self, count: u64) -> Self {
        self.next_threshold = Some(json!(format!("{count:x}")));
        self
    }

    /// Append an anchored seal
    pub fn seal(mut self, seal: Value) -> Self {
        self.seals.push(seal);
        self
    }

    /// Serialize the body, computing the version size and the
    /// self-addressing digest
    pub fn build(&self) -> Result<BuiltEvent> {
        let self_addressing =
            self.kind == EventKind::Inception && self.prefix.is_none();
        let dummy = "#".repeat(SAID_LEN);

        let mut fields = Map::new();
        fields.insert("v".into(), json!(version::render(SerialKind::Json, 0)));
        fields.insert("t".into(), json!(self.kind.code()));
        match self.kind {
            // a receipt's digest field names the receipted event
            EventKind::Receipt => {
                let digest = self.receipted_digest.clone().ok_or_else(|| {
                    KerilogError::internal("receipt built without a receipted digest")
                })?;
                fields.insert("d".into(), json!(digest));
            }
            _ => {
                fields.insert("d".into(), json!(dummy));
            }
        }
        let prefix_value = if self_addressing {
            dummy.clone()
        } else {
            self.prefix.clone().ok_or_else(|| {
                KerilogError::internal("non-inception event built without a prefix")
            })?
        };
        fields.insert("i".into(), json!(prefix_value));
        fields.insert("s".into(), json!(format!("{:x}", self.sn)));
        if let Some(prior) = &self.prior {
            fields.insert("p".into(), json!(prior));
        }
        if self.kind.is_establishment() {
            let threshold = self
                .threshold
                .clone()
                .unwrap_or_else(|| json!(format!("{:x}", self.keys.len())));
            fields.insert("kt".into(), threshold);
            fields.insert("k".into(), json!(self.keys));
            let next_threshold = self
                .next_threshold
                .clone()
                .unwrap_or_else(|| json!(format!("{:x}", self.next_digests.len().max(1))));
            fields.insert("nt".into(), next_threshold);
            fields.insert("n".into(), json!(self.next_digests));
        }
        if self.kind != EventKind::Receipt {
            fields.insert("a".into(), json!(self.seals));
        }

        // first pass fixes the length; the version placeholder and digest
        // dummy already have their final widths
        let draft = serde_json::to_string(&Value::Object(fields.clone()))
            .map_err(|e| KerilogError::internal(format!("body serialization failed: {e}")))?;
        fields.insert(
            "v".into(),
            json!(version::render(SerialKind::Json, draft.len())),
        );
        let sized = serde_json::to_string(&Value::Object(fields))
            .map_err(|e| KerilogError::internal(format!("body serialization failed: {e}")))?;

        if self.kind == EventKind::Receipt {
            let said = SelfAddress::new(self.receipted_digest.clone().unwrap_or_default());
            let prefix = Prefix::new(self.prefix.clone().unwrap_or_default());
            return Ok(BuiltEvent {
                body: sized,
                said,
                prefix,
            });
        }

        let said = said::digest_qb64(MatterCode::Blake3, sized.as_bytes())
            .ok_or_else(|| KerilogError::internal("digest code not computable"))?;
        let body = sized.replace(&dummy, &said);
        let prefix = if self_addressing {
            Prefix::new(said.as_str())
        } else {
            Prefix::new(self.prefix.clone().unwrap_or_default())
        };
        Ok(BuiltEvent {
            body,
            said: SelfAddress::new(said),
            prefix,
        })
    }
}

/// Rebuild a decoded event's body from its structural fields
///
/// Used to confirm framing round-trips: for a body produced by
/// [`EventBuilder`], the rebuilt bytes are identical to the decoded
/// `raw_body`.
pub fn rebuild_body(event: &KeyEvent) -> Result<String> {
    let mut builder = match event.kind {
        EventKind::Inception => EventBuilder::inception(),
        EventKind::Rotation => EventBuilder::rotation(
            event.sn,
            event
                .prior
                .as_ref()
                .ok_or_else(|| KerilogError::internal("rotation without prior digest"))?,
        ),
        EventKind::Interaction => EventBuilder::interaction(
            event.sn,
            event
                .prior
                .as_ref()
                .ok_or_else(|| KerilogError::internal("interaction without prior digest"))?,
        ),
        EventKind::Receipt => EventBuilder::receipt(event.sn, &event.digest),
        other => {
            return Err(KerilogError::internal(format!(
                "cannot rebuild {other} events"
            )))
        }
    };
    // a self-addressing inception regenerates its prefix from the digest
    let self_addressing = event.kind == EventKind::Inception
        && event.prefix.as_ref().map(Prefix::as_str) == Some(event.digest.as_str());
    if !self_addressing {
        if let Some(prefix) = &event.prefix {
            builder = builder.prefix(prefix);
        }
    }
    if event.kind.is_establishment() {
        builder = builder
            .keys(event.keys.iter().map(|k| k.as_str().to_string()))
            .next_digests(event.next_digests.iter().map(|d| d.as_str().to_string()));
        if let Some(threshold) = &event.threshold {
            builder = match threshold {
                kerilog_core::Threshold::Count(count) => builder.threshold(*count),
                kerilog_core::Threshold::Weighted(weights) => builder.weighted_threshold(
                    weights.iter().map(std::string::ToString::to_string),
                ),
            };
        }
        if let Some(kerilog_core::Threshold::Count(count)) = &event.next_threshold {
            builder = builder.next_threshold(*count);
        }
    }
    for seal in &event.seals {
        builder = builder.seal(seal.0.clone());
    }
    Ok(builder.build()?.body)
}

/// Encode one indexed Ed25519 signature (`A` code + index character)
pub fn indexed_signature(index: usize, sig: &[u8; 64]) -> String {
    let body = qb64::encode_payload("0B", sig);
    let mut out = String::with_capacity(88);
    out.push('A');
    out.push(qb64::u6_to_b64_char(index as u32));
    out.push_str(&body[2..]);
    out
}

/// Encode a controller indexed signature group
pub fn controller_signatures(sigs: &[(usize, [u8; 64])]) -> String {
    let mut out = format!("-A{}", qb64::encode_count(sigs.len() as u64, 2));
    for (index, sig) in sigs {
        out.push_str(&indexed_signature(*index, sig));
    }
    out
}

/// Wrap already-encoded attachment material in a `-V` group
///
/// The material must be a whole number of quadlets, which every composed
/// primitive is.
pub fn attachment_group(inner: &str) -> Result<String> {
    if inner.len() % 4 != 0 {
        return Err(KerilogError::internal(format!(
            "attachment material of {} characters is not quadlet-aligned",
            inner.len()
        )));
    }
    Ok(format!(
        "-V{}{inner}",
        qb64::encode_count((inner.len() / 4) as u64, 2)
    ))
}

/// Encode an Ed25519 verifying key
pub fn ed25519_key(raw: &[u8; 32]) -> String {
    qb64::encode_payload("D", raw)
}

/// Digest a qb64 key for a next-key commitment entry
pub fn key_commitment(key_qb64: &str) -> String {
    said::default_digest_qb64(key_qb64.as_bytes())
}
